use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gembuster",
    version,
    about = "gemini protocol enumeration tool",
    long_about = "Gembuster enumerates resources on Gemini servers by probing candidate paths, subdomains, or query values from a wordlist.\n\nExamples:\n  gembuster dir -u gemini://target.tld -w wordlist.txt\n  gembuster dir -u target.tld -w wordlist.txt -x gmi,txt -r 3\n  gembuster vhost -u target.tld -w subdomains.txt -t 50"
)]
pub struct CliArgs {
    #[arg(
        value_name = "MODE",
        help = "Enumeration mode: dir, vhost, or query."
    )]
    pub mode: String,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Base Gemini URL (e.g. gemini://example.org)."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Wordlist file path (one candidate per line)."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to a YAML config file; CLI flags take precedence."
    )]
    pub config: Option<String>,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of concurrent workers."
    )]
    pub threads: Option<usize>,

    #[arg(
        short = 'T',
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Request rate limit (requests per second)."
    )]
    pub rate: Option<u32>,

    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        help_heading = "Input",
        help = "Port for Gemini requests (overrides the URL's port)."
    )]
    pub port: Option<u16>,

    #[arg(
        short = 'x',
        long = "extensions",
        value_name = "EXTENSIONS",
        help_heading = "Scan",
        help = "Comma-separated extensions appended to each word (e.g. gmi,txt)."
    )]
    pub extensions: Option<String>,

    #[arg(
        short = 'r',
        long = "recursion",
        value_name = "DEPTH",
        help_heading = "Scan",
        help = "Recursion depth on directory hits (0 disables)."
    )]
    pub recursion: Option<usize>,

    #[arg(
        long = "spider",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        help_heading = "Scan",
        help = "Follow gemtext links on hit pages (default: true)."
    )]
    pub spider: Option<bool>,

    #[arg(
        short = 'c',
        long = "status-codes",
        value_name = "CODES",
        help_heading = "Filters",
        help = "Comma-separated status whitelist; exact codes, family wildcards, or 'all' (default: 2,3)."
    )]
    pub status_codes: Option<String>,

    #[arg(
        short = 's',
        long = "exclude-size",
        value_name = "BYTES",
        help_heading = "Filters",
        help = "Hide responses whose body is exactly this many bytes."
    )]
    pub exclude_size: Option<u64>,

    #[arg(
        short = 'k',
        long = "insecure",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        help_heading = "TLS",
        help = "Accept self-signed certificates (default: true; Gemini is trust-on-first-use)."
    )]
    pub insecure: Option<bool>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write results to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json (inferred from the file name when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'n',
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase logging verbosity (-v info, -vv debug)."
    )]
    pub verbose: u8,
}
