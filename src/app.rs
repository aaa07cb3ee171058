use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::filter;
use crate::generator::Mode;
use crate::output::{self, OutputFormat};
use crate::runner::{Options, Runner, WordlistSource};
use crate::utils;

fn print_banner() {
    const BANNER: &str = r#"
                       __               __
   ____ ____  ____ ___ / /_  __  _______/ /____  _____
  / __ `/ _ \/ __ `__ \/ __ \/ / / / ___/ __/ _ \/ ___/
 / /_/ /  __/ / / / / / /_/ / /_/ (__  ) /_/  __/ /
 \__, /\___/_/ /_/ /_/_.___/\__,_/____/\__/\___/_/
/____/
       v0.2.1 - gemini protocol enumeration tool
    "#;
    println!("{}", BANNER);
    println!(
        "{}{}{} {}",
        "[".bold().white(),
        "WRN".bold().yellow(),
        "]".bold().white(),
        "Use with caution. You are responsible for your actions".bold().white()
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<12}: {}", label, value);
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "gembuster=info",
        _ => "gembuster=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug)]
struct RunConfig {
    options: Options,
    mode: Mode,
    output: Option<String>,
    output_format: Option<OutputFormat>,
    no_color: bool,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    // Mode::parse already vetted in validation
    let mode = Mode::parse(&args.mode).ok_or_else(|| "unsupported mode".to_string())?;

    let base_url = args
        .url
        .or(cfg.url)
        .ok_or_else(|| "a base URL is required (--url)".to_string())?;

    let wordlist_path = args
        .wordlist
        .or(cfg.wordlist)
        .ok_or_else(|| "a wordlist is required (--wordlist)".to_string())?;

    let extensions_raw = args.extensions.or(cfg.extensions).unwrap_or_default();
    let extensions = utils::parse_extensions_csv(&extensions_raw)
        .map_err(|e| format!("invalid --extensions '{extensions_raw}': {e}"))?;

    let status_raw = args
        .status_codes
        .or(cfg.status_codes)
        .unwrap_or_else(|| "2,3".to_string());
    let status_patterns = filter::parse_patterns(&status_raw)
        .map_err(|e| format!("invalid --status-codes '{status_raw}': {e}"))?;

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => Some(
            OutputFormat::parse(&raw)
                .ok_or_else(|| format!("invalid --output-format '{raw}'"))?,
        ),
        None => output.as_deref().and_then(output::infer_format_from_path),
    };

    let options = Options {
        base_url,
        port: args.port.or(cfg.port),
        wordlist: Some(WordlistSource::FilePath(config::expand_tilde_string(
            &wordlist_path,
        ))),
        mode,
        extensions,
        concurrency: args.threads.or(cfg.threads).unwrap_or(10),
        timeout_seconds: args.timeout.or(cfg.timeout).unwrap_or(10),
        recursion_depth: args.recursion.or(cfg.recursion).unwrap_or(2),
        spider: args.spider.or(cfg.spider).unwrap_or(true),
        insecure: args.insecure.or(cfg.insecure).unwrap_or(true),
        status_patterns,
        exclude_size: args.exclude_size.or(cfg.exclude_size),
        rate: args.rate.or(cfg.rate),
    };

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    Ok(RunConfig {
        options,
        mode,
        output,
        output_format,
        no_color,
    })
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let runner = Runner::new(run.options).map_err(|e| e.to_string())?;
    let base = runner.base_url().map_err(|e| e.to_string())?;

    format_kv_line("Mode", run.mode.as_str());
    format_kv_line("Base URL", base.as_str());
    format_kv_line(
        "Threads",
        &runner.options().concurrency.to_string(),
    );
    format_kv_line(
        "Status codes",
        &format!("{} pattern(s)", runner.options().status_patterns.len()),
    );
    format_kv_line(
        "Recursion",
        &runner.options().recursion_depth.to_string(),
    );
    format_kv_line("Spider", utils::format_bool(runner.options().spider));
    println!();

    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}]",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?
        .progress_chars(r#"#>-"#),
    );

    let result = runner
        .run_with_progress(pb.clone())
        .await
        .map_err(|e| e.to_string())?;
    pb.finish_and_clear();

    if let Some(outfile_path) = run.output.as_deref() {
        let format = run.output_format.unwrap_or(OutputFormat::Text);
        let rendered = match format {
            OutputFormat::Text => output::render_text(&result.hits),
            OutputFormat::Json => output::render_json(&result.hits),
        };
        let mut outfile = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(outfile_path)
            .await
            .map_err(|e| format!("failed to open output file: {e}"))?;
        outfile
            .write_all(&rendered)
            .await
            .map_err(|e| format!("failed to write output file: {e}"))?;
    }

    println!();
    println!(
        ":: Completed :: {} probed, {} hits, {} errors in {}s ::",
        result.probed,
        result.hits.len(),
        result.errors,
        result.elapsed.as_secs()
    );

    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                let mut cmd = CliArgs::command();
                let _ = cmd.print_help();
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_logging(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
