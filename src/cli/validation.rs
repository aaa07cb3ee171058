use crate::cli::args::CliArgs;
use crate::generator::Mode;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if Mode::parse(&args.mode).is_none() {
        return Err(format!(
            "unsupported mode '{}', expected dir, vhost, or query",
            args.mode
        ));
    }
    if args.threads == Some(0) {
        return Err("threads must be > 0".to_string());
    }
    if args.timeout == Some(0) {
        return Err("timeout must be > 0".to_string());
    }
    if args.rate == Some(0) {
        return Err("rate must be > 0".to_string());
    }
    if let Some(raw) = args.status_codes.as_deref() {
        crate::filter::parse_patterns(raw)
            .map_err(|e| format!("invalid --status-codes '{raw}': {e}"))?;
    }
    if let Some(raw) = args.extensions.as_deref() {
        crate::utils::parse_extensions_csv(raw)
            .map_err(|e| format!("invalid --extensions '{raw}': {e}"))?;
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --output-format '{raw}', expected text or json"));
        }
    }
    Ok(())
}
