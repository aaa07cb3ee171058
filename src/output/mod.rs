use colored::{ColoredString, Colorize};
use serde::Serialize;
use url::Url;

use crate::generator::Mode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

/// One reported probe.
#[derive(Clone, Debug, Serialize)]
pub struct OutputRecord {
    pub url: String,
    pub target: String,
    pub status: String,
    pub meta: String,
    pub size: u64,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// The identifier shown for a hit: the path in `dir`/`query` mode, the
/// hostname in `vhost` mode.
pub fn display_target(url: &Url, mode: Mode) -> String {
    match mode {
        Mode::Vhost => url.host_str().unwrap_or_default().to_string(),
        Mode::Dir | Mode::Query => {
            let path = url.path();
            let mut shown = if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            };
            if let Some(query) = url.query() {
                shown.push('?');
                shown.push_str(query);
            }
            shown
        }
    }
}

fn paint_status(status: &str) -> ColoredString {
    let label = format!("[{status}]");
    match status.as_bytes().first() {
        Some(b'1') => label.bold().blue(),
        Some(b'2') => label.bold().green(),
        Some(b'3') => label.bold().yellow(),
        Some(b'4') | Some(b'5') => label.bold().red(),
        Some(b'6') => label.bold().magenta(),
        _ => label.bold().white(),
    }
}

/// Renders one live hit line, e.g. `[20] /admin.gmi  Size: 512  text/gemini`.
/// Redirects show the probed identifier and its destination.
pub fn format_hit_line(record: &OutputRecord) -> String {
    let shown = match record.redirect.as_deref() {
        Some(dest) => format!("{} -> {}", record.target, dest),
        None => record.target.clone(),
    };
    format!(
        "{:<6} {:<30} Size: {:<6} {}",
        paint_status(&record.status),
        shown,
        record.size,
        record.meta
    )
}

pub fn render_text(records: &[OutputRecord]) -> Vec<u8> {
    let mut out = String::new();
    for r in records {
        let shown = match r.redirect.as_deref() {
            Some(dest) => format!("{} -> {}", r.target, dest),
            None => r.target.clone(),
        };
        out.push_str(&format!(
            "[{}] {} Size: {} {}\n",
            r.status, shown, r.size, r.meta
        ));
    }
    out.into_bytes()
}

pub fn render_json(records: &[OutputRecord]) -> Vec<u8> {
    serde_json::to_vec_pretty(records).unwrap_or_else(|_| b"[]\n".to_vec())
}
