/// A whitelist entry for Gemini status codes: `all`, a one-digit family
/// wildcard, or an exact two-digit code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusPattern {
    All,
    Family(char),
    Exact(String),
}

impl StatusPattern {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        let mut chars = raw.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(a), None, _) if a.is_ascii_digit() => Some(Self::Family(a)),
            (Some(a), Some(b), None) if a.is_ascii_digit() && b.is_ascii_digit() => {
                Some(Self::Exact(raw.to_string()))
            }
            _ => None,
        }
    }

    pub fn matches(&self, status: &str) -> bool {
        match self {
            Self::All => true,
            Self::Family(digit) => status.starts_with(*digit),
            Self::Exact(code) => status == code,
        }
    }
}

/// Parses a comma-separated whitelist, e.g. `2,3` or `all` or `20,44`.
pub fn parse_patterns(csv: &str) -> Result<Vec<StatusPattern>, String> {
    let mut out = Vec::new();
    for item in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match StatusPattern::parse(item) {
            Some(p) => out.push(p),
            None => return Err(format!("invalid status pattern '{item}'")),
        }
    }
    if out.is_empty() {
        return Err("status whitelist is empty".to_string());
    }
    Ok(out)
}

/// Report predicate: the status must be present and whitelisted, and the body
/// size must differ from the excluded size (when one is configured). The same
/// predicate gates recursion eligibility.
pub fn should_report(
    status: &str,
    size: u64,
    patterns: &[StatusPattern],
    exclude_size: Option<u64>,
) -> bool {
    if status.is_empty() {
        return false;
    }
    if exclude_size == Some(size) {
        return false;
    }
    patterns.iter().any(|p| p.matches(status))
}
