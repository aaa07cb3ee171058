/// Parses a comma-separated extension list, trimming stray dots so both
/// `gmi` and `.gmi` are accepted.
pub fn parse_extensions_csv(input: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    for item in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let ext = item.trim_matches('.');
        if ext.is_empty() || ext.contains(['/', ' ']) {
            return Err(format!("invalid extension '{item}'"));
        }
        out.push(ext.to_string());
    }
    Ok(out)
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_trimmed_of_dots_and_whitespace() {
        let exts = parse_extensions_csv(" gmi, .txt ,md").unwrap();
        assert_eq!(exts, vec!["gmi", "txt", "md"]);
    }

    #[test]
    fn empty_input_is_no_extensions() {
        assert!(parse_extensions_csv("").unwrap().is_empty());
        assert!(parse_extensions_csv(" , ,").unwrap().is_empty());
    }

    #[test]
    fn bad_extensions_are_rejected() {
        assert!(parse_extensions_csv("a/b").is_err());
        assert!(parse_extensions_csv("...").is_err());
    }
}
