use url::Url;

use crate::pool::Job;

/// Enumeration strategy: path segments, subdomain labels, or query values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Dir,
    Vhost,
    Query,
}

impl Mode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dir" => Some(Self::Dir),
            "vhost" => Some(Self::Vhost),
            "query" => Some(Self::Query),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::Vhost => "vhost",
            Self::Query => "query",
        }
    }
}

// Joins a word onto a base path, keeping any trailing slash the word
// carries so directory candidates stay directory-shaped.
fn join_path(base_path: &str, word: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let word = word.trim_start_matches('/');
    format!("{base}/{word}")
}

fn candidate(base: &Url, word: &str, mode: Mode) -> Option<Url> {
    let mut u = base.clone();
    match mode {
        Mode::Dir => {
            u.set_path(&join_path(base.path(), word));
        }
        Mode::Vhost => {
            let host = base.host_str()?;
            let vhost = format!("{word}.{host}");
            // invalid labels (empty word, embedded slashes) are skipped
            u.set_host(Some(&vhost)).ok()?;
        }
        Mode::Query => {
            u.set_query(Some(word));
        }
    }
    Some(u)
}

/// Expands one wordlist entry into its candidate URLs: the bare word first,
/// then one variant per extension, in the order the extensions were given.
pub fn expand_word(base: &Url, word: &str, mode: Mode, extensions: &[String]) -> Vec<Url> {
    let mut out = Vec::with_capacity(1 + extensions.len());
    if let Some(u) = candidate(base, word, mode) {
        out.push(u);
    }
    for ext in extensions {
        let ext = ext.trim_matches('.');
        if ext.is_empty() {
            continue;
        }
        let suffixed = format!("{}.{}", word, ext);
        if let Some(u) = candidate(base, &suffixed, mode) {
            out.push(u);
        }
    }
    out
}

/// Builds the depth-0 seed set for a scan. Output order follows the wordlist,
/// so identical configs always produce identical job sequences.
pub fn seed_jobs(base: &Url, wordlist: &[String], mode: Mode, extensions: &[String]) -> Vec<Job> {
    let mut jobs = Vec::new();
    for word in wordlist {
        for url in expand_word(base, word, mode, extensions) {
            jobs.push(Job { url, depth: 0 });
        }
    }
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("gemini://example.org:1965/").unwrap()
    }

    #[test]
    fn mode_parse_accepts_known_modes() {
        assert_eq!(Mode::parse("dir"), Some(Mode::Dir));
        assert_eq!(Mode::parse(" VHOST "), Some(Mode::Vhost));
        assert_eq!(Mode::parse("query"), Some(Mode::Query));
        assert_eq!(Mode::parse("spider"), None);
    }

    #[test]
    fn dir_mode_joins_path_segments() {
        let urls = expand_word(&base(), "admin", Mode::Dir, &[]);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].path(), "/admin");
    }

    #[test]
    fn dir_mode_keeps_trailing_slash_on_word() {
        let urls = expand_word(&base(), "images/", Mode::Dir, &[]);
        assert_eq!(urls[0].path(), "/images/");
    }

    #[test]
    fn dir_mode_appends_extensions_in_order() {
        let exts = vec!["gmi".to_string(), ".txt".to_string()];
        let urls = expand_word(&base(), "admin", Mode::Dir, &exts);
        let paths: Vec<_> = urls.iter().map(|u| u.path().to_string()).collect();
        assert_eq!(paths, vec!["/admin", "/admin.gmi", "/admin.txt"]);
    }

    #[test]
    fn dir_mode_joins_under_nested_base() {
        let nested = Url::parse("gemini://example.org/docs/").unwrap();
        let urls = expand_word(&nested, "api", Mode::Dir, &[]);
        assert_eq!(urls[0].path(), "/docs/api");
    }

    #[test]
    fn vhost_mode_prepends_label_and_keeps_port() {
        let urls = expand_word(&base(), "mail", Mode::Vhost, &[]);
        assert_eq!(urls[0].host_str(), Some("mail.example.org"));
        assert_eq!(urls[0].port(), Some(1965));
        assert_eq!(urls[0].path(), "/");
    }

    #[test]
    fn vhost_mode_skips_unmappable_words() {
        let urls = expand_word(&base(), "bad/label", Mode::Vhost, &[]);
        assert!(urls.is_empty());
    }

    #[test]
    fn query_mode_sets_query_value() {
        let urls = expand_word(&base(), "debug", Mode::Query, &[]);
        assert_eq!(urls[0].query(), Some("debug"));
        assert_eq!(urls[0].path(), "/");
    }

    #[test]
    fn seed_jobs_are_deterministic_and_depth_zero() {
        let words = vec!["admin".to_string(), "images/".to_string()];
        let exts = vec!["gmi".to_string()];
        let a = seed_jobs(&base(), &words, Mode::Dir, &exts);
        let b = seed_jobs(&base(), &words, Mode::Dir, &exts);
        assert_eq!(a.len(), 4);
        assert!(a.iter().all(|j| j.depth == 0));
        let ua: Vec<_> = a.iter().map(|j| j.url.to_string()).collect();
        let ub: Vec<_> = b.iter().map(|j| j.url.to_string()).collect();
        assert_eq!(ua, ub);
    }
}
