use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::ProgressBar;
use tokio::time::Instant;
use url::Url;

use crate::client::{FetchResult, Probe};
use crate::generator::Mode;
use crate::runner::{load_wordlist, Options, Runner, ScanResult, WordlistSource};

/// Canned Gemini server: each rule maps an exact path to a response. Paths
/// with no rule get `51 not found`. Every probed path is recorded.
struct StubProbe {
    rules: Vec<(&'static str, &'static str, &'static str, Option<&'static str>)>,
    probed: Mutex<Vec<String>>,
}

impl StubProbe {
    fn new(
        rules: Vec<(&'static str, &'static str, &'static str, Option<&'static str>)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            rules,
            probed: Mutex::new(Vec::new()),
        })
    }

    fn probed_paths(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for StubProbe {
    async fn fetch(&self, url: &Url) -> FetchResult {
        self.probed.lock().unwrap().push(url.path().to_string());
        for (path, status, meta, body) in &self.rules {
            if url.path() == *path {
                return FetchResult {
                    status: status.to_string(),
                    meta: meta.to_string(),
                    size: body.map(|b| b.len() as u64).unwrap_or(42),
                    body: body.map(|b| b.to_string()),
                    error: None,
                };
            }
        }
        FetchResult {
            status: "51".to_string(),
            meta: "not found".to_string(),
            size: 0,
            body: None,
            error: None,
        }
    }
}

fn dir_options(words: &[&str]) -> Options {
    Options {
        base_url: "gemini://example.org".to_string(),
        wordlist: Some(WordlistSource::Inline(
            words.iter().map(|w| w.to_string()).collect(),
        )),
        mode: Mode::Dir,
        concurrency: 4,
        ..Options::default()
    }
}

async fn scan_with(options: Options, probe: Arc<StubProbe>) -> ScanResult {
    let runner = Runner::new(options).unwrap();
    let base = runner.base_url().unwrap();
    let words = load_wordlist(runner.options().wordlist.as_ref())
        .await
        .unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        runner.scan(base, words, probe, ProgressBar::hidden(), Instant::now()),
    )
    .await
    .expect("scan did not terminate")
    .unwrap()
}

#[tokio::test]
async fn dir_scan_reports_only_matching_candidates() {
    let probe = StubProbe::new(vec![("/admin.gmi", "20", "text/gemini", None)]);
    let mut options = dir_options(&["admin", "images/"]);
    options.spider = false;
    let result = scan_with(options, Arc::clone(&probe)).await;

    // each word expands to the bare form plus the implicit .gmi variant
    assert_eq!(result.probed, 4);
    assert_eq!(result.errors, 0);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].target, "/admin.gmi");
    assert_eq!(result.hits[0].status, "20");
    assert_eq!(result.hits[0].depth, 0);
    assert!(result.hits[0].redirect.is_none());
}

#[tokio::test]
async fn redirects_are_reported_but_not_followed() {
    let probe = StubProbe::new(vec![("/old", "30", "/newpath", None)]);
    let mut options = dir_options(&["old"]);
    options.spider = false;
    let result = scan_with(options, Arc::clone(&probe)).await;

    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].target, "/old");
    assert_eq!(result.hits[0].redirect.as_deref(), Some("/newpath"));
    assert!(!probe.probed_paths().iter().any(|p| p == "/newpath"));
}

#[tokio::test]
async fn directory_hits_recurse_with_the_full_wordlist() {
    let probe = StubProbe::new(vec![
        ("/docs/", "20", "text/gemini", None),
        ("/docs/admin", "20", "text/gemini", None),
    ]);
    let mut options = dir_options(&["docs/", "admin"]);
    options.spider = false;
    options.recursion_depth = 2;
    let result = scan_with(options, Arc::clone(&probe)).await;

    // 4 seeds plus 4 re-expansions under /docs/
    assert_eq!(result.probed, 8);
    let targets: Vec<_> = result.hits.iter().map(|h| h.target.as_str()).collect();
    assert!(targets.contains(&"/docs/"));
    assert!(targets.contains(&"/docs/admin"));
    let nested = result.hits.iter().find(|h| h.target == "/docs/admin").unwrap();
    assert_eq!(nested.depth, 1);
}

#[tokio::test]
async fn spidering_a_link_cycle_terminates() {
    let probe = StubProbe::new(vec![
        (
            "/index.gmi",
            "20",
            "text/gemini",
            Some("# index\n=> /found.gmi follow me\n"),
        ),
        (
            "/found.gmi",
            "20",
            "text/gemini",
            Some("=> /index.gmi back home\n"),
        ),
    ]);
    let mut options = dir_options(&["index.gmi"]);
    options.spider = true;
    options.recursion_depth = 2;
    let result = scan_with(options, Arc::clone(&probe)).await;

    let probed = probe.probed_paths();
    assert_eq!(probed.iter().filter(|p| *p == "/found.gmi").count(), 1);
    // the back-link to the seed must not trigger a second probe
    assert_eq!(probed.iter().filter(|p| *p == "/index.gmi").count(), 1);
    assert_eq!(result.probed, 3);
    assert!(result.hits.iter().any(|h| h.target == "/found.gmi"));
}

#[tokio::test]
async fn excluded_size_suppresses_noise_responses() {
    let probe = StubProbe::new(vec![
        ("/a", "20", "text/gemini", Some("same soft-404 page body\n")),
        ("/b", "20", "text/gemini", Some("same soft-404 page body\n")),
    ]);
    let mut options = dir_options(&["a", "b"]);
    options.spider = false;
    options.extensions = Vec::new();
    options.exclude_size = Some("same soft-404 page body\n".len() as u64);
    let result = scan_with(options, Arc::clone(&probe)).await;
    assert!(result.hits.is_empty());
}

#[tokio::test]
async fn wordlist_files_are_read_line_by_line() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "admin\n\n  images/  \ncgi-bin").unwrap();
    let source = WordlistSource::FilePath(file.path().to_string_lossy().to_string());
    let words = load_wordlist(Some(&source)).await.unwrap();
    assert_eq!(words, vec!["admin", "images/", "cgi-bin"]);
}
