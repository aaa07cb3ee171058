use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use url::Url;

use crate::client::FetchResult;
use crate::generator::{self, Mode};
use crate::pool::Job;

/// Decides which follow-up jobs a completed probe produces: wordlist
/// re-expansion under discovered directories, and gemtext link spidering.
/// Shared across workers; the visited sets are the only interior state.
pub struct RecursionPolicy {
    max_depth: usize,
    mode: Mode,
    wordlist: Arc<Vec<String>>,
    extensions: Arc<Vec<String>>,
    spider: bool,
    visited: Mutex<Visited>,
}

#[derive(Default)]
struct Visited {
    // directories already re-expanded against the wordlist
    recursed: HashSet<String>,
    // spidered links already turned into jobs
    enqueued: HashSet<String>,
}

/// Canonical URL form used for cycle detection: origin plus path with
/// trailing slashes trimmed, query dropped. `/docs` and `/docs/` collapse to
/// the same entry so a directory reached via two parents is only expanded
/// once.
pub fn canonical(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let port = url.port().unwrap_or(crate::client::DEFAULT_PORT);
    let path = url.path().trim_end_matches('/');
    format!("{}://{}:{}{}", url.scheme(), host, port, path)
}

/// Extracts gemtext link targets (`=> <url> [label]`) resolved against the
/// page URL, keeping only same-host gemini links. Order follows the page,
/// duplicates dropped.
pub fn extract_links(page: &Url, body: &str) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in body.lines() {
        let Some(rest) = line.strip_prefix("=>") else {
            continue;
        };
        let Some(target) = rest.split_whitespace().next() else {
            continue;
        };
        let Ok(resolved) = page.join(target) else {
            continue;
        };
        if resolved.scheme() != "gemini" || resolved.host_str() != page.host_str() {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            out.push(resolved);
        }
    }
    out
}

impl RecursionPolicy {
    pub fn new(
        max_depth: usize,
        mode: Mode,
        wordlist: Arc<Vec<String>>,
        extensions: Arc<Vec<String>>,
        spider: bool,
        base: &Url,
    ) -> Self {
        let mut visited = Visited::default();
        // never spider back into the base we started from
        visited.enqueued.insert(canonical(base));
        Self {
            max_depth,
            mode,
            wordlist,
            extensions,
            spider,
            visited: Mutex::new(visited),
        }
    }

    /// Marks URLs that are already scheduled for probing, so the spider
    /// never re-enqueues a seed it links back to.
    pub fn mark_enqueued<'a>(&self, urls: impl IntoIterator<Item = &'a Url>) {
        let mut visited = self.visited.lock().unwrap();
        for url in urls {
            visited.enqueued.insert(canonical(url));
        }
    }

    /// Follow-up jobs for a *reported* response. Callers gate on the report
    /// filter first; redirects never reach here as recursion triggers since
    /// their status family is 3.
    pub fn children(&self, job: &Job, result: &FetchResult) -> Vec<Job> {
        let mut out = Vec::new();
        if !result.status.starts_with('2') || job.depth >= self.max_depth {
            return out;
        }

        if self.mode == Mode::Dir && job.url.path().ends_with('/') {
            let newly_seen = {
                let mut visited = self.visited.lock().unwrap();
                visited.recursed.insert(canonical(&job.url))
            };
            if newly_seen {
                for word in self.wordlist.iter() {
                    for url in
                        generator::expand_word(&job.url, word, self.mode, &self.extensions)
                    {
                        out.push(Job {
                            url,
                            depth: job.depth + 1,
                        });
                    }
                }
            }
        }

        if self.spider && result.meta.starts_with("text/gemini") {
            if let Some(body) = result.body.as_deref() {
                for link in extract_links(&job.url, body) {
                    let newly_seen = {
                        let mut visited = self.visited.lock().unwrap();
                        visited.enqueued.insert(canonical(&link))
                    };
                    if newly_seen {
                        out.push(Job {
                            url: link,
                            depth: job.depth + 1,
                        });
                    }
                }
            }
        }

        out
    }
}
