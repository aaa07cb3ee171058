use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use indicatif::ProgressBar;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::Instant;
use url::Url;

use crate::client::{self, FetchResult, GeminiClient, Probe};
use crate::filter::{self, StatusPattern};
use crate::generator::{self, Mode};
use crate::output::{self, OutputRecord};
use crate::pool::{Job, JobHandler, JobQueue, Pool};
use crate::recursion::RecursionPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone, Debug)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct Options {
    pub base_url: String,
    pub port: Option<u16>,
    pub wordlist: Option<WordlistSource>,
    pub mode: Mode,
    pub extensions: Vec<String>,
    pub concurrency: usize,
    pub timeout_seconds: u64,
    pub recursion_depth: usize,
    pub spider: bool,
    pub insecure: bool,
    pub status_patterns: Vec<StatusPattern>,
    pub exclude_size: Option<u64>,
    pub rate: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            port: None,
            wordlist: None,
            mode: Mode::Dir,
            extensions: Vec::new(),
            concurrency: 10,
            timeout_seconds: 10,
            recursion_depth: 2,
            spider: true,
            insecure: true,
            status_patterns: vec![StatusPattern::Family('2'), StatusPattern::Family('3')],
            exclude_size: None,
            rate: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no base url provided")]
    NoBaseUrl,

    #[error("invalid base url: {url}")]
    InvalidBaseUrl { url: String },

    #[error("threads must be > 0")]
    InvalidConcurrency,

    #[error("timeout must be > 0")]
    InvalidTimeout,

    #[error("rate must be > 0")]
    InvalidRate,

    #[error("a wordlist is required")]
    MissingWordlist,

    #[error("wordlist is empty: {path}")]
    EmptyWordlist { path: String },

    #[error("failed to open wordlist '{path}': {source}")]
    WordlistOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read wordlist '{path}': {source}")]
    WordlistRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug)]
pub struct ScanResult {
    pub elapsed: Duration,
    pub probed: usize,
    pub errors: usize,
    pub hits: Vec<OutputRecord>,
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(mut options: Options) -> Result<Self, RunnerError> {
        if options.base_url.trim().is_empty() {
            return Err(RunnerError::NoBaseUrl);
        }
        if options.concurrency == 0 {
            return Err(RunnerError::InvalidConcurrency);
        }
        if options.timeout_seconds == 0 {
            return Err(RunnerError::InvalidTimeout);
        }
        if options.rate == Some(0) {
            return Err(RunnerError::InvalidRate);
        }
        if options.wordlist.is_none() {
            return Err(RunnerError::MissingWordlist);
        }
        // dirbusting always tries the default gemtext extension as well
        if options.mode == Mode::Dir
            && !options.extensions.iter().any(|e| e == "gmi")
        {
            options.extensions.push("gmi".to_string());
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The grooming applied to the configured base: the `gemini://` scheme is
    /// assumed when missing, and an explicit port option wins over a port in
    /// the URL, which wins over 1965.
    pub fn base_url(&self) -> Result<Url, RunnerError> {
        let raw = self.options.base_url.trim();
        let raw = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("gemini://{raw}")
        };
        let mut url = Url::parse(&raw).map_err(|_| RunnerError::InvalidBaseUrl {
            url: self.options.base_url.clone(),
        })?;
        if url.scheme() != "gemini" || url.host_str().is_none() {
            return Err(RunnerError::InvalidBaseUrl {
                url: self.options.base_url.clone(),
            });
        }
        let port = self
            .options
            .port
            .or(url.port())
            .unwrap_or(client::DEFAULT_PORT);
        url.set_port(Some(port))
            .map_err(|_| RunnerError::InvalidBaseUrl {
                url: self.options.base_url.clone(),
            })?;
        if url.path().is_empty() {
            url.set_path("/");
        }
        Ok(url)
    }

    pub async fn run(&self) -> Result<ScanResult, RunnerError> {
        self.run_with_progress(ProgressBar::hidden()).await
    }

    pub async fn run_with_progress(&self, pb: ProgressBar) -> Result<ScanResult, RunnerError> {
        let started_at = Instant::now();

        let base = self.base_url()?;
        let wordlist = load_wordlist(self.options.wordlist.as_ref()).await?;

        let client = GeminiClient::new(
            Duration::from_secs(self.options.timeout_seconds),
            self.options.insecure,
            self.options.spider,
        );
        self.scan(base, wordlist, Arc::new(client), pb, started_at)
            .await
    }

    /// Runs the scan against an arbitrary probe implementation; the public
    /// entry points pass the real Gemini client.
    pub async fn scan(
        &self,
        base: Url,
        wordlist: Vec<String>,
        probe: Arc<dyn Probe>,
        pb: ProgressBar,
        started_at: Instant,
    ) -> Result<ScanResult, RunnerError> {
        let wordlist = Arc::new(wordlist);
        let extensions = Arc::new(self.options.extensions.clone());

        let seeds = generator::seed_jobs(&base, &wordlist, self.options.mode, &extensions);

        let policy = RecursionPolicy::new(
            self.options.recursion_depth,
            self.options.mode,
            Arc::clone(&wordlist),
            Arc::clone(&extensions),
            self.options.spider,
            &base,
        );
        policy.mark_enqueued(seeds.iter().map(|job| &job.url));

        let limiter = match self.options.rate.and_then(NonZeroU32::new) {
            Some(rate) => Some(Arc::new(RateLimiter::direct(Quota::per_second(rate)))),
            None => None,
        };

        let errors = Arc::new(AtomicUsize::new(0));
        let (result_tx, mut result_rx) = mpsc::channel::<OutputRecord>(1024);

        let worker = ProbeWorker {
            probe,
            patterns: self.options.status_patterns.clone(),
            exclude_size: self.options.exclude_size,
            mode: self.options.mode,
            policy,
            limiter,
            pb: pb.clone(),
            tx: result_tx,
            errors: Arc::clone(&errors),
        };

        let pool = Pool::new(self.options.concurrency, worker);
        let queue = pool.queue();
        pb.set_length(seeds.len() as u64);
        for job in seeds {
            queue.submit(job);
        }

        let collect_handle = task::spawn(async move {
            let mut out: Vec<OutputRecord> = Vec::new();
            while let Some(record) = result_rx.recv().await {
                out.push(record);
            }
            out
        });

        let probed = pool.run().await;
        let hits = collect_handle.await.unwrap_or_default();

        Ok(ScanResult {
            elapsed: started_at.elapsed(),
            probed,
            errors: errors.load(Ordering::Relaxed),
            hits,
        })
    }
}

pub(crate) async fn load_wordlist(
    source: Option<&WordlistSource>,
) -> Result<Vec<String>, RunnerError> {
    let source = source.ok_or(RunnerError::MissingWordlist)?;
    let out = match source {
        WordlistSource::Inline(values) => values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
        WordlistSource::FilePath(path) => {
            let path = crate::config::expand_tilde_string(path);
            let handle = File::open(&path)
                .await
                .map_err(|e| RunnerError::WordlistOpen {
                    path: path.clone(),
                    source: e,
                })?;
            let mut out = Vec::new();
            let mut lines = BufReader::new(handle).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        out.push(line.to_string());
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(RunnerError::WordlistRead { path, source: e });
                    }
                }
            }
            out
        }
    };

    if out.is_empty() {
        let path = match source {
            WordlistSource::FilePath(p) => p.clone(),
            WordlistSource::Inline(_) => "<inline>".to_string(),
        };
        return Err(RunnerError::EmptyWordlist { path });
    }
    Ok(out)
}

struct ProbeWorker {
    probe: Arc<dyn Probe>,
    patterns: Vec<StatusPattern>,
    exclude_size: Option<u64>,
    mode: Mode,
    policy: RecursionPolicy,
    limiter: Option<Arc<DirectRateLimiter>>,
    pb: ProgressBar,
    tx: mpsc::Sender<OutputRecord>,
    errors: Arc<AtomicUsize>,
}

impl ProbeWorker {
    fn build_record(&self, job: &Job, result: &FetchResult) -> OutputRecord {
        let redirect = if result.status.starts_with('3') {
            let dest = match job.url.join(&result.meta) {
                Ok(resolved) => output::display_target(&resolved, self.mode),
                Err(_) => result.meta.clone(),
            };
            Some(dest)
        } else {
            None
        };
        OutputRecord {
            url: job.url.to_string(),
            target: output::display_target(&job.url, self.mode),
            status: result.status.clone(),
            meta: result.meta.clone(),
            size: result.size,
            depth: job.depth,
            redirect,
        }
    }
}

#[async_trait]
impl JobHandler for ProbeWorker {
    async fn handle(&self, job: Job, queue: &JobQueue) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let result = self.probe.fetch(&job.url).await;
        self.pb.inc(1);

        if let Some(error) = &result.error {
            self.errors.fetch_add(1, Ordering::Relaxed);
            tracing::info!(url = %job.url, %error, "probe failed");
            // a failed body read still leaves a usable header behind
            if result.status.is_empty() {
                return;
            }
        }

        if !filter::should_report(
            &result.status,
            result.size,
            &self.patterns,
            self.exclude_size,
        ) {
            return;
        }

        let record = self.build_record(&job, &result);
        self.pb.println(output::format_hit_line(&record));
        let _ = self.tx.send(record).await;

        let children = self.policy.children(&job, &result);
        if !children.is_empty() {
            tracing::info!(
                url = %job.url,
                depth = job.depth,
                count = children.len(),
                "discovered directory, queueing follow-ups"
            );
            self.pb.inc_length(children.len() as u64);
            for child in children {
                queue.submit(child);
            }
        }
    }
}
