use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task;
use url::Url;

/// One unit of work: a candidate URL plus the number of directory-discovery
/// hops that produced it. Jobs are never mutated after creation; recursive
/// children are new values derived from the parent.
#[derive(Clone, Debug)]
pub struct Job {
    pub url: Url,
    pub depth: usize,
}

/// Processes one job. Child jobs must be submitted through the queue *inside*
/// `handle`; the pool decrements the outstanding count only after `handle`
/// returns, so children are always counted before their parent completes.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job, queue: &JobQueue);
}

struct QueueShared {
    tx: mpsc::UnboundedSender<Job>,
    outstanding: AtomicUsize,
    processed: AtomicUsize,
    idle: Notify,
}

/// Handle onto the shared job queue. Submission never blocks: the channel is
/// unbounded, since recursion can add more jobs than any capacity sized to
/// the seed batch would allow.
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<QueueShared>,
}

impl JobQueue {
    pub fn submit(&self, job: Job) {
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        // send only fails after shutdown, when outstanding is already drained
        let _ = self.shared.tx.send(job);
    }

    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.shared.processed.load(Ordering::SeqCst)
    }

    fn finish_job(&self) {
        self.shared.processed.fetch_add(1, Ordering::SeqCst);
        if self.shared.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.idle.notify_one();
        }
    }
}

/// Fixed-size worker pool over a dynamically growing job queue.
///
/// Workers may enqueue new jobs while the pool is draining, so completion
/// cannot be detected by closing the channel after seeding. Instead an
/// outstanding-work counter is incremented on every submit and decremented
/// when a job (and any children it submitted) has been handled; the pool is
/// done exactly when the counter reaches zero.
pub struct Pool<H> {
    queue: JobQueue,
    rx: mpsc::UnboundedReceiver<Job>,
    workers: usize,
    handler: Arc<H>,
}

impl<H: JobHandler> Pool<H> {
    pub fn new(workers: usize, handler: H) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = JobQueue {
            shared: Arc::new(QueueShared {
                tx,
                outstanding: AtomicUsize::new(0),
                processed: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        };
        Self {
            queue,
            rx,
            workers: workers.max(1),
            handler: Arc::new(handler),
        }
    }

    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    /// Runs until no job is pending or in flight, then returns the number of
    /// jobs processed. Jobs must have been submitted before calling.
    pub async fn run(mut self) -> usize {
        if self.queue.outstanding() == 0 {
            return 0;
        }

        let mut worker_txs = Vec::with_capacity(self.workers);
        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let (tx, mut rx) = mpsc::channel::<Job>(1024);
            worker_txs.push(tx);
            let handler = Arc::clone(&self.handler);
            let queue = self.queue.clone();
            handles.push(task::spawn(async move {
                while let Some(job) = rx.recv().await {
                    handler.handle(job, &queue).await;
                    queue.finish_job();
                }
            }));
        }

        // Round-robin jobs to the workers until the outstanding count hits
        // zero. A job can only sit in the channel while the counter is
        // non-zero, so the idle wakeup never races a pending job.
        let mut idx = 0usize;
        loop {
            tokio::select! {
                _ = self.queue.shared.idle.notified() => break,
                job = self.rx.recv() => match job {
                    Some(job) => {
                        let tx = &worker_txs[idx % worker_txs.len()];
                        if tx.send(job).await.is_err() {
                            break;
                        }
                        idx = idx.wrapping_add(1);
                    }
                    None => break,
                },
            }
        }

        drop(worker_txs);
        for handle in handles {
            let _ = handle.await;
        }
        self.queue.processed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Countdown {
        children: usize,
        max_depth: usize,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for Countdown {
        async fn handle(&self, job: Job, queue: &JobQueue) {
            self.seen.fetch_add(1, Ordering::SeqCst);
            // yield so submissions interleave across workers
            tokio::task::yield_now().await;
            if job.depth < self.max_depth {
                for _ in 0..self.children {
                    queue.submit(Job {
                        url: job.url.clone(),
                        depth: job.depth + 1,
                    });
                }
            }
        }
    }

    fn job() -> Job {
        Job {
            url: Url::parse("gemini://example.org/").unwrap(),
            depth: 0,
        }
    }

    // total = N * (1 + K + K^2 + ... + K^depth)
    fn expected(seeds: usize, children: usize, depth: usize) -> usize {
        let mut per_seed = 0usize;
        let mut layer = 1usize;
        for _ in 0..=depth {
            per_seed += layer;
            layer *= children;
        }
        seeds * per_seed
    }

    #[tokio::test]
    async fn empty_queue_returns_immediately() {
        let pool = Pool::new(4, Countdown {
            children: 0,
            max_depth: 0,
            seen: AtomicUsize::new(0),
        });
        assert_eq!(pool.run().await, 0);
    }

    #[tokio::test]
    async fn drains_seed_jobs_without_recursion() {
        let pool = Pool::new(3, Countdown {
            children: 0,
            max_depth: 0,
            seen: AtomicUsize::new(0),
        });
        let queue = pool.queue();
        for _ in 0..25 {
            queue.submit(job());
        }
        assert_eq!(pool.run().await, 25);
        assert_eq!(queue.outstanding(), 0);
    }

    #[tokio::test]
    async fn processes_full_recursion_tree() {
        let seeds = 4;
        let children = 3;
        let depth = 3;
        let pool = Pool::new(8, Countdown {
            children,
            max_depth: depth,
            seen: AtomicUsize::new(0),
        });
        let queue = pool.queue();
        for _ in 0..seeds {
            queue.submit(job());
        }
        let processed = pool.run().await;
        assert_eq!(processed, expected(seeds, children, depth));
    }

    #[tokio::test]
    async fn recursion_wider_than_seed_count_does_not_deadlock() {
        // each of 2 seeds fans out into 50 children; a queue bounded to the
        // seed count would wedge here
        let pool = Pool::new(2, Countdown {
            children: 50,
            max_depth: 1,
            seen: AtomicUsize::new(0),
        });
        let queue = pool.queue();
        queue.submit(job());
        queue.submit(job());
        let processed = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            pool.run(),
        )
        .await
        .expect("pool failed to terminate");
        assert_eq!(processed, 2 * (1 + 50));
    }

    #[tokio::test]
    async fn single_worker_still_terminates() {
        let pool = Pool::new(1, Countdown {
            children: 2,
            max_depth: 2,
            seen: AtomicUsize::new(0),
        });
        let queue = pool.queue();
        queue.submit(job());
        assert_eq!(pool.run().await, expected(1, 2, 2));
    }
}
