//! Bounded worker pool that turns a URL list into a stream of [`PageOutcome`]s.
//!
//! All URLs are placed on a shared work queue up front. A fixed number of
//! workers pull from it until it is empty or the run is cancelled, sleeping
//! the per-worker delay before every page. Outcomes arrive on a channel in
//! completion order; the channel closes once the last worker exits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docscloner_shared::PageOutcome;

/// Per-page work performed by a scheduler worker.
///
/// Implementations must not fail: every error is captured in the returned
/// outcome so that one page never affects another.
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn handle(&self, index: usize, url: &str) -> PageOutcome;
}

type WorkQueue = Arc<Mutex<mpsc::UnboundedReceiver<(usize, String)>>>;

/// Fixed-size worker pool with per-worker pacing.
#[derive(Debug, Clone)]
pub struct CrawlScheduler {
    concurrency: usize,
    delay: Duration,
}

impl CrawlScheduler {
    /// `concurrency` is clamped to at least one worker.
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay,
        }
    }

    /// Start the workers and return the outcome stream.
    ///
    /// Must be called from within a Tokio runtime. Each URL is handled by
    /// exactly one worker (its list position is passed along as the index).
    /// Once `cancel` fires, workers stop taking new URLs; pages already being
    /// handled run to completion and their outcomes are still delivered.
    pub fn run(
        &self,
        urls: Vec<String>,
        handler: Arc<dyn PageHandler>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<PageOutcome> {
        let total = urls.len();
        let workers = self.concurrency.min(total.max(1));

        let (work_tx, work_rx) = mpsc::unbounded_channel();
        for item in urls.into_iter().enumerate() {
            // The receiver is alive in this scope, so send cannot fail.
            let _ = work_tx.send(item);
        }
        drop(work_tx);
        let queue: WorkQueue = Arc::new(Mutex::new(work_rx));

        let (result_tx, result_rx) = mpsc::channel(workers * 2);

        info!(
            pages = total,
            workers,
            delay_ms = self.delay.as_millis() as u64,
            "starting workers"
        );

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            set.spawn(worker_loop(
                worker_id,
                queue.clone(),
                handler.clone(),
                result_tx.clone(),
                cancel.clone(),
                self.delay,
            ));
        }
        drop(result_tx);

        // Supervisor: surfaces worker panics. The outcome channel closes on
        // its own when the last worker drops its sender.
        tokio::spawn(async move {
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "worker task failed");
                }
            }
            debug!("all workers finished");
        });

        result_rx
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: WorkQueue,
    handler: Arc<dyn PageHandler>,
    results: mpsc::Sender<PageOutcome>,
    cancel: CancellationToken,
    delay: Duration,
) {
    let mut handled = 0usize;

    loop {
        if cancel.is_cancelled() {
            debug!(worker_id, "cancelled, not taking more work");
            break;
        }

        let next = queue.lock().await.recv().await;
        let Some((index, url)) = next else {
            break;
        };

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    debug!(worker_id, %url, "cancelled during delay");
                    break;
                }
            }
        }

        let outcome = handler.handle(index, &url).await;
        handled += 1;

        if results.send(outcome).await.is_err() {
            debug!(worker_id, "collector gone, stopping");
            break;
        }
    }

    debug!(worker_id, handled, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use docscloner_shared::DocsClonerError;

    /// Sleeps briefly per page, tracking peak parallelism.
    #[derive(Default)]
    struct CountingHandler {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        work: Duration,
    }

    impl CountingHandler {
        fn with_work(work: Duration) -> Self {
            Self {
                work,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PageHandler for CountingHandler {
        async fn handle(&self, index: usize, url: &str) -> PageOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if url.ends_with("/fail") {
                PageOutcome::failure(index, url, DocsClonerError::Http { url: url.into(), status: 500 })
            } else {
                PageOutcome::success(index, url, format!("Page {index}"), String::new())
            }
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://x.test/p{i}")).collect()
    }

    async fn collect(mut rx: mpsc::Receiver<PageOutcome>) -> Vec<PageOutcome> {
        let mut out = Vec::new();
        while let Some(o) = rx.recv().await {
            out.push(o);
        }
        out
    }

    #[tokio::test]
    async fn every_url_handled_exactly_once_for_any_concurrency() {
        let n = 7;
        for concurrency in 1..=n {
            let handler = Arc::new(CountingHandler::with_work(Duration::from_millis(2)));
            let rx = CrawlScheduler::new(concurrency, Duration::ZERO).run(
                urls(n),
                handler,
                CancellationToken::new(),
            );
            let outcomes = collect(rx).await;

            assert_eq!(outcomes.len(), n, "concurrency {concurrency}");
            let seen: HashSet<String> = outcomes.iter().map(|o| o.source_url.clone()).collect();
            assert_eq!(seen, urls(n).into_iter().collect::<HashSet<_>>());
            let indices: HashSet<usize> = outcomes.iter().map(|o| o.index).collect();
            assert_eq!(indices, (0..n).collect::<HashSet<_>>());
        }
    }

    #[tokio::test]
    async fn duplicate_urls_each_get_an_outcome() {
        let list = vec!["https://x.test/a".to_string(), "https://x.test/a".to_string()];
        let handler = Arc::new(CountingHandler::default());
        let rx = CrawlScheduler::new(2, Duration::ZERO).run(list, handler, CancellationToken::new());
        assert_eq!(collect(rx).await.len(), 2);
    }

    #[tokio::test]
    async fn worker_count_is_bounded() {
        let handler = Arc::new(CountingHandler::with_work(Duration::from_millis(20)));
        let rx = CrawlScheduler::new(3, Duration::ZERO).run(
            urls(12),
            handler.clone(),
            CancellationToken::new(),
        );
        collect(rx).await;

        assert_eq!(handler.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_do_not_affect_other_pages() {
        let mut list = urls(3);
        list.insert(1, "https://x.test/fail".into());
        let handler = Arc::new(CountingHandler::default());
        let outcomes = collect(CrawlScheduler::new(2, Duration::ZERO).run(
            list,
            handler,
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 3);
    }

    #[tokio::test]
    async fn delay_applies_before_every_page() {
        let handler = Arc::new(CountingHandler::default());
        let start = Instant::now();
        let outcomes = collect(CrawlScheduler::new(1, Duration::from_millis(40)).run(
            urls(3),
            handler,
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(outcomes.len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn cancelled_before_start_yields_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let handler = Arc::new(CountingHandler::default());
        let outcomes = collect(CrawlScheduler::new(4, Duration::ZERO).run(urls(10), handler, cancel)).await;
        assert!(outcomes.is_empty());
    }

    /// Cancels the run while handling the first page.
    struct CancelOnFirst {
        cancel: CancellationToken,
    }

    #[async_trait]
    impl PageHandler for CancelOnFirst {
        async fn handle(&self, index: usize, url: &str) -> PageOutcome {
            self.cancel.cancel();
            PageOutcome::success(index, url, String::new(), String::new())
        }
    }

    #[tokio::test]
    async fn in_flight_page_finishes_after_cancel() {
        let cancel = CancellationToken::new();
        let handler = Arc::new(CancelOnFirst {
            cancel: cancel.clone(),
        });
        let outcomes = collect(CrawlScheduler::new(1, Duration::ZERO).run(urls(5), handler, cancel)).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].index, 0);
        assert!(outcomes[0].is_success());
    }

    #[tokio::test]
    async fn empty_input_closes_stream() {
        let handler = Arc::new(CountingHandler::default());
        let outcomes = collect(CrawlScheduler::new(5, Duration::ZERO).run(
            Vec::new(),
            handler,
            CancellationToken::new(),
        ))
        .await;
        assert!(outcomes.is_empty());
    }
}
