//! End-to-end clone pipeline: sitemap → filter → workers → files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use docscloner_crawler::{CrawlScheduler, UrlFilter};
use docscloner_shared::{DocsClonerError, PageFetcher, PageOutcome, Result, RunConfig};
use docscloner_sitemap::SitemapResolver;

use crate::processor::PageProcessor;
use crate::writer::{OutputWriter, PageRecord};

/// Result of a completed (or cancelled) run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Pages scheduled after filtering.
    pub total: usize,
    /// Pages written to disk.
    pub written: usize,
    /// Pages that failed to fetch, convert, or write.
    pub errors: usize,
    /// Sub-sitemaps that could not be resolved.
    pub sitemap_warnings: usize,
    /// Path of `all-pages.md`, when written.
    pub aggregate: Option<PathBuf>,
    /// The run was interrupted before every page was handled.
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per collected page outcome.
    fn page_done(&self, url: &str, ok: bool, done: usize, total: usize);
    /// Called when the pipeline completes, successfully or not.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_done(&self, _url: &str, _ok: bool, _done: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the whole clone.
///
/// 1. Resolve the sitemap (entry failure is fatal)
/// 2. Apply include/exclude filters
/// 3. Optionally clean the output directory
/// 4. Fan pages out to the worker pool and write each outcome as it arrives
/// 5. Optionally write `all-pages.md`
///
/// Page failures are counted, not returned. The run fails only when no page
/// was written and at least one failed.
#[instrument(skip_all, fields(sitemap = %config.sitemap_url))]
pub async fn run(
    config: Arc<RunConfig>,
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    // --- Phase 1: Sitemap ---
    progress.phase("Resolving sitemap");
    let resolved = SitemapResolver::new(fetcher.as_ref())
        .resolve(&config.sitemap_url)
        .await?;
    info!(urls = resolved.urls.len(), "found URLs in sitemap");

    let filter = UrlFilter::new(config.include.clone(), config.exclude.clone());
    let urls = filter.apply(resolved.urls);

    let mut summary = RunSummary {
        total: urls.len(),
        sitemap_warnings: resolved.warnings.len(),
        ..RunSummary::default()
    };

    if urls.is_empty() {
        info!("no URLs to process, nothing to do");
        summary.elapsed = start.elapsed();
        progress.done(&summary);
        return Ok(summary);
    }

    // --- Phase 2: Output directory ---
    if config.clean {
        clean_output_dir(&config.output_dir)?;
    }

    // --- Phase 3: Crawl + write ---
    progress.phase("Cloning pages");
    let handler = Arc::new(PageProcessor::new(config.clone(), fetcher.clone()));
    let mut outcomes = CrawlScheduler::new(config.concurrency, config.delay).run(
        urls,
        handler,
        cancel.clone(),
    );

    let writer = OutputWriter::new(&config.output_dir);
    let mut records: Vec<PageRecord> = Vec::new();
    let mut done = 0usize;

    while let Some(outcome) = outcomes.recv().await {
        done += 1;
        let url = outcome.source_url.clone();
        let ok = collect_outcome(&config, &writer, outcome, &mut summary, &mut records, done);
        progress.page_done(&url, ok, done, summary.total);
    }

    summary.cancelled = cancel.is_cancelled() && done < summary.total;
    if summary.cancelled {
        warn!(handled = done, total = summary.total, "run cancelled, remaining pages skipped");
    }

    // --- Phase 4: Aggregate ---
    if config.single_file && !records.is_empty() {
        progress.phase("Writing all-pages.md");
        summary.aggregate = Some(writer.write_aggregate(records)?);
    }

    summary.elapsed = start.elapsed();
    info!(
        written = summary.written,
        errors = summary.errors,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Done. {} pages written, {} errors.",
        summary.written,
        summary.errors
    );
    progress.done(&summary);

    if summary.written == 0 && summary.errors > 0 {
        return Err(DocsClonerError::AllPagesFailed {
            failed: summary.errors,
        });
    }

    Ok(summary)
}

/// Write one outcome and update the counters. Returns whether the page made
/// it to disk.
fn collect_outcome(
    config: &RunConfig,
    writer: &OutputWriter,
    outcome: PageOutcome,
    summary: &mut RunSummary,
    records: &mut Vec<PageRecord>,
    done: usize,
) -> bool {
    let total = summary.total;
    let PageOutcome {
        index,
        source_url,
        title,
        crawled_at,
        body,
    } = outcome;

    let result = body.and_then(|markdown| {
        writer
            .write_page(&source_url, &title, crawled_at, &markdown)
            .map(|path| (path, markdown))
    });

    match result {
        Ok((path, markdown)) => {
            summary.written += 1;
            if config.verbose {
                info!(done, total, url = %source_url, path = %path.display(), "[{done}/{total}] OK");
            } else {
                debug!(done, total, url = %source_url, path = %path.display(), "[{done}/{total}] OK");
            }
            if config.single_file {
                records.push(PageRecord {
                    index,
                    source_url,
                    title,
                    markdown,
                });
            }
            true
        }
        Err(e) => {
            summary.errors += 1;
            warn!(done, total, url = %source_url, error = %e, "[{done}/{total}] ERROR");
            false
        }
    }
}

fn clean_output_dir(dir: &std::path::Path) -> Result<()> {
    info!(path = %dir.display(), "cleaning output directory");
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DocsClonerError::io(dir, e)),
    }
}
