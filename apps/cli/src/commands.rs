//! CLI definition, tracing setup, and the clone command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use docscloner_core::{ProgressReporter, RunSummary};
use docscloner_crawler::HttpFetcher;
use docscloner_shared::{
    AppConfig, DEFAULT_MD_PATTERN, PageFetcher, RunConfig, RunOverrides, load_config,
    load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docs-cloner — clone documentation sites into AI-friendly Markdown.
///
/// Two modes: HTML-to-Markdown (default) extracts each page's main content
/// and converts it; raw Markdown (--fetch-md) fetches an alternate `.md` URL
/// derived from each page URL.
#[derive(Parser, Debug)]
#[command(name = "docs-cloner", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Sitemap URL (a page list or a sitemap index).
    #[arg(short, long)]
    pub url: String,

    /// Output directory [default: ./output].
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers [default: 5].
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Delay before each request, per worker, in milliseconds [default: 200].
    #[arg(short, long, value_name = "MS")]
    pub delay: Option<u64>,

    /// Fetch raw Markdown from a URL pattern instead of converting HTML.
    /// Placeholders: {url}, {path}, {host}. Without a value: {url}.md
    #[arg(
        long,
        value_name = "PATTERN",
        num_args = 0..=1,
        default_missing_value = DEFAULT_MD_PATTERN,
        conflicts_with = "selector"
    )]
    pub fetch_md: Option<String>,

    /// Also write a single concatenated all-pages.md.
    #[arg(long)]
    pub single_file: bool,

    /// CSS selector for the main content area (default: auto-detect).
    #[arg(long)]
    pub selector: Option<String>,

    /// Only clone URLs containing one of these substrings (repeatable, comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Skip URLs containing any of these substrings (repeatable, comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Remove the output directory before writing.
    #[arg(long)]
    pub clean: bool,

    /// Custom User-Agent string.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Config file (defaults to ~/.docs-cloner/docs-cloner.toml).
    #[arg(long, env = "DOCS_CLONER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v logs every page, -vv traces).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn overrides(self) -> RunOverrides {
        RunOverrides {
            sitemap_url: self.url,
            output_dir: self.output,
            concurrency: self.concurrency,
            delay_ms: self.delay,
            fetch_md: self.fetch_md,
            selector: self.selector,
            single_file: self.single_file,
            clean: self.clean,
            include: self.include,
            exclude: self.exclude,
            verbose: self.verbose > 0,
            user_agent: self.user_agent,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. `RUST_LOG` takes precedence.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Level directive covering the library crates (`docscloner_*`) and this
/// binary, whose target is `docs_cloner`.
fn default_directive(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("docscloner={level},{}={level}", env!("CARGO_CRATE_NAME"))
}

// ---------------------------------------------------------------------------
// Clone command
// ---------------------------------------------------------------------------

/// Resolve configuration, run the pipeline, print a summary.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let file_config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let quiet_progress = cli.verbose > 0 || matches!(cli.log_format, LogFormat::Json);

    let config = Arc::new(build_run_config(&file_config, cli)?);
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::from_config(&config)?);

    info!(
        url = %config.sitemap_url,
        output = %config.output_dir.display(),
        concurrency = config.concurrency,
        delay_ms = config.delay.as_millis() as u64,
        "starting clone"
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let reporter = CliProgress::new(quiet_progress);
    let summary = docscloner_core::run(config.clone(), fetcher, cancel, &reporter).await?;

    print_summary(&config, &summary);
    Ok(())
}

fn build_run_config(file_config: &AppConfig, cli: Cli) -> Result<RunConfig> {
    RunConfig::resolve(file_config, cli.overrides()).wrap_err("invalid configuration")
}

/// First Ctrl-C stops workers from taking new pages; pages in flight finish
/// and are written.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight pages");
            cancel.cancel();
        }
    });
}

fn print_summary(config: &RunConfig, summary: &RunSummary) {
    println!();
    if summary.total == 0 {
        println!("  Nothing to do: no URLs left after filtering.");
        println!();
        return;
    }

    println!("  Done. {} pages written, {} errors.", summary.written, summary.errors);
    println!("  Output:   {}", config.output_dir.display());
    if let Some(aggregate) = &summary.aggregate {
        println!("  Combined: {}", aggregate.display());
    }
    if summary.sitemap_warnings > 0 {
        println!("  Skipped sub-sitemaps: {}", summary.sitemap_warnings);
    }
    if summary.cancelled {
        println!("  Interrupted: {} of {} pages handled.", summary.written + summary.errors, summary.total);
    }
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress bar on stderr. Hidden when per-page log lines are enabled so the
/// two do not interleave.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn page_done(&self, url: &str, ok: bool, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
        let status = if ok { "ok" } else { "failed" };
        self.bar.set_message(format!("{status} {url}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
