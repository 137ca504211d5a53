//! Configuration for docs-cloner.
//!
//! An optional config file lives at `~/.docs-cloner/docs-cloner.toml`.
//! CLI flags override config file values, which override defaults. The merged
//! result is an immutable [`RunConfig`] threaded through every component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocsClonerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docs-cloner.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docs-cloner";

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("docs-cloner/", env!("CARGO_PKG_VERSION"));

/// Raw-markdown URL pattern used when `--fetch-md` is given without a value.
pub const DEFAULT_MD_PATTERN: &str = "{url}.md";

// ---------------------------------------------------------------------------
// Config file structs (matching docs-cloner.toml schema)
// ---------------------------------------------------------------------------

/// Top-level file config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// URL filters applied to every run.
    #[serde(default)]
    pub filters: FiltersConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Output directory for the mirrored tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Number of concurrent workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause before each page request, per worker.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// User-Agent header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Overall timeout for a single request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            delay_ms: default_delay_ms(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_concurrency() -> usize {
    5
}
fn default_delay_ms() -> u64 {
    200
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[filters]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// A URL must contain at least one of these substrings.
    #[serde(default)]
    pub include: Vec<String>,

    /// A URL must contain none of these substrings.
    #[serde(default)]
    pub exclude: Vec<String>,
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// How each page is turned into Markdown. Chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertMode {
    /// Fetch HTML, extract main content, convert to Markdown.
    Html {
        /// Explicit CSS selector for the content region (skips heuristics).
        selector: Option<String>,
    },
    /// Fetch already-Markdown content from a URL derived via `pattern`.
    RawMarkdown {
        /// Template with `{url}`, `{path}` and `{host}` placeholders.
        pattern: String,
    },
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub sitemap_url: String,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub delay_ms: Option<u64>,
    /// `Some` switches to raw-markdown mode; the value is the URL pattern.
    pub fetch_md: Option<String>,
    pub selector: Option<String>,
    pub single_file: bool,
    pub clean: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub verbose: bool,
    pub user_agent: Option<String>,
}

/// Immutable, validated configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Entry sitemap (page list or index).
    pub sitemap_url: Url,
    /// Root of the mirrored output tree.
    pub output_dir: PathBuf,
    /// Number of concurrent workers (>= 1).
    pub concurrency: usize,
    /// Pause before every page fetch, per worker.
    pub delay: Duration,
    /// HTML conversion or raw-markdown fetch.
    pub mode: ConvertMode,
    /// Also write `all-pages.md`.
    pub single_file: bool,
    /// Remove the output directory before writing.
    pub clean: bool,
    /// Include substrings (any must match).
    pub include: Vec<String>,
    /// Exclude substrings (none may match).
    pub exclude: Vec<String>,
    /// Log every successful page.
    pub verbose: bool,
    /// User-Agent header value.
    pub user_agent: String,
    /// Overall per-request timeout.
    pub timeout: Duration,
}

impl RunConfig {
    /// Merge CLI overrides on top of the file config and validate the result.
    pub fn resolve(app: &AppConfig, overrides: RunOverrides) -> Result<Self> {
        let sitemap_url = Url::parse(&overrides.sitemap_url).map_err(|e| {
            DocsClonerError::config(format!(
                "invalid sitemap URL '{}': {e}",
                overrides.sitemap_url
            ))
        })?;
        if sitemap_url.scheme() != "http" && sitemap_url.scheme() != "https" {
            return Err(DocsClonerError::config(format!(
                "sitemap URL must be http or https, got '{sitemap_url}'"
            )));
        }

        let concurrency = overrides.concurrency.unwrap_or(app.defaults.concurrency);
        if concurrency < 1 {
            return Err(DocsClonerError::config("concurrency must be at least 1"));
        }

        let mode = match (overrides.fetch_md, overrides.selector) {
            (Some(_), Some(_)) => {
                return Err(DocsClonerError::config(
                    "--fetch-md and --selector cannot be used together",
                ));
            }
            (Some(pattern), None) => {
                let pattern = if pattern.trim().is_empty() {
                    DEFAULT_MD_PATTERN.to_string()
                } else {
                    pattern
                };
                ConvertMode::RawMarkdown { pattern }
            }
            (None, Some(selector)) => {
                scraper::Selector::parse(&selector).map_err(|e| {
                    DocsClonerError::config(format!("invalid selector '{selector}': {e}"))
                })?;
                ConvertMode::Html {
                    selector: Some(selector),
                }
            }
            (None, None) => ConvertMode::Html { selector: None },
        };

        let mut include = app.filters.include.clone();
        include.extend(overrides.include.into_iter().filter(|s| !s.is_empty()));
        let mut exclude = app.filters.exclude.clone();
        exclude.extend(overrides.exclude.into_iter().filter(|s| !s.is_empty()));

        Ok(Self {
            sitemap_url,
            output_dir: overrides
                .output_dir
                .unwrap_or_else(|| PathBuf::from(&app.defaults.output_dir)),
            concurrency,
            delay: Duration::from_millis(overrides.delay_ms.unwrap_or(app.defaults.delay_ms)),
            mode,
            single_file: overrides.single_file,
            clean: overrides.clean,
            include,
            exclude,
            verbose: overrides.verbose,
            user_agent: overrides
                .user_agent
                .unwrap_or_else(|| app.defaults.user_agent.clone()),
            timeout: Duration::from_secs(app.defaults.timeout_secs),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docs-cloner/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocsClonerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docs-cloner/docs-cloner.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the file config from its default location. Returns defaults if the
/// file does not exist or no home directory is available.
pub fn load_config() -> Result<AppConfig> {
    let Ok(path) = config_file_path() else {
        return Ok(AppConfig::default());
    };

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the file config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsClonerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DocsClonerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}
