//! Include/exclude URL filtering.
//!
//! Filters are plain substring matches against the full URL, applied once to
//! the resolved URL list before any page is scheduled.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

/// Git Bash on Windows rewrites arguments that start with `/` into Windows
/// paths under the Git install dir, e.g. `/docs/` → `C:/Program Files/Git/docs/`.
static MSYS_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:/.*?/Git(/.*)$").expect("valid regex"));

/// Substring include/exclude predicate over page URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl UrlFilter {
    /// Build a filter. On Windows, MSYS-mangled patterns are restored first.
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        if cfg!(windows) {
            Self {
                include: include.into_iter().map(restore_msys_pattern).collect(),
                exclude: exclude.into_iter().map(restore_msys_pattern).collect(),
            }
        } else {
            Self { include, exclude }
        }
    }

    /// `true` when neither list has entries.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// A URL passes when it contains at least one include term (if any are
    /// set) and no exclude term. Exclusion wins over inclusion.
    pub fn matches(&self, url: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| url.contains(p.as_str())) {
            return false;
        }
        !self.exclude.iter().any(|p| url.contains(p.as_str()))
    }

    /// Keep only the URLs that pass, preserving order.
    pub fn apply(&self, urls: Vec<String>) -> Vec<String> {
        if self.is_empty() {
            return urls;
        }

        let before = urls.len();
        let kept: Vec<String> = urls.into_iter().filter(|u| self.matches(u)).collect();
        info!(kept = kept.len(), total = before, "filtered URLs");
        kept
    }
}

fn restore_msys_pattern(pattern: String) -> String {
    match unmangle_msys_path(&pattern) {
        Some(fixed) => {
            info!(from = %pattern, to = %fixed, "auto-corrected MSYS path");
            fixed
        }
        None => pattern,
    }
}

/// Recover the original unix-style path from an MSYS-mangled one.
pub fn unmangle_msys_path(pattern: &str) -> Option<String> {
    let caps = MSYS_PATH_RE.captures(pattern)?;
    let fixed = caps.get(1)?.as_str().to_string();
    debug!(%pattern, %fixed, "MSYS path detected");
    Some(fixed)
}
