//! Core domain types shared across the docs-cloner crates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DocsClonerError, Result};

// ---------------------------------------------------------------------------
// Fetch capability
// ---------------------------------------------------------------------------

/// Fetches the body of an absolute URL.
///
/// Implementations own User-Agent handling and gzip decompression; callers
/// only ever see the decoded bytes. Non-2xx responses are errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// PageOutcome
// ---------------------------------------------------------------------------

/// The result of processing one page, built in full by a worker and handed
/// to the collector.
#[derive(Debug)]
pub struct PageOutcome {
    /// Position of the page in the resolved (filtered) URL list.
    pub index: usize,
    /// The page URL as listed in the sitemap.
    pub source_url: String,
    /// Page title; empty when none could be derived.
    pub title: String,
    /// When the page was processed.
    pub crawled_at: DateTime<Utc>,
    /// Normalized Markdown body, or the reason the page failed.
    pub body: Result<String>,
}

impl PageOutcome {
    /// A successful outcome.
    pub fn success(index: usize, source_url: impl Into<String>, title: String, markdown: String) -> Self {
        Self {
            index,
            source_url: source_url.into(),
            title,
            crawled_at: Utc::now(),
            body: Ok(markdown),
        }
    }

    /// A failed outcome.
    pub fn failure(index: usize, source_url: impl Into<String>, error: DocsClonerError) -> Self {
        Self {
            index,
            source_url: source_url.into(),
            title: String::new(),
            crawled_at: Utc::now(),
            body: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.body.is_ok()
    }
}
