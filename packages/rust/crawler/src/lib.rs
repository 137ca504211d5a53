//! Page fetching, content extraction, and the crawl worker pool.
//!
//! This crate provides:
//! - [`HttpFetcher`] — reqwest-backed [`PageFetcher`](docscloner_shared::PageFetcher) with gzip support
//! - [`extract`] — main-content isolation via explicit selector or heuristic cascade
//! - [`UrlFilter`] — include/exclude substring filtering of the resolved URL list
//! - [`CrawlScheduler`] — bounded, cancellable worker pool producing page outcomes

pub mod extract;
pub mod fetcher;
pub mod filter;
pub mod scheduler;

pub use extract::{ExtractionResult, HEURISTIC_SELECTORS, MIN_CONTENT_CHARS, NOISE_SELECTORS, extract};
pub use fetcher::HttpFetcher;
pub use filter::{UrlFilter, unmangle_msys_path};
pub use scheduler::{CrawlScheduler, PageHandler};
