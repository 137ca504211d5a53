//! Sitemap resolution.
//!
//! docs-cloner never discovers links on its own: the XML sitemap is the whole
//! crawl frontier. [`SitemapResolver`] fetches the entry sitemap and, when it is
//! a `<sitemapindex>`, recursively flattens every sub-sitemap into one ordered
//! list of page URLs.

mod parser;

use docscloner_shared::{DocsClonerError, PageFetcher, Result};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use parser::{SitemapDocument, parse_sitemap};

// ---------------------------------------------------------------------------
// ResolvedUrlSet
// ---------------------------------------------------------------------------

/// Flattened output of a resolution run.
#[derive(Debug, Clone, Default)]
pub struct ResolvedUrlSet {
    /// Page URLs in first-seen order. Duplicates are kept.
    pub urls: Vec<String>,
    /// One message per sub-sitemap that could not be resolved.
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves an entry sitemap into a flat list of page URLs.
pub struct SitemapResolver<'a> {
    fetcher: &'a dyn PageFetcher,
}

impl<'a> SitemapResolver<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch `entry` and flatten it.
    ///
    /// Failure to fetch or parse the entry document is returned as an error.
    /// Failures below it (sub-sitemaps) become warnings and their URLs are
    /// simply absent from the result.
    #[instrument(skip_all, fields(url = %entry))]
    pub async fn resolve(&self, entry: &Url) -> Result<ResolvedUrlSet> {
        info!("fetching sitemap");

        let doc = self.load(entry).await?;
        let mut ancestors = vec![entry.to_string()];
        let mut out = ResolvedUrlSet::default();

        self.expand(entry, doc, &mut ancestors, &mut out).await;

        info!(
            urls = out.urls.len(),
            warnings = out.warnings.len(),
            "sitemap resolved"
        );
        Ok(out)
    }

    /// Append the pages reachable from `doc` to `out`, depth-first, in
    /// document order.
    ///
    /// `ancestors` is the chain of sitemaps from the entry down to `base`. A
    /// sub-sitemap is skipped only when it already appears in that chain;
    /// one listed several times elsewhere is expanded each time.
    async fn expand(
        &self,
        base: &Url,
        doc: SitemapDocument,
        ancestors: &mut Vec<String>,
        out: &mut ResolvedUrlSet,
    ) {
        match doc {
            SitemapDocument::PageList { urls } => {
                debug!(sitemap = %base, count = urls.len(), "page list");
                for loc in urls {
                    match absolutize(base, &loc) {
                        Some(url) => out.urls.push(url),
                        None => warn!(sitemap = %base, %loc, "skipping unparseable <loc>"),
                    }
                }
            }
            SitemapDocument::SitemapIndex { sub_sitemaps } => {
                debug!(sitemap = %base, count = sub_sitemaps.len(), "sitemap index");
                for loc in sub_sitemaps {
                    let Some(sub_url) = absolutize(base, &loc).and_then(|u| Url::parse(&u).ok())
                    else {
                        record_warning(out, &loc, &DocsClonerError::validation("invalid URL"));
                        continue;
                    };

                    if ancestors.iter().any(|a| a == sub_url.as_str()) {
                        warn!(sitemap = %sub_url, "sub-sitemap includes itself, skipping cycle");
                        continue;
                    }

                    match self.load(&sub_url).await {
                        Ok(sub_doc) => {
                            ancestors.push(sub_url.to_string());
                            Box::pin(self.expand(&sub_url, sub_doc, ancestors, out)).await;
                            ancestors.pop();
                        }
                        Err(e) => record_warning(out, sub_url.as_str(), &e),
                    }
                }
            }
        }
    }

    /// Fetch and parse one sitemap document.
    async fn load(&self, url: &Url) -> Result<SitemapDocument> {
        let body = self.fetcher.fetch(url.as_str()).await?;
        parse_sitemap(&body).map_err(|e| match e {
            DocsClonerError::Parse { message } => DocsClonerError::parse(format!("{url}: {message}")),
            other => other,
        })
    }
}

fn record_warning(out: &mut ResolvedUrlSet, sitemap: &str, error: &DocsClonerError) {
    warn!(%sitemap, error = %error, "sub-sitemap failed, skipping");
    out.warnings.push(format!("sub-sitemap {sitemap} failed: {error}"));
}

/// Absolute `<loc>` values are kept verbatim; relative ones are joined onto
/// the sitemap's own URL.
fn absolutize(base: &Url, loc: &str) -> Option<String> {
    if Url::parse(loc).is_ok() {
        return Some(loc.to_string());
    }
    base.join(loc).ok().map(|u| u.to_string())
}
