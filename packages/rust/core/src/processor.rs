//! Per-page work run by each scheduler worker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use docscloner_crawler::{PageHandler, extract};
use docscloner_markdown::{convert_html, fetch_raw, title_from_markdown};
use docscloner_shared::{ConvertMode, PageFetcher, PageOutcome, Result, RunConfig};

/// Fetches one page and turns it into Markdown according to the run's
/// [`ConvertMode`].
pub struct PageProcessor {
    config: Arc<RunConfig>,
    fetcher: Arc<dyn PageFetcher>,
}

impl PageProcessor {
    pub fn new(config: Arc<RunConfig>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Returns `(title, markdown)`.
    async fn process(&self, url: &str) -> Result<(String, String)> {
        match &self.config.mode {
            ConvertMode::Html { selector } => {
                let body = self.fetcher.fetch(url).await?;
                let (title, markdown) = html_to_markdown(&body, url, selector.as_deref())?;
                Ok((title, markdown))
            }
            ConvertMode::RawMarkdown { pattern } => {
                let markdown = fetch_raw(self.fetcher.as_ref(), url, pattern).await?;
                let title = title_from_markdown(&markdown).unwrap_or_default();
                Ok((title, markdown))
            }
        }
    }
}

/// Extract, convert, and pick a title. Falls back to the first `# ` heading
/// of the Markdown when the HTML has no title.
fn html_to_markdown(body: &[u8], url: &str, selector: Option<&str>) -> Result<(String, String)> {
    let html = String::from_utf8_lossy(body);
    let extracted = extract(&html, selector)?;
    let markdown = convert_html(&extracted.content_html, url)?;

    let title = if extracted.title.is_empty() {
        title_from_markdown(&markdown).unwrap_or_default()
    } else {
        extracted.title
    };
    Ok((title, markdown))
}

#[async_trait]
impl PageHandler for PageProcessor {
    #[instrument(skip(self))]
    async fn handle(&self, index: usize, url: &str) -> PageOutcome {
        match self.process(url).await {
            Ok((title, markdown)) => {
                debug!(mode = mode_name(&self.config.mode), %title, bytes = markdown.len(), "page processed");
                PageOutcome::success(index, url, title, markdown)
            }
            Err(e) => PageOutcome::failure(index, url, e),
        }
    }
}

fn mode_name(mode: &ConvertMode) -> &'static str {
    match mode {
        ConvertMode::Html { .. } => "html",
        ConvertMode::RawMarkdown { .. } => "raw-markdown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use docscloner_shared::{AppConfig, DocsClonerError, RunOverrides};

    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .map(|b| b.clone().into_bytes())
                .ok_or_else(|| DocsClonerError::Http { url: url.into(), status: 404 })
        }
    }

    fn processor(overrides: RunOverrides, pages: &[(&str, &str)]) -> PageProcessor {
        let config = RunConfig::resolve(&AppConfig::default(), overrides).unwrap();
        let fetcher = MapFetcher(
            pages
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
        );
        PageProcessor::new(Arc::new(config), Arc::new(fetcher))
    }

    fn overrides() -> RunOverrides {
        RunOverrides {
            sitemap_url: "https://x.test/sitemap.xml".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn html_mode_uses_document_title() {
        let p = processor(
            overrides(),
            &[(
                "https://x.test/a",
                "<html><head><title>Page A</title></head><body><main><h1>Heading A</h1><p>Plenty of body text for the heuristic gate to pass.</p></main></body></html>",
            )],
        );
        let outcome = p.handle(4, "https://x.test/a").await;

        assert_eq!(outcome.index, 4);
        assert_eq!(outcome.title, "Page A");
        let body = outcome.body.unwrap();
        assert!(body.starts_with("# Heading A"));
    }

    #[tokio::test]
    async fn html_mode_with_selector() {
        let p = processor(
            RunOverrides {
                selector: Some("#doc".into()),
                ..overrides()
            },
            &[("https://x.test/a", "<html><body><div id=\"doc\"><p>only this</p></div><p>not this</p></body></html>")],
        );
        let outcome = p.handle(0, "https://x.test/a").await;
        assert_eq!(outcome.body.unwrap(), "only this");
        assert_eq!(outcome.title, "");
    }

    #[tokio::test]
    async fn raw_mode_titles_from_markdown() {
        let p = processor(
            RunOverrides {
                fetch_md: Some("{url}.md".into()),
                ..overrides()
            },
            &[("https://x.test/guide.md", "intro line\n# Guide Title\n\ntext\n")],
        );
        let outcome = p.handle(0, "https://x.test/guide").await;
        assert_eq!(outcome.title, "Guide Title");
        assert_eq!(outcome.body.unwrap(), "intro line\n# Guide Title\n\ntext");
    }

    #[tokio::test]
    async fn fetch_failure_becomes_failed_outcome() {
        let p = processor(overrides(), &[]);
        let outcome = p.handle(1, "https://x.test/missing").await;
        assert!(!outcome.is_success());
        assert!(matches!(outcome.body, Err(DocsClonerError::Http { status: 404, .. })));
    }

    #[tokio::test]
    async fn empty_page_is_a_page_error() {
        let p = processor(overrides(), &[("https://x.test/blank", "  ")]);
        let outcome = p.handle(0, "https://x.test/blank").await;
        assert!(matches!(outcome.body, Err(DocsClonerError::Parse { .. })));
    }
}
