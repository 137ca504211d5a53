//! Main-content extraction.
//!
//! Isolates the "main content" region of a documentation page, either through
//! an explicit CSS selector or an ordered cascade of heuristic selectors, then
//! strips navigation and other chrome from inside that region.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use docscloner_shared::{DocsClonerError, Result};

/// Minimum trimmed text length (in characters) a heuristic candidate must
/// exceed to be chosen as the content region.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Heuristic content-region candidates, tried in order.
pub const HEURISTIC_SELECTORS: &[&str] = &[
    "main",
    "article",
    r#"[role="main"]"#,
    ".content",
    ".main-content",
    "#content",
    ".markdown-body",
    ".documentation-content",
    ".docs-content",
    ".page-content",
];

/// Chrome removed from inside the chosen region.
pub const NOISE_SELECTORS: &[&str] = &[
    "nav",
    ".nav",
    ".sidebar",
    ".toc",
    ".table-of-contents",
    ".breadcrumb",
    ".breadcrumbs",
    ".pagination",
    ".edit-page",
    ".feedback",
    ".header",
    ".footer",
    "header",
    "footer",
    "script",
    "style",
    "noscript",
    "iframe",
    ".ads",
    ".cookie-banner",
];

static HEURISTICS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    HEURISTIC_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("heuristic selector"))
        .collect()
});

static NOISE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(&NOISE_SELECTORS.join(", ")).expect("noise selector"));

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("title"));
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("h1"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("body"));

// ---------------------------------------------------------------------------
// ExtractionResult
// ---------------------------------------------------------------------------

/// The cleaned content region of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Inner HTML of the content region, noise removed.
    pub content_html: String,
    /// `<title>`, else first `<h1>`, else empty.
    pub title: String,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the main content of `raw_html`.
///
/// With `selector`, the region is the first element matching it (no length
/// check, no fallback); a selector matching nothing yields empty content.
/// Without one, the heuristic cascade picks the first candidate whose text
/// is longer than [`MIN_CONTENT_CHARS`], falling back to `<body>`.
#[instrument(skip_all, fields(selector = selector.unwrap_or("auto")))]
pub fn extract(raw_html: &str, selector: Option<&str>) -> Result<ExtractionResult> {
    if raw_html.trim().is_empty() {
        return Err(DocsClonerError::parse("empty HTML document"));
    }

    let mut doc = Html::parse_document(raw_html);
    let title = extract_title(&doc);

    let region = match selector {
        Some(s) => {
            let sel = Selector::parse(s)
                .map_err(|e| DocsClonerError::parse(format!("invalid selector '{s}': {e}")))?;
            doc.select(&sel).next()
        }
        None => find_main_content(&doc),
    };

    let Some(region) = region else {
        debug!("no content region matched");
        return Ok(ExtractionResult {
            content_html: String::new(),
            title,
        });
    };

    let region_id = region.id();
    let noise: Vec<_> = region
        .select(&NOISE)
        .map(|el| el.id())
        .filter(|id| *id != region_id)
        .collect();

    debug!(region = region.value().name(), removed = noise.len(), "content region selected");

    for id in noise {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    let content_html = doc
        .tree
        .get(region_id)
        .and_then(ElementRef::wrap)
        .map(|el| el.inner_html())
        .unwrap_or_default();

    Ok(ExtractionResult {
        content_html,
        title,
    })
}

/// Walk the heuristic cascade; fall back to `<body>`.
fn find_main_content(doc: &Html) -> Option<ElementRef<'_>> {
    for (sel, name) in HEURISTICS.iter().zip(HEURISTIC_SELECTORS) {
        if let Some(el) = doc.select(sel).next() {
            let len = text_len(&el);
            if len > MIN_CONTENT_CHARS {
                debug!(selector = name, chars = len, "heuristic matched");
                return Some(el);
            }
        }
    }
    doc.select(&BODY).next()
}

fn extract_title(doc: &Html) -> String {
    [&*TITLE, &*H1]
        .into_iter()
        .filter_map(|sel| doc.select(sel).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

fn text_len(el: &ElementRef<'_>) -> usize {
    el.text().collect::<String>().trim().chars().count()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
