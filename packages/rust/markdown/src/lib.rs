//! Page transformation: HTML fragments and raw Markdown resources to
//! normalized Markdown.
//!
//! Two modes, chosen once per run:
//! - [`convert_html`] turns an extracted content fragment into Markdown using
//!   `htmd`, then runs the cleanup passes (tables, code fences, stray tags,
//!   relative links).
//! - [`fetch_raw`] fetches an already-Markdown resource derived from the page
//!   URL via a `{url}`/`{path}`/`{host}` pattern.
//!
//! Both finish with [`normalize`], which is idempotent.

mod cleanup;

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use docscloner_shared::{DocsClonerError, PageFetcher, Result};

/// Tags htmd drops entirely, content included.
pub const SKIP_TAGS: &[&str] = &[
    "nav", "header", "footer", "script", "style", "noscript", "iframe",
];

// ---------------------------------------------------------------------------
// HTML mode
// ---------------------------------------------------------------------------

/// Convert an extracted HTML fragment to normalized Markdown.
///
/// Relative links and images are resolved against the scheme and host of
/// `source_url`.
#[instrument(skip(fragment), fields(url = %source_url))]
pub fn convert_html(fragment: &str, source_url: &str) -> Result<String> {
    let (html, tables) = extract_tables(fragment);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let mut markdown = converter
        .convert(&html)
        .map_err(|e| DocsClonerError::Conversion(format!("htmd conversion failed: {e}")))?;

    for (i, table) in tables.iter().enumerate() {
        markdown = markdown.replacen(&table_placeholder(i), table, 1);
    }

    debug!(raw_len = markdown.len(), tables = tables.len(), "htmd conversion complete");

    let origin = page_origin(source_url);
    let cleaned = cleanup::run_pipeline(&markdown, origin.as_ref());
    Ok(normalize(&cleaned))
}

/// Scheme + host (+ port) of a page URL, as a root URL.
fn page_origin(source_url: &str) -> Option<Url> {
    Url::parse(source_url).ok()?.join("/").ok()
}

// ---------------------------------------------------------------------------
// Table pre-rendering
// ---------------------------------------------------------------------------

// htmd 0.1 has no table support. Tables are rendered to Markdown up front and
// swapped for a plain-text placeholder that survives conversion untouched.

fn table_placeholder(i: usize) -> String {
    format!("DOCSCLONERTABLE{i}X")
}

/// Replace each outermost `<table>` with a placeholder paragraph. Returns the
/// rewritten HTML and the rendered tables, indexed by placeholder number.
fn extract_tables(fragment: &str) -> (String, Vec<String>) {
    static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").expect("table"));

    let doc = Html::parse_fragment(fragment);
    let outermost: Vec<ElementRef<'_>> = doc
        .select(&TABLE)
        .filter(|t| !t.ancestors().filter_map(ElementRef::wrap).any(|a| a.value().name() == "table"))
        .collect();

    if outermost.is_empty() {
        return (fragment.to_string(), Vec::new());
    }

    // Work on the serializer's output so each table's own serialization is an
    // exact substring of it.
    let mut html = doc.root_element().inner_html();
    let mut tables = Vec::with_capacity(outermost.len());

    for table in outermost {
        let i = tables.len();
        html = html.replacen(&table.html(), &format!("<p>{}</p>", table_placeholder(i)), 1);
        tables.push(render_table(&table));
    }

    (html, tables)
}

/// Render one `<table>` as a pipe table. The first row is the header; a table
/// without `<th>` cells gets its first data row promoted.
fn render_table(table: &ElementRef<'_>) -> String {
    static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("tr"));
    static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").expect("cells"));

    let rows: Vec<Vec<String>> = table
        .select(&ROW)
        .map(|tr| tr.select(&CELL).map(|c| cell_text(&c)).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let line = |cells: &[String]| {
        let padded: Vec<&str> = (0..width)
            .map(|i| cells.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut out = vec![line(&rows[0]), format!("|{}", " --- |".repeat(width))];
    out.extend(rows[1..].iter().map(|r| line(r)));
    out.join("\n")
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

// ---------------------------------------------------------------------------
// Raw-Markdown mode
// ---------------------------------------------------------------------------

/// Fetch the Markdown source for `page_url` via `pattern` and normalize it.
/// The fetched bytes are never HTML-converted.
#[instrument(skip(fetcher), fields(url = %page_url))]
pub async fn fetch_raw(fetcher: &dyn PageFetcher, page_url: &str, pattern: &str) -> Result<String> {
    let md_url = expand_pattern(pattern, page_url)?;
    debug!(%md_url, "fetching raw markdown");

    let body = fetcher.fetch(&md_url).await?;
    Ok(normalize(&String::from_utf8_lossy(&body)))
}

/// Substitute `{url}` (full page URL), `{path}` (its path) and `{host}` (its
/// host, with port if any) into `pattern`. Substituted text is not expanded
/// again.
pub fn expand_pattern(pattern: &str, page_url: &str) -> Result<String> {
    static PLACEHOLDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{(url|path|host)\}").expect("valid regex"));

    let parsed = Url::parse(page_url)
        .map_err(|e| DocsClonerError::validation(format!("invalid page URL '{page_url}': {e}")))?;

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_string(),
        (None, _) => String::new(),
    };

    Ok(PLACEHOLDER_RE
        .replace_all(pattern, |caps: &Captures| match &caps[1] {
            "url" => page_url.to_string(),
            "path" => parsed.path().to_string(),
            _ => host.clone(),
        })
        .into_owned())
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Text of the first `# ` heading line, trimmed.
pub fn title_from_markdown(md: &str) -> Option<String> {
    md.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Normalize Markdown whitespace:
/// - line endings become `\n`
/// - trailing spaces and tabs are stripped from every line
/// - runs of blank lines collapse to a single blank line
/// - leading and trailing blank lines are removed
///
/// `normalize(normalize(x)) == normalize(x)` for any input.
pub fn normalize(md: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let unified = md.replace("\r\n", "\n").replace('\r', "\n");
    let stripped = unified
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUN_RE
        .replace_all(&stripped, "\n\n")
        .trim_matches('\n')
        .to_string()
}
