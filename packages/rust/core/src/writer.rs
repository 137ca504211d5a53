//! Output writer: per-page Markdown files and the optional `all-pages.md`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, instrument};

use docscloner_shared::{DocsClonerError, Result};

use crate::paths::map_to_path;

/// File name of the aggregate document, written at the output root.
pub const AGGREGATE_FILE: &str = "all-pages.md";

/// Characters that force a YAML scalar to be double-quoted.
const YAML_SPECIAL: &[char] = &[
    ':', '#', '"', '\'', '{', '}', '[', ']', '|', '>', '&', '*', '!', '%', '@', '`', ',', '?',
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A successfully written page, kept for the aggregate document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Position in the resolved sitemap order.
    pub index: usize,
    pub source_url: String,
    pub title: String,
    /// Normalized Markdown body, without frontmatter.
    pub markdown: String,
}

/// Writes pages under a fixed output root.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one page with its frontmatter to the mapped path, creating
    /// parent directories. Returns the path written.
    pub fn write_page(
        &self,
        source_url: &str,
        title: &str,
        crawled_at: DateTime<Utc>,
        markdown: &str,
    ) -> Result<PathBuf> {
        let path = map_to_path(&self.root, source_url);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocsClonerError::io(parent, e))?;
        }

        let content = format!("{}{markdown}\n", frontmatter(title, source_url, crawled_at));
        std::fs::write(&path, content).map_err(|e| DocsClonerError::io(&path, e))?;

        debug!(path = %path.display(), %title, "wrote page");
        Ok(path)
    }

    /// Write `all-pages.md`, pages ordered by their sitemap position.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn write_aggregate(&self, mut pages: Vec<PageRecord>) -> Result<PathBuf> {
        pages.sort_by_key(|p| p.index);

        std::fs::create_dir_all(&self.root).map_err(|e| DocsClonerError::io(&self.root, e))?;
        let path = self.root.join(AGGREGATE_FILE);
        std::fs::write(&path, render_aggregate(&pages)).map_err(|e| DocsClonerError::io(&path, e))?;

        info!(path = %path.display(), "wrote aggregate file");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Metadata header: `title`, `source_url`, `crawl_date`, framed by `---`
/// and followed by a blank line.
pub fn frontmatter(title: &str, source_url: &str, crawled_at: DateTime<Utc>) -> String {
    format!(
        "---\ntitle: {}\nsource_url: {}\ncrawl_date: {}\n---\n\n",
        yaml_scalar(title),
        yaml_scalar(source_url),
        crawled_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Render a string as a YAML scalar, double-quoting it when it is empty or
/// could otherwise be misread.
pub fn yaml_scalar(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s.contains(YAML_SPECIAL)
        || s.contains(['\n', '\r', '\t'])
        || s.starts_with([' ', '-'])
        || s.ends_with(' ');

    if !needs_quoting {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// ---------------------------------------------------------------------------
// Aggregate document
// ---------------------------------------------------------------------------

/// Build the aggregate document: an index of links, then every page under
/// its own heading with a source citation, separated by rules.
pub fn render_aggregate(pages: &[PageRecord]) -> String {
    let anchors = assign_anchors(pages);

    let mut out = String::from("# Documentation Index\n\n");
    for (page, anchor) in pages.iter().zip(&anchors) {
        out.push_str(&format!("- [{}](#{})\n", link_text(&display_title(page)), anchor.id));
    }
    out.push_str("\n---\n\n");

    for (page, anchor) in pages.iter().zip(&anchors) {
        if anchor.explicit {
            out.push_str(&format!("<a id=\"{}\"></a>\n\n", anchor.id));
        }
        out.push_str(&format!("## {}\n\n", display_title(page)));
        out.push_str(&format!("*Source: {}*\n\n", page.source_url));
        out.push_str(&page.markdown);
        out.push_str("\n\n---\n\n");
    }

    out
}

/// Heading text for a page, on a single line.
fn display_title(page: &PageRecord) -> String {
    let title = if page.title.trim().is_empty() {
        &page.source_url
    } else {
        &page.title
    };
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape characters that would end the `[text]` part of an index link.
fn link_text(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

struct Anchor {
    id: String,
    /// Not derivable from the heading text; needs an explicit `<a id>`.
    explicit: bool,
}

/// Anchor ids are unique across the document. A repeated slug takes the
/// next free `-N` suffix; any id that differs from the heading's own slug is
/// emitted as an explicit `<a id>`.
fn assign_anchors(pages: &[PageRecord]) -> Vec<Anchor> {
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut issued: HashSet<String> = HashSet::new();

    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let slug = slugify(&page.title);
            let base = if slug.is_empty() {
                format!("page-{}", i + 1)
            } else {
                slug.clone()
            };

            let mut id = base.clone();
            if issued.contains(&id) {
                let n = next_suffix.entry(base.clone()).or_insert(1);
                loop {
                    id = format!("{base}-{n}");
                    *n += 1;
                    if !issued.contains(&id) {
                        break;
                    }
                }
            }
            issued.insert(id.clone());

            let explicit = id != slug;
            Anchor { id, explicit }
        })
        .collect()
}

/// Heading anchor: lower-cased, only letters, digits, spaces and hyphens
/// kept, whitespace turned into hyphens, repeated hyphens collapsed, and
/// leading/trailing hyphens trimmed.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();

    let mut slug = String::with_capacity(kept.len());
    for c in kept.chars() {
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docscloner-writer-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(index: usize, url: &str, title: &str, md: &str) -> PageRecord {
        PageRecord {
            index,
            source_url: url.into(),
            title: title.into(),
            markdown: md.into(),
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    // -----------------------------------------------------------------------
    // Frontmatter
    // -----------------------------------------------------------------------

    #[test]
    fn frontmatter_layout() {
        let fm = frontmatter("Installation", "https://x.test/install", ts());
        assert_eq!(
            fm,
            "---\ntitle: Installation\nsource_url: \"https://x.test/install\"\ncrawl_date: 2024-01-15T10:30:00Z\n---\n\n"
        );
    }

    #[test]
    fn empty_title_is_explicit_empty_string() {
        let fm = frontmatter("", "https://x.test/", ts());
        assert!(fm.contains("title: \"\"\n"));
    }

    #[test]
    fn yaml_quoting_rules() {
        assert_eq!(yaml_scalar("Plain Title"), "Plain Title");
        assert_eq!(yaml_scalar("API: Reference"), "\"API: Reference\"");
        assert_eq!(yaml_scalar("- list-like"), "\"- list-like\"");
        assert_eq!(yaml_scalar(" leading"), "\" leading\"");
        assert_eq!(yaml_scalar(r#"Say "hi" \o/"#), r#""Say \"hi\" \\o/""#);
        assert_eq!(yaml_scalar("two\nlines"), "\"two\\nlines\"");
        assert_eq!(yaml_scalar("C# & F#"), "\"C# & F#\"");
    }

    // -----------------------------------------------------------------------
    // Page writes
    // -----------------------------------------------------------------------

    #[test]
    fn write_page_creates_dirs_and_frontmatter() {
        let dir = temp_dir();
        let writer = OutputWriter::new(&dir);

        let path = writer
            .write_page("https://x.test/guide/setup.html", "Setup", ts(), "# Setup\n\nBody.")
            .unwrap();

        assert_eq!(path, dir.join("guide").join("setup.md"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("---\ntitle: Setup\n"));
        assert!(content.ends_with("---\n\n# Setup\n\nBody.\n"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn colliding_urls_last_write_wins() {
        let dir = temp_dir();
        let writer = OutputWriter::new(&dir);

        let first = writer.write_page("https://x.test/a", "First", ts(), "one").unwrap();
        let second = writer.write_page("https://x.test/a.html", "Second", ts(), "two").unwrap();

        assert_eq!(first, second);
        let content = std::fs::read_to_string(&second).unwrap();
        assert!(content.contains("Second"));
        assert!(!content.contains("First"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_page_fails_when_root_is_a_file() {
        let dir = temp_dir();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();

        let err = OutputWriter::new(&blocker)
            .write_page("https://x.test/docs/a", "A", ts(), "a")
            .unwrap_err();
        assert!(matches!(err, DocsClonerError::Io { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    // -----------------------------------------------------------------------
    // Aggregate
    // -----------------------------------------------------------------------

    #[test]
    fn slugify_rules() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("API: v2 -- Overview!"), "api-v2-overview");
        assert_eq!(slugify("  Spaces   everywhere  "), "spaces-everywhere");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("Überblick"), "überblick");
    }

    #[test]
    fn aggregate_structure() {
        let out = render_aggregate(&[
            record(0, "https://x.test/intro", "Intro", "Hello."),
            record(1, "https://x.test/misc", "", "Misc body."),
        ]);

        assert_eq!(
            out,
            "# Documentation Index\n\n\
             - [Intro](#intro)\n\
             - [https://x.test/misc](#page-2)\n\
             \n---\n\n\
             ## Intro\n\n*Source: https://x.test/intro*\n\nHello.\n\n---\n\n\
             <a id=\"page-2\"></a>\n\n\
             ## https://x.test/misc\n\n*Source: https://x.test/misc*\n\nMisc body.\n\n---\n\n"
        );
    }

    #[test]
    fn duplicate_titles_get_suffixed_anchors() {
        let out = render_aggregate(&[
            record(0, "https://x.test/a", "Overview", ""),
            record(1, "https://x.test/b", "Overview", ""),
            record(2, "https://x.test/c", "Overview", ""),
        ]);
        assert!(out.contains("(#overview)\n"));
        assert!(out.contains("(#overview-1)\n"));
        assert!(out.contains("(#overview-2)\n"));
    }

    #[test]
    fn suffixed_anchor_never_reuses_an_existing_slug() {
        let pages = [
            record(0, "https://x.test/a", "Overview", ""),
            record(1, "https://x.test/b", "Overview", ""),
            record(2, "https://x.test/c", "Overview 1", ""),
        ];
        let ids: Vec<String> = assign_anchors(&pages).into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["overview", "overview-1", "overview-1-1"]);

        let out = render_aggregate(&pages);
        assert_eq!(out.matches("(#overview-1)").count(), 1);
        assert!(out.contains("<a id=\"overview-1-1\"></a>\n\n## Overview 1\n"));
    }

    #[test]
    fn index_link_text_is_escaped_and_single_line() {
        let out = render_aggregate(&[record(
            0,
            "https://x.test/a",
            "Arrays [deprecated]\nand more",
            "",
        )]);
        assert!(out.contains("- [Arrays \\[deprecated\\] and more](#arrays-deprecated-and-more)\n"));
        assert!(out.contains("## Arrays [deprecated] and more\n"));
    }

    #[test]
    fn aggregate_sorted_by_sitemap_position() {
        let dir = temp_dir();
        let writer = OutputWriter::new(&dir);

        let path = writer
            .write_aggregate(vec![
                record(2, "https://x.test/c", "Third", "c"),
                record(0, "https://x.test/a", "First", "a"),
                record(1, "https://x.test/b", "Second", "b"),
            ])
            .unwrap();

        assert_eq!(path, dir.join(AGGREGATE_FILE));
        let content = std::fs::read_to_string(&path).unwrap();
        let first = content.find("## First").unwrap();
        let second = content.find("## Second").unwrap();
        let third = content.find("## Third").unwrap();
        assert!(first < second && second < third);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
