//! Sitemap XML parser.
//!
//! Parses the two document shapes defined by <https://www.sitemaps.org/protocol.html>:
//! - `<sitemapindex>` whose `<sitemap><loc>` entries point at other sitemaps
//! - `<urlset>` whose `<url><loc>` entries point at pages
//!
//! The root element decides the variant. Index is checked first.

use docscloner_shared::{DocsClonerError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A parsed sitemap document. Exactly one variant per document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page URLs in document order.
    PageList { urls: Vec<String> },
    /// `<sitemapindex>`: sub-sitemap URLs in document order.
    SitemapIndex { sub_sitemaps: Vec<String> },
}

impl SitemapDocument {
    /// Number of `<loc>` entries in the document.
    pub fn len(&self) -> usize {
        match self {
            Self::PageList { urls } => urls.len(),
            Self::SitemapIndex { sub_sitemaps } => sub_sitemaps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Index,
    UrlSet,
}

impl Root {
    /// Element wrapping each `<loc>` for this root.
    fn entry_tag(self) -> &'static [u8] {
        match self {
            Self::Index => b"sitemap",
            Self::UrlSet => b"url",
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse raw sitemap XML into a [`SitemapDocument`].
///
/// Blank `<loc>` values are skipped. An unrecognized root element, or XML
/// that is not well-formed, is a parse error.
pub fn parse_sitemap(xml: &[u8]) -> Result<SitemapDocument> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut root: Option<Root> = None;
    let mut in_entry = false;
    let mut in_loc = false;
    let mut current = String::new();
    let mut locs: Vec<String> = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            DocsClonerError::parse(format!(
                "malformed XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                match root {
                    None => root = Some(classify_root(name.as_ref())?),
                    Some(r) if name.as_ref() == r.entry_tag() => in_entry = true,
                    Some(_) if in_entry && name.as_ref() == b"loc" => {
                        in_loc = true;
                        current.clear();
                    }
                    Some(_) => {}
                }
            }
            // Self-closing root: `<urlset/>` is a valid, empty page list.
            Event::Empty(e) if root.is_none() => {
                let kind = classify_root(e.local_name().as_ref())?;
                return Ok(build(kind, Vec::new()));
            }
            Event::Text(t) if in_loc => {
                let text = t
                    .unescape()
                    .map_err(|e| DocsClonerError::parse(format!("bad entity in <loc>: {e}")))?;
                current.push_str(&text);
            }
            Event::CData(c) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(e) => {
                let name = e.local_name();
                if in_loc && name.as_ref() == b"loc" {
                    in_loc = false;
                    let loc = current.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                } else if root.is_some_and(|r| name.as_ref() == r.entry_tag()) {
                    in_entry = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match root {
        Some(kind) => Ok(build(kind, locs)),
        None => Err(DocsClonerError::parse("document has no root element")),
    }
}

fn classify_root(name: &[u8]) -> Result<Root> {
    match name {
        b"sitemapindex" => Ok(Root::Index),
        b"urlset" => Ok(Root::UrlSet),
        other => Err(DocsClonerError::parse(format!(
            "unrecognized sitemap root element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn build(root: Root, locs: Vec<String>) -> SitemapDocument {
    match root {
        Root::Index => SitemapDocument::SitemapIndex { sub_sitemaps: locs },
        Root::UrlSet => SitemapDocument::PageList { urls: locs },
    }
}
