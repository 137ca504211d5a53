//! URL → output path mapping.
//!
//! The output tree mirrors the URL path. The mapping is pure and
//! deterministic but not injective: `/a`, `/a.html` and `/a.php` all map to
//! `a.md`, and the last page written wins.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

/// Extensions removed before `.md` is appended. At most one is stripped.
const STRIPPED_EXTENSIONS: &[&str] = &[".html", ".htm", ".php"];

/// Map `source_url` to a file path under `output_root`.
pub fn map_to_path(output_root: &Path, source_url: &str) -> PathBuf {
    output_root.join(relative_path(source_url))
}

/// Map `source_url` to a path relative to the output root.
///
/// - `/` and `/docs/` become `index.md` and `docs/index.md`
/// - `/docs/index.html` becomes `docs/index.md`
/// - `/blog/hello-world` becomes `blog/hello-world.md`
///
/// Query strings and fragments are ignored. The path is percent-decoded and
/// empty, `.` and `..` segments are dropped, so the result always stays
/// inside the output root.
pub fn relative_path(source_url: &str) -> PathBuf {
    let raw_path = match Url::parse(source_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => source_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let decoded = percent_decode_str(&raw_path).decode_utf8_lossy();

    let mut path = decoded.trim_start_matches('/').to_string();
    if path.is_empty() || path.ends_with('/') {
        path.push_str("index");
    }

    if let Some(ext) = STRIPPED_EXTENSIONS.iter().find(|ext| path.ends_with(*ext)) {
        path.truncate(path.len() - ext.len());
    }

    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !matches!(*s, "" | "." | ".."))
        .collect();

    let mut out: PathBuf = if segments.is_empty() {
        PathBuf::from("index")
    } else {
        segments.iter().collect()
    };

    let file_name = out
        .file_name()
        .map(|n| format!("{}.md", n.to_string_lossy()))
        .unwrap_or_else(|| "index.md".to_string());
    out.set_file_name(file_name);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(url: &str) -> PathBuf {
        relative_path(url)
    }

    fn p(s: &str) -> PathBuf {
        s.split('/').collect()
    }

    #[test]
    fn root_maps_to_index() {
        assert_eq!(rel("https://x.test/"), p("index.md"));
        assert_eq!(rel("https://x.test"), p("index.md"));
    }

    #[test]
    fn trailing_slash_and_index_html_agree() {
        assert_eq!(rel("https://x.test/docs/"), p("docs/index.md"));
        assert_eq!(rel("https://x.test/docs/index.html"), p("docs/index.md"));
    }

    #[test]
    fn extensionless_page() {
        assert_eq!(rel("https://x.test/blog/hello-world"), p("blog/hello-world.md"));
    }

    #[test]
    fn known_extensions_stripped_once() {
        assert_eq!(rel("https://x.test/a.htm"), p("a.md"));
        assert_eq!(rel("https://x.test/a.php"), p("a.md"));
        assert_eq!(rel("https://x.test/archive.tar.gz"), p("archive.tar.gz.md"));
        assert_eq!(rel("https://x.test/a.php.html"), p("a.php.md"));
    }

    #[test]
    fn collisions_are_deterministic() {
        assert_eq!(rel("https://x.test/guide"), rel("https://x.test/guide.html"));
        assert_eq!(rel("https://x.test/guide/"), rel("https://x.test/guide/index"));
    }

    #[test]
    fn query_and_fragment_ignored() {
        assert_eq!(rel("https://x.test/search?q=a#top"), p("search.md"));
    }

    #[test]
    fn percent_encoding_decoded() {
        assert_eq!(rel("https://x.test/api/my%20page"), p("api/my page.md"));
    }

    #[test]
    fn traversal_segments_dropped() {
        // Encoded dot segments are already resolved by the URL parser.
        assert_eq!(rel("https://x.test/a/%2e%2e/%2e%2e/etc/passwd"), p("etc/passwd.md"));
        assert_eq!(rel("https://x.test/docs/..%2F..%2Fsecret"), p("docs/secret.md"));
        assert_eq!(rel("https://x.test/%2e%2e/"), p("index.md"));
    }

    #[test]
    fn double_slashes_collapsed() {
        assert_eq!(rel("https://x.test//docs//intro"), p("docs/intro.md"));
    }

    #[test]
    fn joined_under_root() {
        let root = Path::new("out");
        assert_eq!(
            map_to_path(root, "https://x.test/getting-started/installation"),
            root.join("getting-started").join("installation.md")
        );
    }
}
