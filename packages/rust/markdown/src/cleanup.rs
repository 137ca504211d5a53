//! Post-conversion cleanup passes for HTML-mode Markdown.
//!
//! Each pass is a function `&str -> String` applied in sequence. Whitespace
//! normalization is not part of this pipeline; it runs afterwards in both
//! modes via [`crate::normalize`].

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Run every cleanup pass over htmd output.
pub(crate) fn run_pipeline(md: &str, origin: Option<&Url>) -> String {
    let mut result = fix_code_block_languages(md);
    result = strip_leftover_html(&result);
    result = resolve_links(&result, origin);
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Fix code block language hints
// ---------------------------------------------------------------------------

/// Strip class-style prefixes from fence info strings:
/// `language-js`, `lang-python`, `highlight-rust` become `js`, `python`, `rust`.
fn fix_code_block_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*(?:```|~~~))(?:language-|lang-|highlight-)([\w+#.-]+)")
            .expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "$1$2").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 2: Strip leftover layout tags
// ---------------------------------------------------------------------------

/// Remove layout tags htmd passed through, keeping their text. Fenced code
/// is left untouched.
fn strip_leftover_html(md: &str) -> String {
    static LAYOUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|main|figure|figcaption|details|summary)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    let mut in_fence = false;
    md.split('\n')
        .map(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                line.to_string()
            } else {
                LAYOUT_TAG_RE.replace_all(line, "").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

// ---------------------------------------------------------------------------
// Pass 3: Resolve relative links and images
// ---------------------------------------------------------------------------

/// Make relative link and image targets absolute against the page origin
/// (scheme + host). Absolute URLs, fragments, and `mailto:`-style targets
/// are kept as they are.
fn resolve_links(md: &str, origin: Option<&Url>) -> String {
    let Some(origin) = origin else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(!?)\[([^\]]*)\]\(([^)\s]+)((?:\s+"[^"]*")?)\)"#).expect("valid regex")
    });

    LINK_RE
        .replace_all(md, |caps: &Captures| {
            let href = &caps[3];
            match absolutize(origin, href) {
                Some(resolved) => format!("{}[{}]({resolved}{})", &caps[1], &caps[2], &caps[4]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn absolutize(origin: &Url, href: &str) -> Option<String> {
    if href.starts_with('#') || Url::parse(href).is_ok() {
        return None;
    }
    origin.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://docs.example.com/").unwrap()
    }

    #[test]
    fn code_fence_prefixes_are_stripped() {
        assert_eq!(
            fix_code_block_languages("```language-javascript\nconsole.log(1);\n```"),
            "```javascript\nconsole.log(1);\n```"
        );
        assert_eq!(fix_code_block_languages("```lang-python\n```"), "```python\n```");
        assert_eq!(fix_code_block_languages("```highlight-c++\n```"), "```c++\n```");
    }

    #[test]
    fn plain_fence_language_untouched() {
        let input = "```rust\nfn main() {}\n```";
        assert_eq!(fix_code_block_languages(input), input);
    }

    #[test]
    fn layout_tags_removed_text_kept() {
        let input = "<div class=\"note\">Heads up</div> and <span>inline</span>";
        assert_eq!(strip_leftover_html(input), "Heads up and inline");
    }

    #[test]
    fn layout_tags_inside_fence_kept() {
        let input = "```html\n<div class=\"x\">hi</div>\n```\n<div>out</div>";
        assert_eq!(
            strip_leftover_html(input),
            "```html\n<div class=\"x\">hi</div>\n```\nout"
        );
    }

    #[test]
    fn relative_links_resolve_against_origin() {
        let md = "See [config](../guide/configuration) and [api](/api/).";
        assert_eq!(
            resolve_links(md, Some(&origin())),
            "See [config](https://docs.example.com/guide/configuration) and [api](https://docs.example.com/api/)."
        );
    }

    #[test]
    fn relative_images_resolve_too() {
        let md = "![Diagram](/img/diagram.png \"Overview\")";
        assert_eq!(
            resolve_links(md, Some(&origin())),
            "![Diagram](https://docs.example.com/img/diagram.png \"Overview\")"
        );
    }

    #[test]
    fn absolute_anchor_and_mailto_untouched() {
        let md = "[a](https://other.test/x) [b](#section) [c](mailto:me@example.com)";
        assert_eq!(resolve_links(md, Some(&origin())), md);
    }

    #[test]
    fn without_origin_links_untouched() {
        let md = "[a](relative/path)";
        assert_eq!(resolve_links(md, None), md);
    }
}
