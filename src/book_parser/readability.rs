//! Readable-body extraction from a rendered chapter page.
//!
//! Viewer pages mix the prose with comment threads, reaction bars and
//! timestamps. Extraction strips the comment machinery, picks the first
//! plausible content container, and falls back to bare paragraphs; a page
//! with nothing readable is treated as gated and the chapter is omitted.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use super::html_utils::{escape_html, strip_tags};

const MIN_CONTAINER_TEXT: usize = 200;
const MIN_PARAGRAPH_TEXT: usize = 10;
const MAX_BLOCK_REMOVALS: usize = 200;

#[derive(Debug, Error)]
pub enum ReadabilityError {
    #[error("no readable content found (page may be gated)")]
    NoReadableContent,
}

/// A normalized chapter body ready for packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadableBody {
    pub title: String,
    pub html: String,
}

fn re_commentish_open() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(
            r#"(?is)<(div|section|ul|ol|aside|article)\b[^>]*\b(?:class|id)\s*=\s*['"][^'"]*(?:comment|reply|cmtbox)[^'"]*['"][^>]*>"#,
        )
        .expect("compile commentish regex")
    })
}

fn re_boilerplate_row() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(
            r"(?is)<(p|li|div)\b[^>]*>\s*(?:there\s+(?:are\s+)?no\s+comments|no\s+comments|HOT|NEWEST|ADD|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+\d{1,2},\s+\d{4}\s+at\s+\d{1,2}:\d{2}\s*(?:am|pm))\s*</\1>",
        )
        .expect("compile boilerplate regex")
    })
}

fn re_paragraph() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("compile paragraph regex"))
}

/// Ordered container candidates; first with enough text wins.
fn container_patterns() -> &'static [Regex] {
    static R: OnceLock<Vec<Regex>> = OnceLock::new();
    R.get_or_init(|| {
        [
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bid\s*=\s*['"][^'"]*viewer[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bviewer\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bview-contents\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bread-contents\b[^'"]*['"][^>]*>"#,
            r#"(?is)<(article)\b[^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\breader\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bchapter\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bprose\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bql-editor\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*['"][^'"]*\bcontent\b[^'"]*['"][^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bdata-reader\b[^>]*>"#,
            r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bdata-contents\b[^>]*>"#,
        ]
        .iter()
        .map(|p| Regex::new(p).expect("compile container regex"))
        .collect()
    })
}

fn title_patterns() -> &'static [Regex] {
    static R: OnceLock<Vec<Regex>> = OnceLock::new();
    R.get_or_init(|| {
        [
            r#"(?is)<[^>]*\bclass\s*=\s*['"][^'"]*\bchapter-title\b[^'"]*['"][^>]*>(.*?)</"#,
            r#"(?is)<[^>]*\bclass\s*=\s*['"][^'"]*\bep-title\b[^'"]*['"][^>]*>(.*?)</"#,
            r#"(?is)<[^>]*\bclass\s*=\s*['"][^'"]*\btitle\b[^'"]*['"][^>]*>(.*?)</"#,
            r#"(?is)<h1\b[^>]*>(.*?)</h1>"#,
            r#"(?is)<h2\b[^>]*>(.*?)</h2>"#,
        ]
        .iter()
        .map(|p| Regex::new(p).expect("compile title regex"))
        .collect()
    })
}

fn re_page_title() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("compile title regex"))
}

/// Extract the readable body and a display title from a chapter page.
///
/// `list_title` is what the listing showed for this chapter and wins over
/// weak in-page titles; `novel_title` is rejected as a chapter title.
pub fn extract_readable(
    html: &str,
    list_title: &str,
    novel_title: Option<&str>,
) -> Result<ReadableBody, ReadabilityError> {
    let cleaned = strip_boilerplate_rows(&strip_comment_blocks(html));

    if let Some(container) = find_container(&cleaned) {
        let header_title = title_patterns()
            .iter()
            .find_map(|re| re.captures(&container))
            .map(|c| strip_tags(&c[1]).trim().to_string())
            .filter(|t| !t.is_empty());

        let title = match header_title {
            Some(t) if is_good_title(&t, novel_title) => t,
            _ if !list_title.trim().is_empty() => list_title.trim().to_string(),
            Some(t) => t,
            None => "Chapter".to_string(),
        };
        return Ok(ReadableBody {
            title,
            html: container,
        });
    }

    // No recognizable container: fall back to bare paragraph text.
    let paragraphs: Vec<String> = re_paragraph()
        .captures_iter(&cleaned)
        .map(|c| strip_tags(&c[1]).trim().to_string())
        .filter(|t| t.chars().count() > MIN_PARAGRAPH_TEXT)
        .collect();
    if paragraphs.is_empty() {
        return Err(ReadabilityError::NoReadableContent);
    }

    let body: String = paragraphs
        .iter()
        .map(|t| format!("<p>{}</p>", escape_html(t)))
        .collect();
    let page_title = re_page_title()
        .captures(html)
        .map(|c| strip_tags(&c[1]).trim().to_string())
        .unwrap_or_default();
    let title = if !list_title.trim().is_empty() {
        list_title.trim().to_string()
    } else if is_good_title(&page_title, novel_title) {
        page_title
    } else {
        "Chapter".to_string()
    };

    Ok(ReadableBody { title, html: body })
}

fn is_good_title(t: &str, novel_title: Option<&str>) -> bool {
    let s = t.trim();
    if s.chars().count() < 4 {
        return false;
    }
    if s.to_ascii_lowercase().starts_with("novelpia -") {
        return false;
    }
    if novel_title.is_some_and(|n| n.trim() == s) {
        return false;
    }
    true
}

/// Remove comment-section blocks wholesale, matching opening tags whose
/// class/id smells like comment machinery and splicing out the balanced
/// block. Bounded; a page that defeats the scanner keeps its markup (the
/// boilerplate row pass still applies).
fn strip_comment_blocks(html: &str) -> String {
    let mut out = html.to_string();
    for _ in 0..MAX_BLOCK_REMOVALS {
        let Some(caps) = re_commentish_open().captures(&out) else {
            break;
        };
        let open = caps.get(0).expect("whole match");
        let tag = caps[1].to_ascii_lowercase();
        match scan_block_end(&out, open.end(), &tag) {
            Some((_, block_end)) => {
                out.replace_range(open.start()..block_end, "");
            }
            None => {
                // Unbalanced markup: drop from the opening tag onward.
                out.truncate(open.start());
                break;
            }
        }
    }
    out
}

fn strip_boilerplate_rows(html: &str) -> String {
    re_boilerplate_row().replace_all(html, "").into_owned()
}

/// First candidate container with enough visible text; returns its inner
/// HTML.
fn find_container(html: &str) -> Option<String> {
    for re in container_patterns() {
        let Some(caps) = re.captures(html) else {
            continue;
        };
        let open = caps.get(0).expect("whole match");
        let tag = caps[1].to_ascii_lowercase();
        let Some((inner_end, _)) = scan_block_end(html, open.end(), &tag) else {
            continue;
        };
        let inner = &html[open.end()..inner_end];
        if strip_tags(inner)
            .split_whitespace()
            .collect::<String>()
            .chars()
            .count()
            > MIN_CONTAINER_TEXT
        {
            return Some(inner.to_string());
        }
    }
    None
}

/// Scan from just past an opening tag to its balanced close. Returns
/// (start of the closing tag, end of the closing tag).
fn scan_block_end(html: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let lower = html.to_ascii_lowercase();
    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = from;

    while depth > 0 {
        let next_close = lower[pos..].find(&close_pat).map(|i| pos + i)?;
        let next_open = lower[pos..].find(&open_pat).map(|i| pos + i);
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + open_pat.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    let close_end = lower[next_close..].find('>').map(|i| next_close + i + 1)?;
                    return Some((next_close, close_end));
                }
                pos = next_close + close_pat.len();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(words: usize) -> String {
        std::iter::repeat("lorem".to_string())
            .take(words)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn picks_viewer_container_and_header_title() {
        let body = filler(80);
        let html = format!(
            "<html><body><div id=\"viewer-box\"><h1>Ep. 12 — The Gate</h1><p>{body}</p></div>\
             <div class=\"comment-list-wrapper\"><p>nice chapter!</p></div></body></html>"
        );
        let out = extract_readable(&html, "", None).unwrap();
        assert_eq!(out.title, "Ep. 12 — The Gate");
        assert!(out.html.contains(&body));
        assert!(!out.html.contains("nice chapter"));
    }

    #[test]
    fn comment_blocks_are_removed_before_selection() {
        let body = filler(80);
        let html = format!(
            "<div class=\"comments\"><div class=\"viewer\"><p>{}</p></div></div>\
             <div class=\"viewer\"><p>{body}</p></div>",
            filler(80)
        );
        let out = extract_readable(&html, "Ch 1 title", None).unwrap();
        assert!(out.html.contains(&body));
    }

    #[test]
    fn paragraph_fallback_when_no_container() {
        let html = "<html><body>\
                    <p>This is a long enough paragraph of story text.</p>\
                    <p>tiny</p>\
                    <p>And another long enough paragraph to keep around.</p>\
                    </body></html>";
        let out = extract_readable(html, "12. The Gate", None).unwrap();
        assert_eq!(out.title, "12. The Gate");
        assert_eq!(out.html.matches("<p>").count(), 2);
    }

    #[test]
    fn gated_page_is_an_error() {
        let html = "<html><body><div class='paywall'>Subscribe!</div></body></html>";
        assert!(matches!(
            extract_readable(html, "t", None),
            Err(ReadabilityError::NoReadableContent)
        ));
    }

    #[test]
    fn novel_title_is_rejected_as_chapter_title() {
        let body = filler(80);
        let html =
            format!("<div class=\"viewer\"><h1>My Novel</h1><p>{body}</p></div>");
        let out = extract_readable(&html, "3. Chapter Three", Some("My Novel")).unwrap();
        assert_eq!(out.title, "3. Chapter Three");
    }

    #[test]
    fn boilerplate_rows_are_dropped() {
        let body = filler(80);
        let html = format!(
            "<div class=\"viewer\"><p>{body}</p><p>No comments</p><div>HOT</div></div>"
        );
        let out = extract_readable(&html, "t-title", None).unwrap();
        assert!(!out.html.contains("No comments"));
        assert!(!out.html.contains("HOT"));
    }

    #[test]
    fn balanced_scan_handles_nested_same_tags() {
        let inner = filler(80);
        let html = format!(
            "<div class=\"viewer\"><div class=\"inner\"><p>{inner}</p></div></div><div>after</div>"
        );
        let out = extract_readable(&html, "tt-title", None).unwrap();
        assert!(out.html.contains(&inner));
        assert!(!out.html.contains("after"));
    }
}
