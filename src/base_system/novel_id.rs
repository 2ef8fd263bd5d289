//! Work identifier/URL parsing and normalization.

use regex::Regex;
use std::sync::OnceLock;

static RE_URL: OnceLock<Regex> = OnceLock::new();
static RE_NOVEL_PATH: OnceLock<Regex> = OnceLock::new();
static RE_QS: OnceLock<Regex> = OnceLock::new();

fn re_url() -> &'static Regex {
    RE_URL.get_or_init(|| Regex::new(r"https?://\S+").expect("compile RE_URL"))
}

fn re_novel_path() -> &'static Regex {
    RE_NOVEL_PATH.get_or_init(|| Regex::new(r"/novel/(\d+)").expect("compile RE_NOVEL_PATH"))
}

fn re_qs() -> &'static Regex {
    RE_QS.get_or_init(|| Regex::new(r"(?i)novel_no=(\d+)").expect("compile RE_QS"))
}

/// Accepts a bare numeric id, a novel page URL, or text containing either.
pub fn parse_novel_id(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    // If the user pasted extra text around the URL, extract the URL first.
    let target = re_url()
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    if let Some(caps) = re_novel_path().captures(target) {
        return caps.get(1)?.as_str().parse().ok();
    }

    if let Some(caps) = re_qs().captures(target) {
        return caps.get(1)?.as_str().parse().ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_id() {
        assert_eq!(parse_novel_id("1072"), Some(1072));
        assert_eq!(parse_novel_id("  1072  "), Some(1072));
    }

    #[test]
    fn parses_novel_url() {
        assert_eq!(
            parse_novel_id("https://global.novelpia.com/novel/1213"),
            Some(1213)
        );
        assert_eq!(
            parse_novel_id("see https://global.novelpia.com/novel/1213?ref=x here"),
            Some(1213)
        );
    }

    #[test]
    fn parses_query_form() {
        assert_eq!(
            parse_novel_id("https://api-global.novelpia.com/v1/novel?novel_no=77"),
            Some(77)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_novel_id(""), None);
        assert_eq!(parse_novel_id("not a novel"), None);
    }
}
