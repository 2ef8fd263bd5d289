//! HTML/XHTML text helpers: escaping, URL normalization, episode-fragment
//! cleanup, filename slugs.

use regex::Regex;
use std::sync::OnceLock;

use crate::api::WEB_BASE;

fn re_img_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<img\b[^>]*?>").expect("compile img tag regex"))
}

fn re_src_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        // \b alone would also hit the tail of data-src.
        Regex::new(r#"(?is)\ssrc\s*=\s*['"]([^'"]+)['"]"#).expect("compile src regex")
    })
}

fn re_data_src_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)\bdata-src\s*=\s*['"]([^'"]+)['"]"#).expect("compile data-src regex")
    })
}

fn re_alt_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)\balt\s*=\s*['"]([^'"]*)['"]"#).expect("compile alt regex")
    })
}

fn re_all_tags() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<[^>]+>").expect("compile tag regex"))
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Visible text of an HTML fragment.
pub fn strip_tags(html: &str) -> String {
    re_all_tags().replace_all(html, " ").to_string()
}

/// Absolutize protocol-relative and root-relative URLs against the site.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if trimmed.starts_with('/') {
        return format!("{WEB_BASE}{trimmed}");
    }
    trimmed.to_string()
}

/// Normalize an episode body fragment for packaging: lazy-loaded images get
/// their real source promoted, inline styles are dropped, and image URLs
/// are absolutized. Images stay external (no re-hosting).
pub fn normalize_episode_fragment(html: &str) -> String {
    re_img_tag()
        .replace_all(html, |caps: &regex::Captures<'_>| rebuild_img(&caps[0]))
        .into_owned()
}

fn rebuild_img(tag: &str) -> String {
    let src = re_src_attr()
        .captures(tag)
        .or_else(|| re_data_src_attr().captures(tag))
        .map(|c| c[1].to_string());
    let Some(src) = src else {
        return tag.to_string();
    };
    let alt = re_alt_attr()
        .captures(tag)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    format!(
        r#"<img src="{}" alt="{}"/>"#,
        escape_html(&normalize_url(&src)),
        escape_html(&alt)
    )
}

/// Lowercase kebab-case slug for output file names.
pub fn kebab_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for ch in s.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(lower);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "book".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }

    #[test]
    fn normalizes_url_forms() {
        assert_eq!(
            normalize_url("//images.novelpia.com/x.jpg"),
            "https://images.novelpia.com/x.jpg"
        );
        assert_eq!(
            normalize_url("/imagebox/cover/a.jpg"),
            "https://global.novelpia.com/imagebox/cover/a.jpg"
        );
        assert_eq!(normalize_url("https://a/b.png"), "https://a/b.png");
        assert_eq!(normalize_url("  "), "");
    }

    #[test]
    fn promotes_data_src_and_strips_style() {
        let html = r#"<p>x</p><img data-src="//cdn/x.jpg" style="width:10px" alt="pic">"#;
        let out = normalize_episode_fragment(html);
        assert!(out.contains(r#"src="https://cdn/x.jpg""#));
        assert!(out.contains(r#"alt="pic""#));
        assert!(!out.contains("style="));
    }

    #[test]
    fn images_without_any_source_are_left_alone() {
        let html = r#"<img class="placeholder">"#;
        assert_eq!(normalize_episode_fragment(html), html);
    }

    #[test]
    fn kebab_names() {
        assert_eq!(kebab_name("The Great Novel!"), "the-great-novel");
        assert_eq!(kebab_name("  -- "), "book");
        assert_eq!(kebab_name("A_B C"), "a-b-c");
    }
}
