//! Netscape cookies.txt parsing.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::cookie::Jar;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub name: String,
    pub value: String,
}

/// Parse a Netscape-format cookies.txt. Lines are tab-separated with seven
/// fields; some exporters use runs of spaces instead, so fall back to a
/// whitespace split. Malformed lines are skipped.
pub fn parse_cookies_txt(raw: &str) -> Vec<CookieRecord> {
    let mut cookies = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 7 {
            parts = line.split_whitespace().collect();
        }
        if parts.len() < 7 {
            continue;
        }
        cookies.push(CookieRecord {
            domain: parts[0].to_string(),
            path: if parts[2].is_empty() { "/" } else { parts[2] }.to_string(),
            secure: parts[3].eq_ignore_ascii_case("TRUE"),
            name: parts[5].to_string(),
            value: parts[6].to_string(),
        });
    }
    cookies
}

/// Load a cookies.txt file into a reqwest cookie jar.
pub fn load_into_jar(path: &Path, jar: &Arc<Jar>) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read cookies file {}", path.display()))?;
    let records = parse_cookies_txt(&raw);
    let count = records.len();
    for rec in records {
        let host = rec.domain.trim_start_matches('.');
        let scheme = if rec.secure { "https" } else { "http" };
        let Ok(url) = Url::parse(&format!("{scheme}://{host}/")) else {
            continue;
        };
        let header = format!(
            "{}={}; Domain={}; Path={}",
            rec.name, rec.value, rec.domain, rec.path
        );
        jar.add_cookie_str(&header, &url);
    }
    debug!(target: "auth", "loaded {} cookies from {}", count, path.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_separated_lines() {
        let raw = "# Netscape HTTP Cookie File\n\
                   .novelpia.com\tTRUE\t/\tTRUE\t1893456000\tUSERKEY\tabc123\n";
        let cookies = parse_cookies_txt(raw);
        assert_eq!(
            cookies,
            vec![CookieRecord {
                domain: ".novelpia.com".to_string(),
                path: "/".to_string(),
                secure: true,
                name: "USERKEY".to_string(),
                value: "abc123".to_string(),
            }]
        );
    }

    #[test]
    fn falls_back_to_whitespace_split() {
        let raw = ".novelpia.com  TRUE  /  FALSE  0  SID  xyz\n";
        let cookies = parse_cookies_txt(raw);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "SID");
        assert!(!cookies[0].secure);
    }

    #[test]
    fn skips_comments_and_short_lines() {
        let raw = "# comment\nbroken line\n";
        assert!(parse_cookies_txt(raw).is_empty());
    }
}
