//! Crawl data models.

use std::path::PathBuf;

use serde::Serialize;

/// Work-level metadata, produced once per run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NovelMeta {
    pub source_reference: String,
    pub title: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub cover_url: Option<String>,
    pub episode_count: Option<u32>,
}

/// One chapter's normalized body, ready for packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBody {
    pub index: u32,
    pub title: String,
    pub html: String,
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    pub title: String,
    pub discovered: usize,
    pub packaged: usize,
    pub skipped: usize,
    pub output: Option<PathBuf>,
}
