//! EPUB packaging.
//!
//! Accepts finalized chapters with normalized bodies plus the work's
//! metadata (and optional cover bytes) and writes one `.epub` named from a
//! kebab-case form of the title.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};

use super::html_utils::{escape_html, kebab_name};
use crate::crawl::models::{ChapterBody, NovelMeta};

const STYLESHEET: &str = "body { font-family: serif; line-height: 1.5; }
h1, h2, h3 { font-family: sans-serif; page-break-after: avoid; }
img { max-width: 100%; height: auto; }
.epi-title { font-size: 1.3em; font-weight: 600; margin: 0 0 .6em 0; }
.about img { max-width: 60%; height: auto; border-radius: 12px; }
";

pub struct EpubGenerator {
    book: EpubBuilder<ZipLibrary>,
    language: String,
    title: String,
    has_cover: bool,
}

impl EpubGenerator {
    pub fn new(meta: &NovelMeta, language: &str) -> Result<Self> {
        let zip = ZipLibrary::new().map_err(|e| anyhow::anyhow!(e.to_string()))?;
        let mut book = EpubBuilder::new(zip).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        book.epub_version(EpubVersion::V30);

        let title = if meta.title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            meta.title.trim().to_string()
        };
        book.metadata("title", &title).ok();
        book.metadata("lang", language).ok();
        // toc.ncx docTitle / nav title should show the work, not
        // "Table Of Contents".
        book.metadata("toc_name", &title).ok();
        book.metadata("generator", "novelpia-downloader").ok();

        if let Some(author) = meta.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            book.metadata("author", author).ok();
        }
        if !meta.tags.is_empty() {
            book.metadata("subject", meta.tags.join(", ")).ok();
        }
        if let Some(desc) = meta
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            book.metadata("description", desc).ok();
        }

        book.stylesheet(Cursor::new(STYLESHEET))
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        Ok(Self {
            book,
            language: language.to_string(),
            title,
            has_cover: false,
        })
    }

    pub fn set_cover(&mut self, bytes: Vec<u8>) -> Result<()> {
        let mime = cover_mime(&bytes);
        self.book
            .add_cover_image("images/cover.jpg", Cursor::new(bytes), mime)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        self.has_cover = true;
        Ok(())
    }

    /// The About page: title, cover, author, chapter count, status, source
    /// link, description.
    pub fn add_about_page(&mut self, meta: &NovelMeta, chapter_count: usize) -> Result<()> {
        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("<h1>{}</h1>", escape_html(&self.title)));
        if self.has_cover {
            parts.push("<p><img src=\"images/cover.jpg\" alt=\"Cover\"/></p>".to_string());
        }
        parts.push(format!(
            "<p><strong>Author:</strong> {}</p>",
            escape_html(meta.author.as_deref().unwrap_or("Unknown"))
        ));
        parts.push(format!("<p><strong>Chapters:</strong> {chapter_count}</p>"));
        parts.push(format!(
            "<p><strong>Status:</strong> {}</p>",
            escape_html(meta.status.as_deref().unwrap_or("Unknown"))
        ));
        if !meta.source_reference.trim().is_empty() {
            let src = escape_html(meta.source_reference.trim());
            parts.push(format!(
                "<p><strong>Source:</strong> <a href=\"{src}\">{src}</a></p>"
            ));
        }
        if let Some(desc) = meta.description.as_deref().filter(|d| !d.trim().is_empty()) {
            let clipped: String = desc.trim().chars().take(2000).collect();
            parts.push(format!("<p>{}</p>", escape_html(&clipped)));
        }

        let html = wrap_page_html("About", &format!("<div class=\"about\">{}</div>", parts.join("\n")), &self.language);
        self.book
            .add_content(
                EpubContent::new("about.xhtml", Cursor::new(html))
                    .title("About")
                    .reftype(ReferenceType::Text),
            )
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(())
    }

    pub fn add_chapter(&mut self, chapter: &ChapterBody) -> Result<()> {
        let file_name = format!("chap_{:04}.xhtml", chapter.index);
        let body = format!(
            "<h2 class=\"epi-title\">{}</h2>\n{}",
            escape_html(&chapter.title),
            chapter.html
        );
        let html = wrap_page_html(&chapter.title, &body, &self.language);
        self.book
            .add_content(
                EpubContent::new(file_name, Cursor::new(html))
                    .title(chapter.title.clone())
                    .reftype(ReferenceType::Text),
            )
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(())
    }

    /// Write the book under `out_dir`; returns the output path.
    pub fn generate(&mut self, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir {}", out_dir.display()))?;
        let out_path = out_dir.join(format!("{}.epub", kebab_name(&self.title)));

        let mut buffer = Vec::new();
        self.book
            .generate(&mut buffer)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        fs::write(&out_path, buffer)
            .with_context(|| format!("write {}", out_path.display()))?;
        Ok(out_path)
    }
}

fn cover_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Gif) => "image/gif",
        _ => "image/jpeg",
    }
}

fn wrap_page_html(title: &str, body: &str, language: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{lang}\" xml:lang=\"{lang}\">\n  <head>\n    <title>{title}</title>\n    <link href=\"stylesheet.css\" rel=\"stylesheet\" type=\"text/css\"/>\n  </head>\n  <body>\n{body}\n  </body>\n</html>",
        lang = language,
        title = escape_html(title),
        body = body
    )
}
