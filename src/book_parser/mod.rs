//! Parsing and packaging: body normalization, readability extraction, EPUB.

pub mod epub_generator;
pub mod html_utils;
pub mod readability;
