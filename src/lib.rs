//! Novelpia chapter harvester.
//!
//! Crawls a work's chapters from the global Novelpia JSON API (or, for
//! embedders that can back the [`discovery::surface::ListingSurface`]
//! trait with a rendered page, from a paginated listing UI) and packages
//! the result as a single EPUB.
//!
//! Code map:
//! - [`base_system`]: config / logging / id parsing / cookie files
//! - [`api`]: session store, resilient executor, token extraction, client
//! - [`discovery`]: pagination + walker strategies and the finalizer
//! - [`crawl`]: orchestration and metadata
//! - [`book_parser`]: readability, HTML utilities, EPUB output

pub mod api;
pub mod base_system;
pub mod book_parser;
pub mod crawl;
pub mod discovery;
