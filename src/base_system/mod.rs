//! Shared infrastructure: configuration, logging, id parsing, cookie files.

pub mod config;
pub mod context;
pub mod cookies;
pub mod logging;
pub mod novel_id;
