//! Runtime configuration (`Config`) and defaults.
//!
//! Also provides the field metadata used to generate `config.yml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Network
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
    #[serde(default = "default_throttle_seconds")]
    pub throttle_seconds: f64,
    #[serde(default)]
    pub proxy: String,

    // Listing traversal
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    #[serde(default = "default_max_group_advances")]
    pub max_group_advances: u32,
    #[serde(default = "default_max_pages_bound")]
    pub max_pages_bound: u32,
    #[serde(default = "default_walker_max_steps")]
    pub walker_max_steps: usize,

    // Output
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            throttle_seconds: default_throttle_seconds(),
            proxy: String::new(),
            items_per_page: default_items_per_page(),
            max_group_advances: default_max_group_advances(),
            max_pages_bound: default_max_pages_bound(),
            walker_max_steps: default_walker_max_steps(),
            save_path: String::new(),
            language: default_language(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 11] = [
            FieldMeta {
                name: "request_timeout",
                description: "Request timeout in seconds",
            },
            FieldMeta {
                name: "max_retries",
                description: "Default request attempts before giving up",
            },
            FieldMeta {
                name: "backoff_base",
                description: "Retry backoff base; attempt n sleeps base^n seconds",
            },
            FieldMeta {
                name: "throttle_seconds",
                description: "Delay before each episode ticket/content request",
            },
            FieldMeta {
                name: "proxy",
                description: "Optional HTTP/HTTPS proxy, e.g. http://host:port",
            },
            FieldMeta {
                name: "items_per_page",
                description: "Rows per page on the chapter listing.\nObserved site behavior; only used to estimate the page count",
            },
            FieldMeta {
                name: "max_group_advances",
                description: "Bound on pagination-window advances while seeking a page number",
            },
            FieldMeta {
                name: "max_pages_bound",
                description: "Safety page bound when the listing's total is unknown",
            },
            FieldMeta {
                name: "walker_max_steps",
                description: "Step bound for the next-link fallback walker",
            },
            FieldMeta {
                name: "save_path",
                description: "Output directory; empty means ./output",
            },
            FieldMeta {
                name: "language",
                description: "EPUB language code",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs_f64(self.throttle_seconds.max(0.0))
    }

    pub fn output_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            PathBuf::from("output")
        } else {
            PathBuf::from(self.save_path.trim())
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    1.25
}

fn default_throttle_seconds() -> f64 {
    2.0
}

fn default_items_per_page() -> u32 {
    20
}

fn default_max_group_advances() -> u32 {
    40
}

fn default_max_pages_bound() -> u32 {
    200
}

fn default_walker_max_steps() -> usize {
    300
}

fn default_language() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_defaults_to_output() {
        let cfg = Config::default();
        assert_eq!(cfg.output_dir(), PathBuf::from("output"));
    }
}
