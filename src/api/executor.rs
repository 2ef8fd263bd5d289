//! Resilient request execution: bounded retry, exponential backoff, and a
//! one-shot refresh-and-replay when the remote signals token expiry.
//!
//! The executor is transport-agnostic: it drives an attempt closure that
//! performs one request, which keeps the retry semantics testable against
//! canned response sequences.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::error::{ApiError, TransportError};
use super::mask;

/// Body sentinel that marks an expired auth token.
pub const TOKEN_EXPIRED_SENTINEL: &str = "The token has expired.";

#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub max_retries: u32,
    pub backoff_base: f64,
    pub allow_refresh: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 1.25,
            allow_refresh: false,
        }
    }
}

impl ExecOptions {
    pub fn attempts(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn refreshing(mut self) -> Self {
        self.allow_refresh = true;
        self
    }
}

/// One attempt's outcome: status line plus raw body text.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    fn token_expired(&self) -> bool {
        self.json()
            .and_then(|v| v.get("errmsg").and_then(|e| e.as_str().map(str::to_string)))
            .is_some_and(|msg| msg == TOKEN_EXPIRED_SENTINEL)
    }
}

type SleepFn = Box<dyn Fn(Duration) + Send + Sync>;

pub struct RequestExecutor {
    verbose: bool,
    sleep: SleepFn,
}

impl RequestExecutor {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Test constructor: observe backoff instead of sleeping through it.
    pub fn with_sleeper(verbose: bool, sleep: SleepFn) -> Self {
        Self { verbose, sleep }
    }

    /// Run `attempt` up to `max_retries` times.
    ///
    /// Server errors (>= 500) and transport failures back off
    /// `backoff_base^attempt` seconds between attempts and become
    /// `NetworkExhausted` once attempts run out. When `allow_refresh` is set
    /// and a body carries the expiry sentinel, `refresh` is invoked exactly
    /// once and the request replayed exactly once; the replayed response is
    /// taken as-is. Any other response is returned to the caller unjudged.
    pub fn execute<A, R>(
        &self,
        endpoint: &str,
        opts: ExecOptions,
        mut attempt: A,
        mut refresh: Option<R>,
    ) -> Result<RawResponse, ApiError>
    where
        A: FnMut() -> Result<RawResponse, TransportError>,
        R: FnMut() -> Result<(), ApiError>,
    {
        let max = opts.max_retries.max(1);
        let mut refreshed = false;
        let mut n = 0u32;

        loop {
            n += 1;
            if self.verbose {
                debug!(target: "api", "-> {endpoint} (attempt {n}/{max})");
            }

            match attempt() {
                Ok(mut resp) => {
                    if self.verbose {
                        debug!(
                            target: "api",
                            "<- {} from {endpoint}: {}",
                            resp.status,
                            mask::body_preview(&resp.body)
                        );
                    }

                    if opts.allow_refresh && !refreshed && resp.token_expired() {
                        if let Some(refresh_fn) = refresh.as_mut() {
                            debug!(target: "api", "token expired on {endpoint}; refreshing once");
                            refresh_fn()?;
                            refreshed = true;
                            resp = attempt()?;
                            if self.verbose {
                                debug!(
                                    target: "api",
                                    "<- {} from {endpoint} (replayed): {}",
                                    resp.status,
                                    mask::body_preview(&resp.body)
                                );
                            }
                        }
                    }

                    if resp.status >= 500 {
                        if n < max {
                            self.backoff(endpoint, n, opts.backoff_base);
                            continue;
                        }
                        return Err(ApiError::NetworkExhausted {
                            endpoint: endpoint.to_string(),
                            attempts: n,
                            last: format!("status {}", resp.status),
                        });
                    }

                    return Ok(resp);
                }
                Err(err) => {
                    warn!(target: "api", "{endpoint} attempt {n}/{max} failed: {err}");
                    if n < max {
                        self.backoff(endpoint, n, opts.backoff_base);
                        continue;
                    }
                    return Err(ApiError::NetworkExhausted {
                        endpoint: endpoint.to_string(),
                        attempts: n,
                        last: err.to_string(),
                    });
                }
            }
        }
    }

    fn backoff(&self, endpoint: &str, attempt: u32, base: f64) {
        let secs = base.max(1.0).powi(attempt as i32);
        debug!(target: "api", "backing off {secs:.2}s before retrying {endpoint}");
        (self.sleep)(Duration::from_secs_f64(secs));
    }
}
