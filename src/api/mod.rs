//! Novelpia JSON API client.
//!
//! One blocking client per run: browser-like default headers, the USERKEY
//! device cookie, optional proxy, and all endpoint wrappers. Every request
//! goes through the resilient executor; episode ticket/content requests are
//! throttled with a small jitter first.

pub mod error;
pub mod executor;
pub mod mask;
pub mod session;
pub mod token;

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::base_system::context::Config;
use crate::base_system::cookies;
use error::{ApiError, TransportError};
use executor::{ExecOptions, RawResponse, RequestExecutor};
use session::SessionStore;

pub const WEB_BASE: &str = "https://global.novelpia.com";
pub const API_BASE: &str = "https://api-global.novelpia.com";

const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

// Per-endpoint attempt budgets observed to match the remote's moods.
const LOGIN_ATTEMPTS: u32 = 2;
const TICKET_ATTEMPTS: u32 = 4;
const CONTENT_ATTEMPTS: u32 = 3;

pub struct NovelpiaClient {
    http: Client,
    executor: RequestExecutor,
    session: RefCell<SessionStore>,
    email: Option<String>,
    password: Option<String>,
    throttle: Duration,
    base_opts: ExecOptions,
}

impl NovelpiaClient {
    pub fn new(
        config: &Config,
        session: SessionStore,
        credentials: Option<(String, String)>,
        cookies_txt: Option<&Path>,
        verbose: bool,
    ) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let web_url = Url::parse(WEB_BASE).context("parse web base url")?;
        jar.add_cookie_str(
            &format!(
                "USERKEY={}; Domain=.novelpia.com; Path=/",
                session.user_key()
            ),
            &web_url,
        );
        if let Some(path) = cookies_txt {
            cookies::load_into_jar(path, &jar)?;
        }

        let mut builder = Client::builder()
            .default_headers(default_headers())
            .cookie_provider(jar)
            .timeout(config.timeout());
        if !config.proxy.trim().is_empty() {
            let proxy =
                reqwest::Proxy::all(config.proxy.trim()).context("parse proxy address")?;
            builder = builder.proxy(proxy);
        }
        let http = builder.build().context("build http client")?;

        let (email, password) = match credentials {
            Some((e, p)) => (Some(e), Some(p)),
            None => (None, None),
        };

        Ok(Self {
            http,
            executor: RequestExecutor::new(verbose),
            session: RefCell::new(session),
            email,
            password,
            throttle: config.throttle(),
            base_opts: ExecOptions {
                max_retries: config.max_retries.max(1),
                backoff_base: config.backoff_base,
                allow_refresh: false,
            },
        })
    }

    pub fn has_session(&self) -> bool {
        self.session.borrow().has_session()
    }

    /// POST /v1/member/login and store the returned auth token.
    pub fn login(&self) -> Result<(), ApiError> {
        let (Some(email), Some(password)) = (self.email.as_deref(), self.password.as_deref())
        else {
            return Err(ApiError::CredentialsMissing);
        };
        info!(target: "auth", "logging in as {email}");

        let url = format!("{API_BASE}/v1/member/login");
        let body = json!({ "email": email, "passwd": password });
        debug!(target: "api", "login payload: {}", mask::mask_fields(&body));

        let resp = self.executor.execute(
            "member/login",
            self.base_opts.attempts(LOGIN_ATTEMPTS),
            || self.attempt_post_json(&url, &body),
            None::<fn() -> Result<(), ApiError>>,
        )?;
        if !resp.is_success() {
            return Err(ApiError::AuthFailure(format!(
                "status {} from login",
                resp.status
            )));
        }
        let auth_token = result_field_string(&resp, "LOGINAT")
            .ok_or_else(|| ApiError::AuthFailure("login response carried no token".into()))?;

        self.session.borrow_mut().apply_login(auth_token);
        Ok(())
    }

    /// GET /v1/login/refresh using the stale token; replaces it on success.
    pub fn refresh(&self) -> Result<(), ApiError> {
        let stale = self.session.borrow().token_for_refresh()?;
        let url = format!("{API_BASE}/v1/login/refresh");

        let resp = self.executor.execute(
            "login/refresh",
            self.base_opts.attempts(LOGIN_ATTEMPTS),
            || self.attempt_get(&url, &[], Some(&stale)),
            None::<fn() -> Result<(), ApiError>>,
        )?;
        if !resp.is_success() {
            return Err(ApiError::AuthExpired);
        }
        let auth_token = result_field_string(&resp, "LOGINAT").ok_or(ApiError::AuthExpired)?;

        self.session.borrow_mut().apply_refresh(auth_token);
        info!(target: "auth", "session refreshed");
        Ok(())
    }

    /// GET /v1/login/me, confirming the stored session is usable.
    pub fn me(&self) -> Result<Value, ApiError> {
        self.get_json("login/me", "/v1/login/me", &[], self.base_opts.refreshing())
    }

    /// GET /v1/novel: the work metadata envelope.
    pub fn novel(&self, novel_no: u64) -> Result<Value, ApiError> {
        self.get_json(
            "novel",
            "/v1/novel",
            &[("novel_no".to_string(), novel_no.to_string())],
            self.base_opts.refreshing(),
        )
    }

    /// GET /v1/novel/episode/list: the full episode listing, ascending.
    pub fn episode_list(&self, novel_no: u64, rows: u32) -> Result<Value, ApiError> {
        self.get_json(
            "episode/list",
            "/v1/novel/episode/list",
            &[
                ("novel_no".to_string(), novel_no.to_string()),
                ("rows".to_string(), rows.to_string()),
                ("sort".to_string(), "ASC".to_string()),
            ],
            self.base_opts.refreshing(),
        )
    }

    /// GET /v1/novel/episode: the per-episode ticket. Throttled; the
    /// ticket endpoint rate-limits hardest, so it gets the largest budget.
    pub fn episode_ticket(&self, episode_no: u64) -> Result<Value, ApiError> {
        self.throttle_with_jitter();
        self.get_json(
            "episode/ticket",
            "/v1/novel/episode",
            &[("episode_no".to_string(), episode_no.to_string())],
            self.base_opts.attempts(TICKET_ATTEMPTS).refreshing(),
        )
    }

    /// GET /v1/novel/episode/content with the mined `_t` token. Unlike the
    /// rest of the API this endpoint wants no auth header.
    pub fn episode_content(&self, content_token: &str) -> Result<Value, ApiError> {
        self.throttle_with_jitter();
        let url = format!("{API_BASE}/v1/novel/episode/content");
        let query = [("_t".to_string(), content_token.to_string())];
        let resp = self.executor.execute(
            "episode/content",
            self.base_opts.attempts(CONTENT_ATTEMPTS),
            || self.attempt_get(&url, &query, None),
            None::<fn() -> Result<(), ApiError>>,
        )?;
        into_json("episode/content", resp)
    }

    /// Fetch a ready-made content URL (tier-3 extraction) as JSON.
    pub fn fetch_json_url(&self, url: &str) -> Result<Value, ApiError> {
        self.throttle_with_jitter();
        let resp = self.executor.execute(
            "episode/content-url",
            self.base_opts.attempts(CONTENT_ATTEMPTS),
            || self.attempt_get(url, &[], None),
            None::<fn() -> Result<(), ApiError>>,
        )?;
        into_json("episode/content-url", resp)
    }

    /// Best-effort byte fetch (cover images). Failures yield `None`.
    pub fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let resp = self.http.get(url).send().ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.bytes().ok().map(|b| b.to_vec())
    }

    fn get_json(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(String, String)],
        opts: ExecOptions,
    ) -> Result<Value, ApiError> {
        // Fail fast when the session is missing or known-expired.
        let auth = self.session.borrow().current()?.auth_token;
        let url = format!("{API_BASE}{path}");

        let attempt = || {
            // Re-read per attempt so a mid-call refresh takes effect.
            let auth = self
                .session
                .borrow()
                .current()
                .map(|t| t.auth_token)
                .unwrap_or_else(|_| auth.clone());
            self.attempt_get(&url, query, Some(&auth))
        };
        let refresh = || {
            self.session.borrow_mut().mark_expired();
            self.refresh()
        };

        let resp = self
            .executor
            .execute(endpoint, opts, attempt, Some(refresh))?;
        into_json(endpoint, resp)
    }

    fn attempt_get(
        &self,
        url: &str,
        query: &[(String, String)],
        auth_token: Option<&str>,
    ) -> Result<RawResponse, TransportError> {
        let mut req = self.http.get(url).query(query);
        if let Some(token) = auth_token {
            req = req.header("login-at", token);
        }
        let resp = req.send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(RawResponse { status, body })
    }

    fn attempt_post_json(&self, url: &str, body: &Value) -> Result<RawResponse, TransportError> {
        let resp = self.http.post(url).json(body).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(RawResponse { status, body })
    }

    /// Fixed delay plus a little jitter before content-sensitive requests.
    fn throttle_with_jitter(&self) {
        if self.throttle.is_zero() {
            return;
        }
        let jitter = Duration::from_secs_f64(0.05 + jitter_seconds(0.2));
        std::thread::sleep(self.throttle + jitter);
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(ORIGIN, HeaderValue::from_static(WEB_BASE));
    headers.insert(REFERER, HeaderValue::from_static("https://global.novelpia.com/"));
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
    headers.insert(
        "x-requested-with",
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers
}

fn into_json(endpoint: &str, resp: RawResponse) -> Result<Value, ApiError> {
    if !resp.is_success() {
        return Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: resp.status,
        });
    }
    resp.json().ok_or_else(|| ApiError::Malformed {
        endpoint: endpoint.to_string(),
        detail: "body is not JSON".to_string(),
    })
}

fn result_field_string(resp: &RawResponse, key: &str) -> Option<String> {
    resp.json()?
        .get("result")?
        .get(key)?
        .as_str()
        .map(str::to_string)
}

/// Lightweight jitter derived from the clock's sub-second noise; enough to
/// desynchronize request cadence without a rand dependency.
fn jitter_seconds(max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    let bucket = (nanos % 10_000) as f64 / 10_000.0;
    bucket * max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..32 {
            let j = jitter_seconds(0.2);
            assert!((0.0..0.2).contains(&j));
        }
        assert_eq!(jitter_seconds(0.0), 0.0);
    }

    #[test]
    fn result_field_lookup() {
        let resp = RawResponse {
            status: 200,
            body: r#"{"result":{"LOGINAT":"tok"}}"#.to_string(),
        };
        assert_eq!(result_field_string(&resp, "LOGINAT").unwrap(), "tok");
        assert_eq!(result_field_string(&resp, "missing"), None);
    }
}
