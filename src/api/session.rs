//! Session/token store: the only cross-cutting mutable state of a run.
//!
//! Holds the `login-at` auth token and the `USERKEY` device key, tracks
//! whether an expiry signal has been observed, and persists both values so
//! later runs skip login. Only the executor's refresh path may mutate the
//! store mid-run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    ExpiredSignal,
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub auth_token: String,
    pub user_key: String,
    pub freshness: Freshness,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    login_at: String,
    #[serde(default)]
    userkey: String,
}

#[derive(Debug)]
pub struct SessionStore {
    auth_token: Option<String>,
    user_key: String,
    freshness: Freshness,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Load the persisted session if `path` exists; otherwise start empty
    /// with a freshly generated device key.
    pub fn load(path: Option<&Path>) -> Self {
        let file = path
            .filter(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|raw| serde_json::from_str::<SessionFile>(&raw).ok())
            .unwrap_or_default();

        let auth_token = Some(file.login_at.trim().to_string()).filter(|t| !t.is_empty());
        let user_key = if file.userkey.trim().is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            file.userkey.trim().to_string()
        };
        if auth_token.is_some() {
            debug!(target: "auth", "restored session from {:?}", path);
        }

        Self {
            auth_token,
            user_key,
            freshness: Freshness::Fresh,
            path: path.map(Path::to_path_buf),
        }
    }

    pub fn has_session(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// The token for a normal request. Refuses to hand out a token after an
    /// expiry signal: callers must go through the refresh path first.
    pub fn current(&self) -> Result<SessionToken, ApiError> {
        let auth_token = self
            .auth_token
            .clone()
            .ok_or(ApiError::CredentialsMissing)?;
        if self.freshness == Freshness::ExpiredSignal {
            return Err(ApiError::AuthExpired);
        }
        Ok(SessionToken {
            auth_token,
            user_key: self.user_key.clone(),
            freshness: self.freshness,
        })
    }

    /// The stale token needed to call the refresh endpoint itself.
    pub fn token_for_refresh(&self) -> Result<String, ApiError> {
        self.auth_token.clone().ok_or(ApiError::CredentialsMissing)
    }

    /// Record the expiry sentinel; `current()` fails until a refresh lands.
    pub fn mark_expired(&mut self) {
        self.freshness = Freshness::ExpiredSignal;
    }

    pub fn apply_login(&mut self, auth_token: String) {
        self.auth_token = Some(auth_token);
        self.freshness = Freshness::Fresh;
        self.persist();
    }

    pub fn apply_refresh(&mut self, auth_token: String) {
        self.auth_token = Some(auth_token);
        self.freshness = Freshness::Fresh;
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let file = SessionFile {
            login_at: self.auth_token.clone().unwrap_or_default(),
            userkey: self.user_key.clone(),
        };
        let write = serde_json::to_string_pretty(&file)
            .map_err(|e| e.to_string())
            .and_then(|raw| fs::write(path, raw).map_err(|e| e.to_string()));
        match write {
            Ok(()) => debug!(target: "auth", "session persisted to {}", path.display()),
            Err(err) => warn!(target: "auth", "failed to persist session: {err}"),
        }
    }
}
