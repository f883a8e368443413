//! Remote post service: lookup of a single post by id, and deletion by id.
//!
//! Pipelines only see the `PostLookup` / `PostRemover` traits; `TwitterClient` is the HTTP
//! implementation. Closures implement both traits, which keeps tests free of network access.

use crate::cancel::CancelToken;
use crate::config::Credentials;
use crate::post::RemotePost;
use crate::status::RawStatus;
use anyhow::Context;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("post {id} not found (deleted, protected or never existed)")]
    NotFound { id: String },
    #[error("rate limited while requesting post {id}")]
    RateLimited { id: String },
    #[error("HTTP {status} while requesting post {id}")]
    Http { id: String, status: u16 },
    #[error("transport error while requesting post {id}: {source}")]
    Transport {
        id: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot decode post {id}: {message}")]
    Decode { id: String, message: String },
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("cancelled")]
    Cancelled,
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }
}

/// Fetch one post by id. `LookupError::NotFound` is the explicit "no such post" signal.
pub trait PostLookup {
    fn resolve(&self, id: &str) -> Result<RemotePost, LookupError>;
}

/// Delete one post by id.
pub trait PostRemover {
    fn remove(&self, id: &str) -> Result<(), LookupError>;
}

impl<F> PostLookup for F
where
    F: Fn(&str) -> Result<RemotePost, LookupError>,
{
    fn resolve(&self, id: &str) -> Result<RemotePost, LookupError> {
        self(id)
    }
}

/// Adapter so a closure can act as a `PostRemover` without clashing with the lookup impl.
pub struct RemoveFn<F>(pub F);

impl<F> PostRemover for RemoveFn<F>
where
    F: Fn(&str) -> Result<(), LookupError>,
{
    fn remove(&self, id: &str) -> Result<(), LookupError> {
        (self.0)(id)
    }
}

/// Blocking HTTP client for the Twitter API.
/// - lookup: `GET /1.1/statuses/show.json?id=..&tweet_mode=extended` (app bearer token)
/// - delete: `DELETE /2/tweets/{id}` (user-context token)
///
/// On HTTP 429 the client sleeps until `x-rate-limit-reset` (bounded by `max_wait`, and
/// interruptible through the cancel token) and retries, up to `max_rate_limit_waits` times.
pub struct TwitterClient {
    http: Client,
    base: String,
    api_token: String,
    user_token: Option<String>,
    max_rate_limit_waits: u32,
    max_wait: Duration,
    cancel: Option<CancelToken>,
}

impl TwitterClient {
    pub fn new(creds: &Credentials) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("tetl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            base: creds.api_base.trim_end_matches('/').to_string(),
            api_token: creds.api_token.clone(),
            user_token: creds.user_token.clone(),
            max_rate_limit_waits: 3,
            max_wait: Duration::from_secs(15 * 60),
            cancel: None,
        })
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_rate_limit_waits(mut self, n: u32, max_wait: Duration) -> Self {
        self.max_rate_limit_waits = n;
        self.max_wait = max_wait;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.is_cancelled())
    }

    /// Sleep until the advertised reset time. Returns false if cancelled meanwhile.
    fn wait_for_reset(&self, resp: &Response) -> bool {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        let wait = resp
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|reset| Duration::from_secs(reset.saturating_sub(now).max(1)))
            .unwrap_or(Duration::from_secs(60))
            .min(self.max_wait);
        tracing::warn!("rate limited; waiting {}s", wait.as_secs());
        let deadline = std::time::Instant::now() + wait;
        while std::time::Instant::now() < deadline {
            if self.cancelled() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(500));
        }
        true
    }

    /// Send with 429 handling; non-success statuses are mapped to `LookupError`.
    fn send_checked(
        &self,
        id: &str,
        build: impl Fn() -> reqwest::blocking::RequestBuilder,
    ) -> Result<Response, LookupError> {
        let mut waits = 0u32;
        loop {
            let resp = build()
                .send()
                .map_err(|source| LookupError::Transport { id: id.to_string(), source })?;
            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && waits < self.max_rate_limit_waits {
                waits += 1;
                if !self.wait_for_reset(&resp) {
                    return Err(LookupError::Cancelled);
                }
                continue;
            }
            return match status {
                s if s.is_success() => Ok(resp),
                StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Err(LookupError::NotFound { id: id.to_string() }),
                StatusCode::TOO_MANY_REQUESTS => Err(LookupError::RateLimited { id: id.to_string() }),
                s => Err(LookupError::Http { id: id.to_string(), status: s.as_u16() }),
            };
        }
    }
}

impl PostLookup for TwitterClient {
    fn resolve(&self, id: &str) -> Result<RemotePost, LookupError> {
        let url = format!("{}/1.1/statuses/show.json", self.base);
        let resp = self.send_checked(id, || {
            self.http
                .get(&url)
                .query(&[("id", id), ("tweet_mode", "extended")])
                .bearer_auth(&self.api_token)
        })?;
        let raw: RawStatus = resp
            .json()
            .map_err(|e| LookupError::Decode { id: id.to_string(), message: e.to_string() })?;
        raw.into_remote()
            .map_err(|e| LookupError::Decode { id: id.to_string(), message: format!("{e:#}") })
    }
}

impl PostRemover for TwitterClient {
    fn remove(&self, id: &str) -> Result<(), LookupError> {
        let token = self.user_token.as_deref().ok_or(LookupError::NotConfigured("TWITTER_USER_TOKEN"))?;
        let url = format!("{}/2/tweets/{}", self.base, id);
        self.send_checked(id, || self.http.delete(&url).bearer_auth(token))?;
        Ok(())
    }
}
