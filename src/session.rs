//! Authenticated HTTP session against the OAuth API host.

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, HttpError, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this long before the server-side expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Clone)]
struct Bearer {
    token: String,
    expires_at: Instant,
}

/// Cached bearer token. At most one refresh runs at a time; callers that
/// queue behind it pick up the token it stored.
#[derive(Default)]
struct TokenCache {
    bearer: Mutex<Option<Bearer>>,
    refresh: tokio::sync::Mutex<()>,
}

impl TokenCache {
    fn current(&self) -> Option<String> {
        self.bearer
            .lock()
            .as_ref()
            .filter(|b| b.expires_at > Instant::now())
            .map(|b| b.token.clone())
    }

    async fn get_or_refresh<F, Fut>(&self, refresh: F) -> std::result::Result<String, HttpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(String, Duration), HttpError>>,
    {
        if let Some(t) = self.current() {
            return Ok(t);
        }
        let _single = self.refresh.lock().await;
        if let Some(t) = self.current() {
            return Ok(t);
        }
        let (token, ttl) = refresh().await?;
        *self.bearer.lock() = Some(Bearer {
            token: token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(token)
    }

    /// Drop `token` unless someone already replaced it.
    fn invalidate(&self, token: &str) {
        let mut bearer = self.bearer.lock();
        if bearer.as_ref().is_some_and(|b| b.token == token) {
            *bearer = None;
        }
    }
}

/// Production [`Transport`]: client-credentials grant plus bearer-authenticated GETs.
pub struct RedditSession {
    http: Client,
    creds: Credentials,
    tokens: TokenCache,
}

impl RedditSession {
    /// Build the HTTP client and perform the first token grant.
    pub async fn connect(creds: Credentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(creds.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Auth(format!("http client: {e}")))?;
        let session = Self {
            http,
            creds,
            tokens: TokenCache::default(),
        };
        session.token().await.map_err(|e| match e {
            HttpError::Status(s) => Error::Auth(format!("token endpoint answered {s}")),
            HttpError::Throttled { .. } => Error::Auth("token endpoint throttled".into()),
            HttpError::Network(m) | HttpError::Decode(m) => Error::Auth(m),
        })?;
        tracing::info!(client_id = %session.creds.client_id, "authenticated");
        Ok(session)
    }

    /// One client_credentials exchange. Returns the token and how long to trust it.
    async fn grant(&self) -> std::result::Result<(String, Duration), HttpError> {
        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))?;
        let token = match (body.access_token, body.error) {
            (Some(t), _) => t,
            (None, err) => return Err(HttpError::Decode(err.unwrap_or_else(|| "no access_token".into()))),
        };
        let ttl = Duration::from_secs(body.expires_in.unwrap_or(3600)).saturating_sub(EXPIRY_SLACK);
        tracing::debug!(ttl_s = ttl.as_secs(), "granted bearer token");
        Ok((token, ttl))
    }

    async fn token(&self) -> std::result::Result<String, HttpError> {
        self.tokens.get_or_refresh(|| self.grant()).await
    }
}

#[async_trait]
impl Transport for RedditSession {
    async fn get(&self, request: &ApiRequest) -> std::result::Result<Value, HttpError> {
        let token = self.token().await?;
        let resp = self
            .http
            .get(format!("{API_BASE}{}", request.path))
            .query(&request.query)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(HttpError::Throttled {
                retry_after: retry_hint(resp.headers()),
            });
        }
        if status == StatusCode::UNAUTHORIZED {
            // expired or revoked; next attempt re-grants
            self.tokens.invalidate(&token);
            return Err(HttpError::Network("bearer token rejected".into()));
        }
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }
}

fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    let secs = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    };
    secs(RETRY_AFTER.as_str()).or_else(|| secs("x-ratelimit-reset"))
}
