use crate::api::FetchCaps;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One GET against the API, relative to the API host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: vec![("raw_json", "1".to_string())],
        }
    }

    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Post metadata by fullname.
    pub fn post_info(post_id: &str) -> Self {
        Self::new("/api/info").param("id", format!("t3_{post_id}"))
    }

    /// Post plus its initial comment listing.
    pub fn comments(post_id: &str, caps: &FetchCaps) -> Self {
        Self::new(format!("/comments/{post_id}"))
            .param("limit", caps.max_comments)
            .param("depth", caps.request_depth())
    }

    /// Sub-thread rooted at `comment_id`, used for "continue this thread" placeholders.
    pub fn thread(post_id: &str, comment_id: &str, depth: usize) -> Self {
        Self::new(format!("/comments/{post_id}"))
            .param("comment", comment_id)
            .param("depth", depth)
    }

    pub fn more_children(post_id: &str, ids: &[String]) -> Self {
        Self::new("/api/morechildren")
            .param("api_type", "json")
            .param("link_id", format!("t3_{post_id}"))
            .param("children", ids.join(","))
            .param("limit_children", "false")
    }

    /// `path?k=v&...` in parameter order. Stable, so usable as a lookup key.
    pub fn describe(&self) -> String {
        let q: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}?{}", self.path, q.join("&"))
    }
}

/// Transport-level failure, classified so the adapter can decide whether to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// 429, with the server's hint when it sent one.
    Throttled { retry_after: Option<Duration> },
    /// Non-success status other than 429.
    Status(u16),
    /// Timeouts, connection resets, expired tokens.
    Network(String),
    /// Body was not JSON.
    Decode(String),
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Throttled { .. } | HttpError::Network(_) => true,
            HttpError::Status(s) => *s >= 500,
            HttpError::Decode(_) => false,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, HttpError::Status(404 | 410))
    }
}

/// The seam between the API client adapter and the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &ApiRequest) -> Result<Value, HttpError>;
}
