//! Rate-limited, retrying client adapter over a [`Transport`].

use crate::error::{Error, Result};
use crate::extract::{self, Ingest, MoreNode};
use crate::models::{CommentTree, ParentRef, Post, PostReference};
use crate::retry::{next_pause, RetryPolicy};
use crate::throttle::Throttle;
use crate::transport::{ApiRequest, HttpError, Transport};
use serde_json::Value;

/// `morechildren` accepts at most this many ids per call.
pub const MORE_CHUNK: usize = 100;
/// Deepest `depth` the listing endpoint honours.
const API_MAX_DEPTH: usize = 10;

/// Bounds on how much of a comment tree gets pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCaps {
    pub max_comments: usize,
    /// Deepest depth kept; top-level comments are depth 0.
    pub max_depth: usize,
}

impl Default for FetchCaps {
    fn default() -> Self {
        Self {
            max_comments: 500,
            max_depth: 8,
        }
    }
}

impl FetchCaps {
    /// The listing's `depth` parameter counts levels, ours counts from zero.
    pub fn request_depth(&self) -> usize {
        (self.max_depth + 1).min(API_MAX_DEPTH)
    }
}

/// Comments for one post, in traversal order, plus how the retrieval ended.
#[derive(Debug, Default)]
pub struct CommentFetch {
    pub tree: CommentTree,
    pub truncated: bool,
    /// Set when retrieval stopped early; `tree` holds what arrived before that.
    pub interrupted: Option<Error>,
}

pub struct ApiClient<T> {
    transport: T,
    throttle: Throttle,
    policy: RetryPolicy,
    caps: FetchCaps,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, throttle: Throttle, policy: RetryPolicy, caps: FetchCaps) -> Self {
        Self {
            transport,
            throttle,
            policy,
            caps,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One logical call: gated by the shared throttle, retried per policy.
    /// `Ok(None)` means the resource is gone (404/410).
    pub async fn call(&self, request: &ApiRequest) -> Result<Option<Value>> {
        let attempts = self.policy.attempts();
        let mut schedule = self.policy.schedule();
        let mut last = HttpError::Network("not attempted".into());

        for attempt in 1..=attempts {
            self.throttle.gate().await;
            match self.transport.get(request).await {
                Ok(v) => {
                    if attempt > 1 {
                        tracing::debug!(path = %request.path, attempt, "recovered");
                    }
                    return Ok(Some(v));
                }
                Err(e) if e.is_gone() => return Ok(None),
                Err(e) if e.is_retryable() => {
                    if attempt < attempts {
                        let mut pause = next_pause(&mut schedule, &self.policy);
                        if let HttpError::Throttled { retry_after: Some(hint) } = &e {
                            // server hints never outlast the policy ceiling
                            let hint = (*hint).min(self.policy.max);
                            self.throttle.cool_down(hint);
                            pause = pause.max(hint);
                        }
                        tracing::warn!(
                            path = %request.path,
                            error = ?e,
                            backoff_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                            "retrying ({attempt}/{attempts})"
                        );
                        tokio::time::sleep(pause).await;
                    }
                    last = e;
                }
                Err(HttpError::Status(status)) => {
                    return Err(Error::Http {
                        path: request.path.clone(),
                        status,
                    })
                }
                Err(HttpError::Decode(message)) => {
                    return Err(Error::decode(&request.path, message))
                }
                Err(e) => last = e,
            }
        }

        tracing::warn!(path = %request.path, "gave up after {attempts} attempts");
        Err(match last {
            HttpError::Throttled { .. } => Error::RateLimited {
                path: request.path.clone(),
                attempts,
            },
            HttpError::Status(s) => Error::TransientNetwork {
                path: request.path.clone(),
                attempts,
                message: format!("HTTP {s}"),
            },
            HttpError::Network(message) | HttpError::Decode(message) => Error::TransientNetwork {
                path: request.path.clone(),
                attempts,
                message,
            },
        })
    }

    /// Post metadata. A post the platform no longer serves comes back with `deleted = true`.
    pub async fn fetch_post(&self, reference: &PostReference) -> Result<Post> {
        let request = ApiRequest::post_info(&reference.id);
        let post = match self.call(&request).await? {
            Some(listing) => extract::first_post(&listing),
            None => None,
        };
        Ok(post.unwrap_or_else(|| {
            tracing::info!(id = %reference.id, "post not found, recording as deleted");
            Post::gone(reference)
        }))
    }

    /// Full comment tree, resolving "more" placeholders until exhausted or a cap is hit.
    ///
    /// Never fails outright: a failed call ends retrieval and is reported in
    /// [`CommentFetch::interrupted`] next to whatever was already gathered.
    pub async fn fetch_comments(&self, reference: &PostReference) -> CommentFetch {
        let mut fetch = CommentFetch::default();
        let mut ingest = Ingest::default();

        let request = ApiRequest::comments(&reference.id, &self.caps);
        match self.call(&request).await {
            Ok(Some(resp)) => match extract::comment_listing(&resp).and_then(extract::children) {
                Some(things) => extract::ingest(things, &mut fetch.tree, &self.caps, &mut ingest),
                None => {
                    fetch.interrupted = Some(Error::decode(&request.path, "no comment listing"));
                    return fetch;
                }
            },
            Ok(None) => return fetch,
            Err(e) => {
                fetch.interrupted = Some(e);
                return fetch;
            }
        }

        while let Some(more) = ingest.pending.pop_front() {
            if fetch.tree.len() >= self.caps.max_comments {
                ingest.truncated = true;
                break;
            }
            if let Err(e) = self.resolve_more(reference, &more, &mut fetch.tree, &mut ingest).await {
                fetch.interrupted = Some(e);
                break;
            }
        }

        fetch.truncated = ingest.truncated;
        if fetch.truncated {
            tracing::debug!(id = %reference.id, kept = fetch.tree.len(), "comment caps reached");
        }
        fetch
    }

    async fn resolve_more(
        &self,
        reference: &PostReference,
        more: &MoreNode,
        tree: &mut CommentTree,
        ingest: &mut Ingest,
    ) -> Result<()> {
        if more.is_continue_thread() {
            let ParentRef::Comment(parent_id) = &more.parent else {
                return Ok(());
            };
            let Some(parent_depth) = tree.get(parent_id).map(|c| c.depth) else {
                return Ok(());
            };
            let remaining = self.caps.max_depth.saturating_sub(parent_depth);
            if remaining == 0 {
                ingest.truncated = true;
                return Ok(());
            }
            let request =
                ApiRequest::thread(&reference.id, parent_id, (remaining + 1).min(API_MAX_DEPTH));
            if let Some(resp) = self.call(&request).await? {
                let things = extract::comment_listing(&resp)
                    .and_then(extract::children)
                    .ok_or_else(|| Error::decode(&request.path, "no comment listing"))?;
                extract::ingest(things, tree, &self.caps, ingest);
            }
            return Ok(());
        }

        for chunk in more.children.chunks(MORE_CHUNK) {
            if tree.len() >= self.caps.max_comments {
                ingest.truncated = true;
                break;
            }
            let request = ApiRequest::more_children(&reference.id, chunk);
            if let Some(resp) = self.call(&request).await? {
                let things = extract::more_things(&resp)
                    .ok_or_else(|| Error::decode(&request.path, "no things in morechildren"))?;
                extract::ingest(things, tree, &self.caps, ingest);
            }
        }
        Ok(())
    }
}
