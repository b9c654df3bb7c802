//! Post id extraction from the URL shapes people paste into spreadsheets.

use crate::error::{Error, Result};
use crate::models::PostReference;
use regex::Regex;
use std::sync::LazyLock;

static POST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?((?:[a-z0-9-]+\.)?reddit\.com|(?:www\.)?redd\.it)(?::\d+)?(/[^?#]*)?(?:[?#].*)?$",
    )
    .expect("post url pattern")
});

/// Longest base36 id the platform hands out today is 7 chars; leave headroom.
const MAX_ID_LEN: usize = 13;

/// Parse a raw cell into a [`PostReference`].
///
/// Accepted: `reddit.com/r/<sub>/comments/<id>/...`, `reddit.com/comments/<id>`,
/// `reddit.com/gallery/<id>`, `redd.it/<id>`, any reddit.com subdomain (`www`, `old`, `np`, ...),
/// with or without a scheme, trailing query string or fragment. Media hosts such as
/// `v.redd.it` or `i.redd.it` carry media ids, not post ids, and are rejected.
pub fn parse(raw: &str) -> Result<PostReference> {
    let trimmed = raw.trim();
    let invalid = |reason| Error::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let caps = POST_URL
        .captures(trimmed)
        .ok_or_else(|| invalid("not a reddit URL"))?;
    let host = caps[1].to_ascii_lowercase();
    let segments: Vec<&str> = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let id = if host.ends_with("redd.it") {
        segments.first().copied()
    } else {
        if segments.len() >= 3 && segments[0].eq_ignore_ascii_case("r") && segments[2] == "s" {
            return Err(invalid("share links need a redirect lookup"));
        }
        segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case("comments") || s.eq_ignore_ascii_case("gallery"))
            .and_then(|i| segments.get(i + 1).copied())
    }
    .ok_or_else(|| invalid("no post id in path"))?;

    let id = id.to_ascii_lowercase();
    if !is_post_id(&id) {
        return Err(invalid("post id is not base36"));
    }
    Ok(PostReference {
        raw: raw.to_string(),
        id,
    })
}

pub fn is_post_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}
