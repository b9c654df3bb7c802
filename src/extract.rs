//! Decoding of listing JSON into posts, comments and pending "more" placeholders.

use crate::api::FetchCaps;
use crate::models::{Comment, CommentTree, ParentRef, Post};
use serde_json::Value;
use std::collections::VecDeque;

const DELETED: &str = "[deleted]";
const REMOVED: &str = "[removed]";
const SITE: &str = "https://www.reddit.com";

/// A "load more comments" node that still has to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoreNode {
    pub parent: ParentRef,
    /// Ids to hand to `morechildren`. Empty means "continue this thread".
    pub children: Vec<String>,
}

impl MoreNode {
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }
}

/// Bookkeeping for one ingest pass.
#[derive(Debug, Default)]
pub struct Ingest {
    pub pending: VecDeque<MoreNode>,
    /// A cap stopped something from being kept.
    pub truncated: bool,
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(|x| x.as_str()).map(|s| s.to_string())
}

fn int_field(data: &Value, key: &str) -> Option<i64> {
    let v = data.get(key)?;
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

fn author_field(data: &Value) -> Option<String> {
    str_field(data, "author").filter(|a| a != DELETED && !a.is_empty())
}

fn is_blanked(text: Option<&str>) -> bool {
    matches!(text, Some(DELETED) | Some(REMOVED))
}

pub fn parse_post(data: &Value) -> Option<Post> {
    let id = str_field(data, "id")?;
    let body = str_field(data, "selftext");
    let raw_author = str_field(data, "author");
    let removed = data
        .get("removed_by_category")
        .is_some_and(|v| !v.is_null());
    let url = str_field(data, "permalink")
        .map(|p| format!("{SITE}{p}"))
        .or_else(|| str_field(data, "url"))
        .unwrap_or_else(|| format!("{SITE}/comments/{id}/"));

    Some(Post {
        deleted: removed || raw_author.as_deref() == Some(DELETED) || is_blanked(body.as_deref()),
        author: author_field(data),
        title: str_field(data, "title"),
        score: int_field(data, "score"),
        created_utc: int_field(data, "created_utc"),
        subreddit: str_field(data, "subreddit"),
        num_comments: int_field(data, "num_comments"),
        body,
        url,
        id,
    })
}

/// First `t3` in a listing. `None` when the listing is empty.
pub fn first_post(listing: &Value) -> Option<Post> {
    children(listing)?
        .iter()
        .find(|t| kind(t) == Some("t3"))
        .and_then(|t| t.get("data"))
        .and_then(parse_post)
}

pub fn parse_comment(data: &Value) -> Option<Comment> {
    let id = str_field(data, "id")?;
    let parent = data
        .get("parent_id")
        .and_then(|x| x.as_str())
        .and_then(ParentRef::parse)?;
    let body = str_field(data, "body");
    let raw_author = str_field(data, "author");
    Some(Comment {
        deleted: raw_author.as_deref() == Some(DELETED) || is_blanked(body.as_deref()),
        author: author_field(data),
        score: int_field(data, "score"),
        created_utc: int_field(data, "created_utc"),
        depth: 0,
        body,
        parent,
        id,
    })
}

pub fn parse_more(data: &Value) -> Option<MoreNode> {
    let parent = data
        .get("parent_id")
        .and_then(|x| x.as_str())
        .and_then(ParentRef::parse)?;
    let children = data
        .get("children")
        .and_then(|x| x.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|c| c.as_str())
                .filter(|c| *c != "_")
                .map(|c| c.to_string())
                .collect()
        })
        .unwrap_or_default();
    Some(MoreNode { parent, children })
}

fn kind(thing: &Value) -> Option<&str> {
    thing.get("kind").and_then(|k| k.as_str())
}

/// `data.children` of a Listing.
pub fn children(listing: &Value) -> Option<&Vec<Value>> {
    listing.get("data")?.get("children")?.as_array()
}

/// Comment listing out of a `/comments/<id>` response (`[post listing, comment listing]`).
pub fn comment_listing(resp: &Value) -> Option<&Value> {
    resp.as_array()?.get(1)
}

/// Things out of a `morechildren` response.
pub fn more_things(resp: &Value) -> Option<&Vec<Value>> {
    resp.get("json")?.get("data")?.get("things")?.as_array()
}

/// Insert `things` (and nested replies) into `tree`, depth-first, keeping their order.
pub fn ingest(things: &[Value], tree: &mut CommentTree, caps: &FetchCaps, out: &mut Ingest) {
    for thing in things {
        let Some(data) = thing.get("data") else { continue };
        match kind(thing) {
            Some("t1") => {
                let Some(comment) = parse_comment(data) else { continue };
                match tree.child_depth(&comment.parent) {
                    None => {
                        tracing::debug!(id = %comment.id, "dropping comment with unknown parent");
                        continue;
                    }
                    Some(d) if d > caps.max_depth => {
                        out.truncated = true;
                        continue;
                    }
                    Some(_) => {}
                }
                if !tree.contains(&comment.id) && tree.len() >= caps.max_comments {
                    out.truncated = true;
                    return;
                }
                tree.insert(comment);
                if let Some(replies) = data.get("replies").and_then(children) {
                    ingest(replies, tree, caps, out);
                }
            }
            Some("more") => {
                let Some(more) = parse_more(data) else { continue };
                match tree.child_depth(&more.parent) {
                    Some(d) if d <= caps.max_depth => out.pending.push_back(more),
                    _ => out.truncated = true,
                }
            }
            _ => {}
        }
    }
}
