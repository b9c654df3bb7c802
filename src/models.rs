use crate::error::Error;
use std::collections::HashMap;

/// A raw input string together with the post id parsed out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReference {
    pub raw: String,
    pub id: String,
}

impl PostReference {
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }

    pub fn canonical_url(&self) -> String {
        format!("https://www.reddit.com/comments/{}/", self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub body: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<i64>,
    pub url: String,
    pub subreddit: Option<String>,
    pub num_comments: Option<i64>,
    pub deleted: bool,
}

impl Post {
    /// Stand-in for a post the platform no longer serves (404 or empty listing).
    pub fn gone(reference: &PostReference) -> Self {
        Self {
            id: reference.id.clone(),
            title: None,
            author: None,
            body: None,
            score: None,
            created_utc: None,
            url: reference.canonical_url(),
            subreddit: None,
            num_comments: None,
            deleted: true,
        }
    }
}

/// What a comment replies to, decoded from a `t3_`/`t1_` fullname.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Post(String),
    Comment(String),
}

impl ParentRef {
    pub fn parse(fullname: &str) -> Option<Self> {
        if let Some(id) = fullname.strip_prefix("t3_") {
            Some(ParentRef::Post(id.to_string()))
        } else {
            fullname
                .strip_prefix("t1_")
                .map(|id| ParentRef::Comment(id.to_string()))
        }
    }

    pub fn fullname(&self) -> String {
        match self {
            ParentRef::Post(id) => format!("t3_{id}"),
            ParentRef::Comment(id) => format!("t1_{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub parent: ParentRef,
    pub author: Option<String>,
    pub body: Option<String>,
    pub score: Option<i64>,
    /// Set by [`CommentTree::insert`]; top-level comments are depth 0.
    pub depth: usize,
    pub created_utc: Option<i64>,
    pub deleted: bool,
}

/// Arena of comments with index-based parent/child links.
///
/// Children keep insertion order, which is the order the platform returned them in.
#[derive(Debug, Default, Clone)]
pub struct CommentTree {
    nodes: Vec<Comment>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    Added(usize),
    Duplicate(usize),
    /// Parent comment was never seen, usually because it sits below the depth cap.
    Orphan,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Depth a new child of `parent` would get, or `None` when the parent is unknown.
    pub fn child_depth(&self, parent: &ParentRef) -> Option<usize> {
        match parent {
            ParentRef::Post(_) => Some(0),
            ParentRef::Comment(id) => self.index.get(id).map(|&i| self.nodes[i].depth + 1),
        }
    }

    pub fn insert(&mut self, mut comment: Comment) -> Inserted {
        if let Some(&i) = self.index.get(&comment.id) {
            return Inserted::Duplicate(i);
        }
        let parent_slot = match &comment.parent {
            ParentRef::Post(_) => None,
            ParentRef::Comment(pid) => match self.index.get(pid) {
                Some(&p) => Some(p),
                None => return Inserted::Orphan,
            },
        };
        comment.depth = parent_slot.map_or(0, |p| self.nodes[p].depth + 1);

        let slot = self.nodes.len();
        self.index.insert(comment.id.clone(), slot);
        self.nodes.push(comment);
        self.children.push(Vec::new());
        match parent_slot {
            Some(p) => self.children[p].push(slot),
            None => self.roots.push(slot),
        }
        Inserted::Added(slot)
    }

    /// Pre-order walk: each comment, then its replies, siblings in platform order.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }
}

pub struct DepthFirst<'a> {
    tree: &'a CommentTree,
    stack: Vec<usize>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a Comment;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.stack.pop()?;
        self.stack
            .extend(self.tree.children[slot].iter().rev().copied());
        Some(&self.tree.nodes[slot])
    }
}

/// One output row: the post repeated alongside one of its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRecord {
    pub post_id: String,
    pub post_title: String,
    pub post_url: String,
    pub post_author: Option<String>,
    pub post_score: Option<i64>,
    pub post_created_utc: Option<i64>,
    pub post_deleted: bool,
    pub subreddit: Option<String>,
    pub post_comment_count: Option<i64>,
    pub comment: Option<CommentCells>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentCells {
    pub id: String,
    pub parent_id: String,
    pub author: Option<String>,
    pub body: String,
    pub score: Option<i64>,
    pub depth: usize,
    pub created_utc: Option<i64>,
    pub deleted: bool,
}

/// Outcome for a single input row. Every input row yields exactly one of these.
#[derive(Debug)]
pub enum ExtractionResult {
    Complete {
        reference: PostReference,
        records: Vec<ExtractionRecord>,
    },
    /// Post fetched, comment retrieval stopped early; `records` holds what arrived.
    Partial {
        reference: PostReference,
        records: Vec<ExtractionRecord>,
        error: Error,
    },
    Failed {
        raw: String,
        error: Error,
    },
}

impl ExtractionResult {
    pub fn records(&self) -> &[ExtractionRecord] {
        match self {
            ExtractionResult::Complete { records, .. }
            | ExtractionResult::Partial { records, .. } => records,
            ExtractionResult::Failed { .. } => &[],
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            ExtractionResult::Complete { reference, .. }
            | ExtractionResult::Partial { reference, .. } => &reference.raw,
            ExtractionResult::Failed { raw, .. } => raw,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ExtractionResult::Complete { .. } => None,
            ExtractionResult::Partial { error, .. } | ExtractionResult::Failed { error, .. } => {
                Some(error)
            }
        }
    }

    pub fn is_post_deleted(&self) -> bool {
        self.records().first().is_some_and(|r| r.post_deleted)
    }
}
