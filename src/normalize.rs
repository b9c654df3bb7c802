use crate::fetch::Thread;
use crate::models::{Comment, CommentCells, ExtractionRecord, Post};

/// Replaces line breaks so every cell stays on one line.
pub const LINE_DELIMITER: &str = " | ";

/// Collapse `\r\n`, `\r` and `\n` into [`LINE_DELIMITER`]. Other text is left alone.
pub fn single_line(text: &str) -> String {
    if !text.contains(&['\n', '\r'][..]) {
        return text.to_string();
    }
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .collect::<Vec<_>>()
        .join(LINE_DELIMITER)
}

fn post_row(post: &Post, comment: Option<CommentCells>) -> ExtractionRecord {
    ExtractionRecord {
        post_id: post.id.clone(),
        post_title: post.title.as_deref().map(single_line).unwrap_or_default(),
        post_url: post.url.clone(),
        post_author: post.author.clone(),
        post_score: post.score,
        post_created_utc: post.created_utc,
        post_deleted: post.deleted,
        subreddit: post.subreddit.clone(),
        post_comment_count: post.num_comments,
        comment,
    }
}

fn cells(c: &Comment) -> CommentCells {
    CommentCells {
        id: c.id.clone(),
        parent_id: c.parent.fullname(),
        author: c.author.clone(),
        body: c.body.as_deref().map(single_line).unwrap_or_default(),
        score: c.score,
        depth: c.depth,
        created_utc: c.created_utc,
        deleted: c.deleted,
    }
}

/// One record per comment in depth-first order, or a single post-only record.
pub fn normalize(thread: &Thread) -> Vec<ExtractionRecord> {
    if thread.comments.is_empty() {
        return vec![post_row(&thread.post, None)];
    }
    thread
        .comments
        .depth_first()
        .map(|c| post_row(&thread.post, Some(cells(c))))
        .collect()
}
