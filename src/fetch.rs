use crate::api::ApiClient;
use crate::error::Error;
use crate::models::{CommentTree, Post, PostReference};
use crate::transport::Transport;

/// A post and its comment tree, materialized.
#[derive(Debug)]
pub struct Thread {
    pub post: Post,
    pub comments: CommentTree,
    /// Why comment retrieval stopped early, if it did.
    pub partial: Option<Error>,
}

/// Fetch the post, then its comments.
///
/// A failed post fetch fails the whole thread and no comment call is made.
/// A failed comment fetch keeps the post and the comments gathered so far.
pub async fn fetch_thread<T: Transport>(
    client: &ApiClient<T>,
    reference: &PostReference,
) -> Result<Thread, Error> {
    let post = client.fetch_post(reference).await?;
    if post.deleted && post.title.is_none() {
        // nothing left to walk
        return Ok(Thread {
            post,
            comments: CommentTree::new(),
            partial: None,
        });
    }

    let fetched = client.fetch_comments(reference).await;
    if let Some(e) = &fetched.interrupted {
        tracing::warn!(
            id = %reference.id,
            kept = fetched.tree.len(),
            error = %e,
            "comment retrieval interrupted, keeping partial thread"
        );
    }
    Ok(Thread {
        post,
        comments: fetched.tree,
        partial: fetched.interrupted,
    })
}
