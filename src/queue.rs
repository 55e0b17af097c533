// src/queue.rs
// Moderation queue transitions. `pending` is the only live state; approval
// and rejection are terminal. Promotion and rejection run as store
// procedures (see `Store`); unpublish is orchestrated here with an ordering
// that can duplicate an article on a crash but never lose it.

use crate::error::PipelineError;
use crate::store::{Draft, NewDraft, Store};

/// Promote `pending → approved`, creating the published copy atomically.
/// Returns the new published article's id.
pub async fn promote(store: &dyn Store, draft_id: i64) -> Result<i64, PipelineError> {
    let id = store.promote_draft(draft_id).await?;
    tracing::info!(draft_id, published_id = id, "draft promoted");
    Ok(id)
}

/// Reject `pending → rejected` with an optional note.
pub async fn reject(
    store: &dyn Store,
    draft_id: i64,
    note: Option<String>,
) -> Result<(), PipelineError> {
    store.reject_draft(draft_id, note).await?;
    tracing::info!(draft_id, "draft rejected");
    Ok(())
}

/// Logical inverse of promotion: rebuild a pending draft from the published
/// article, then delete the published row. Insert comes first so a crash
/// between the two steps leaves the article duplicated, never lost.
pub async fn unpublish(store: &dyn Store, published_id: i64) -> Result<Draft, PipelineError> {
    let article = store
        .published(published_id)
        .await?
        .ok_or_else(|| PipelineError::Domain(format!("published {published_id} not found")))?;

    let draft = store
        .insert_draft(NewDraft {
            content: article.content.clone(),
            provenance: article.provenance.clone(),
        })
        .await?;

    store.delete_published(published_id).await?;
    tracing::info!(published_id, draft_id = draft.id, "article unpublished");
    Ok(draft)
}
