// src/store/mod.rs
// Row-oriented storage boundary. The pipeline only ever talks to these four
// collections (sources, drafts, published, ledger) through this trait; the
// two moderation transitions are store procedures so the insert+update pair
// stays atomic inside the engine.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::PipelineError;
use crate::generate::StructuredDraft;
use crate::source::{Source, SourceKind};

pub use memory::MemoryStore;
pub use rest::RestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed,
    Skipped,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::Skipped => "skipped",
        }
    }
}

/// Where an article came from. Carried verbatim from draft to published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_kind: SourceKind,
    pub source_id: Option<i64>,
    pub origin_title: Option<String>,
    pub origin_url: Option<String>,
}

/// Content fields shared by drafts and published articles. Promotion copies
/// these across unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub body: String,
    pub tag: String,
    pub seo_title: String,
    pub seo_description: String,
    pub seo_keywords: Vec<String>,
}

impl From<StructuredDraft> for ArticleContent {
    fn from(d: StructuredDraft) -> Self {
        Self {
            title: d.title,
            slug: d.slug,
            excerpt: d.excerpt,
            body: d.body,
            tag: d.tag,
            seo_title: d.seo_title,
            seo_description: d.seo_description,
            seo_keywords: d.seo_keywords,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    #[serde(flatten)]
    pub content: ArticleContent,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub status: DraftStatus,
    pub rejection_note: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Published {
    pub id: i64,
    #[serde(flatten)]
    pub content: ArticleContent,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDraft {
    pub content: ArticleContent,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub source_id: Option<i64>,
    pub source_kind: SourceKind,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLedgerEntry {
    pub source_id: Option<i64>,
    pub source_kind: SourceKind,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn active_sources(&self) -> Result<Vec<Source>, PipelineError>;

    /// Best-effort stamp after a successful feed retrieval.
    async fn mark_source_fetched(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), PipelineError>;

    /// The dedup set: origin links of feed-provenance rows across BOTH the
    /// draft and published collections. An item that was generated and then
    /// approved out of the queue must still count as seen.
    async fn feed_origin_links(&self) -> Result<HashSet<String>, PipelineError>;

    async fn insert_draft(&self, draft: NewDraft) -> Result<Draft, PipelineError>;
    async fn draft(&self, id: i64) -> Result<Option<Draft>, PipelineError>;
    async fn pending_drafts(&self, limit: usize) -> Result<Vec<Draft>, PipelineError>;

    /// Atomic promotion procedure: re-reads the draft, requires `pending`,
    /// inserts the published copy and marks the draft approved as one unit.
    /// Returns the new published row's id.
    async fn promote_draft(&self, draft_id: i64) -> Result<i64, PipelineError>;

    /// Rejection procedure: requires `pending`; stamps review time and an
    /// optional note.
    async fn reject_draft(&self, draft_id: i64, note: Option<String>)
        -> Result<(), PipelineError>;

    async fn published(&self, id: i64) -> Result<Option<Published>, PipelineError>;
    async fn delete_published(&self, id: i64) -> Result<(), PipelineError>;

    /// Append-only; one row per generation attempt.
    async fn append_ledger(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, PipelineError>;

    /// Successful attempts ledgered since `since`; feeds the daily budget.
    async fn success_count_since(&self, since: DateTime<Utc>) -> Result<usize, PipelineError>;
}
