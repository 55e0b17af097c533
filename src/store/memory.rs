// src/store/memory.rs
// In-memory store: Mutex-guarded rows, ids handed out monotonically. Used by
// tests and secretless local runs. Failpoints let tests force a failure at
// the seams that matter for atomicity (mid-promotion, ledger writes, the
// delete half of unpublish).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{
    AttemptOutcome, Draft, DraftStatus, LedgerEntry, NewDraft, NewLedgerEntry, Published, Store,
};
use crate::error::PipelineError;
use crate::source::{Source, SourceKind};

#[derive(Default)]
struct Rows {
    sources: Vec<Source>,
    drafts: Vec<Draft>,
    published: Vec<Published>,
    ledger: Vec<LedgerEntry>,
    next_id: i64,
}

impl Rows {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Rows>,
    fail_mid_promote: AtomicBool,
    fail_ledger: AtomicBool,
    fail_delete_published: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_source(&self, source: Source) {
        self.rows.lock().expect("rows mutex poisoned").sources.push(source);
    }

    pub fn seed_draft(&self, draft: Draft) {
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        rows.next_id = rows.next_id.max(draft.id);
        rows.drafts.push(draft);
    }

    pub fn seed_published(&self, article: Published) {
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        rows.next_id = rows.next_id.max(article.id);
        rows.published.push(article);
    }

    /// Abort the next promotion between the published insert and the draft
    /// update, rolling back as a real transaction would.
    pub fn fail_mid_promote(&self, on: bool) {
        self.fail_mid_promote.store(on, Ordering::SeqCst);
    }

    pub fn fail_ledger_writes(&self, on: bool) {
        self.fail_ledger.store(on, Ordering::SeqCst);
    }

    /// Make `delete_published` fail, simulating a crash after the insert
    /// half of an unpublish.
    pub fn fail_delete_published(&self, on: bool) {
        self.fail_delete_published.store(on, Ordering::SeqCst);
    }

    pub fn drafts_snapshot(&self) -> Vec<Draft> {
        self.rows.lock().expect("rows mutex poisoned").drafts.clone()
    }

    pub fn published_snapshot(&self) -> Vec<Published> {
        self.rows.lock().expect("rows mutex poisoned").published.clone()
    }

    pub fn ledger_snapshot(&self) -> Vec<LedgerEntry> {
        self.rows.lock().expect("rows mutex poisoned").ledger.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn active_sources(&self) -> Result<Vec<Source>, PipelineError> {
        let rows = self.rows.lock().expect("rows mutex poisoned");
        Ok(rows.sources.iter().filter(|s| s.active).cloned().collect())
    }

    async fn mark_source_fetched(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        if let Some(s) = rows.sources.iter_mut().find(|s| s.id == source_id) {
            s.last_fetched_at = Some(at);
        }
        Ok(())
    }

    async fn feed_origin_links(&self) -> Result<HashSet<String>, PipelineError> {
        let rows = self.rows.lock().expect("rows mutex poisoned");
        let mut links = HashSet::new();
        for d in &rows.drafts {
            if d.provenance.source_kind == SourceKind::Feed {
                if let Some(url) = &d.provenance.origin_url {
                    links.insert(url.clone());
                }
            }
        }
        for p in &rows.published {
            if p.provenance.source_kind == SourceKind::Feed {
                if let Some(url) = &p.provenance.origin_url {
                    links.insert(url.clone());
                }
            }
        }
        Ok(links)
    }

    async fn insert_draft(&self, draft: NewDraft) -> Result<Draft, PipelineError> {
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        let id = rows.next_id();
        let row = Draft {
            id,
            content: draft.content,
            provenance: draft.provenance,
            status: DraftStatus::Pending,
            rejection_note: None,
            generated_at: Utc::now(),
            reviewed_at: None,
        };
        rows.drafts.push(row.clone());
        Ok(row)
    }

    async fn draft(&self, id: i64) -> Result<Option<Draft>, PipelineError> {
        let rows = self.rows.lock().expect("rows mutex poisoned");
        Ok(rows.drafts.iter().find(|d| d.id == id).cloned())
    }

    async fn pending_drafts(&self, limit: usize) -> Result<Vec<Draft>, PipelineError> {
        let rows = self.rows.lock().expect("rows mutex poisoned");
        let mut out: Vec<Draft> = rows
            .drafts
            .iter()
            .filter(|d| d.status == DraftStatus::Pending)
            .cloned()
            .collect();
        out.sort_by_key(|d| std::cmp::Reverse(d.generated_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn promote_draft(&self, draft_id: i64) -> Result<i64, PipelineError> {
        // One lock for the whole procedure: read, insert, update happen as a
        // unit, the way the production store's transaction does.
        let mut rows = self.rows.lock().expect("rows mutex poisoned");

        let idx = rows
            .drafts
            .iter()
            .position(|d| d.id == draft_id)
            .ok_or_else(|| PipelineError::Domain(format!("draft {draft_id} not found")))?;
        if rows.drafts[idx].status != DraftStatus::Pending {
            return Err(PipelineError::Domain(format!(
                "draft {draft_id} is not pending"
            )));
        }
        let slug = rows.drafts[idx].content.slug.clone();
        if rows.published.iter().any(|p| p.content.slug == slug) {
            return Err(PipelineError::Domain(format!(
                "published slug '{slug}' already exists"
            )));
        }

        let id = rows.next_id();
        let article = Published {
            id,
            content: rows.drafts[idx].content.clone(),
            provenance: rows.drafts[idx].provenance.clone(),
            published_at: Utc::now(),
        };
        rows.published.push(article);

        if self.fail_mid_promote.swap(false, Ordering::SeqCst) {
            // Transaction abort: nothing from this procedure survives.
            rows.published.pop();
            return Err(PipelineError::Persistence(
                "injected failure mid-promotion; transaction rolled back".into(),
            ));
        }

        rows.drafts[idx].status = DraftStatus::Approved;
        rows.drafts[idx].reviewed_at = Some(Utc::now());
        Ok(id)
    }

    async fn reject_draft(
        &self,
        draft_id: i64,
        note: Option<String>,
    ) -> Result<(), PipelineError> {
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        let draft = rows
            .drafts
            .iter_mut()
            .find(|d| d.id == draft_id)
            .ok_or_else(|| PipelineError::Domain(format!("draft {draft_id} not found")))?;
        if draft.status != DraftStatus::Pending {
            return Err(PipelineError::Domain(format!(
                "draft {draft_id} is not pending"
            )));
        }
        draft.status = DraftStatus::Rejected;
        draft.reviewed_at = Some(Utc::now());
        draft.rejection_note = note;
        Ok(())
    }

    async fn published(&self, id: i64) -> Result<Option<Published>, PipelineError> {
        let rows = self.rows.lock().expect("rows mutex poisoned");
        Ok(rows.published.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_published(&self, id: i64) -> Result<(), PipelineError> {
        if self.fail_delete_published.load(Ordering::SeqCst) {
            return Err(PipelineError::Persistence(
                "injected failure deleting published row".into(),
            ));
        }
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        rows.published.retain(|p| p.id != id);
        Ok(())
    }

    async fn append_ledger(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, PipelineError> {
        if self.fail_ledger.load(Ordering::SeqCst) {
            return Err(PipelineError::Persistence(
                "injected ledger write failure".into(),
            ));
        }
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        let id = rows.next_id();
        let row = LedgerEntry {
            id,
            source_id: entry.source_id,
            source_kind: entry.source_kind,
            outcome: entry.outcome,
            error: entry.error,
            tokens_used: entry.tokens_used,
            created_at: Utc::now(),
        };
        rows.ledger.push(row.clone());
        Ok(row)
    }

    async fn success_count_since(&self, since: DateTime<Utc>) -> Result<usize, PipelineError> {
        let rows = self.rows.lock().expect("rows mutex poisoned");
        Ok(rows
            .ledger
            .iter()
            .filter(|e| e.outcome == AttemptOutcome::Success && e.created_at >= since)
            .count())
    }
}
