// src/store/rest.rs
// Production store: a PostgREST-style row API. Plain filtered reads and
// writes for the four collections, plus two RPCs (`promote_draft`,
// `reject_draft`) so the moderation transitions run inside the engine's
// transaction instead of as two independent writes from here.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use super::{
    ArticleContent, Draft, DraftStatus, LedgerEntry, NewDraft, NewLedgerEntry, Provenance,
    Published, Store,
};
use crate::error::PipelineError;
use crate::source::Source;

const ENV_URL: &str = "NEWSFORGE_ROWSTORE_URL";
const ENV_KEY: &str = "NEWSFORGE_ROWSTORE_KEY";

pub struct RestStore {
    http: reqwest::Client,
    base: String,
    key: String,
}

#[derive(Serialize)]
struct DraftInsert<'a> {
    #[serde(flatten)]
    content: &'a ArticleContent,
    #[serde(flatten)]
    provenance: &'a Provenance,
    status: DraftStatus,
    generated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct OriginRow {
    origin_url: Option<String>,
}

#[derive(Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: i64,
}

#[derive(Deserialize)]
struct RpcError {
    message: Option<String>,
}

impl RestStore {
    pub fn new(base: String, key: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("newsforge/0.1 (+https://github.com/newsforge)")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            key,
        }
    }

    /// Build from NEWSFORGE_ROWSTORE_URL / NEWSFORGE_ROWSTORE_KEY, if both
    /// are present.
    pub fn from_env() -> Option<Self> {
        let base = std::env::var(ENV_URL).ok()?;
        let key = std::env::var(ENV_KEY).ok()?;
        if base.trim().is_empty() || key.trim().is_empty() {
            return None;
        }
        Some(Self::new(base, key))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base, path)
    }

    /// Timestamp filters must use the `Z` suffix form: a `+00:00` offset
    /// would decode as a space inside the query string and corrupt the
    /// literal on the server side.
    fn ledger_since_path(since: DateTime<Utc>) -> String {
        format!(
            "ledger?select=id&outcome=eq.success&created_at=gte.{}",
            since.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.key).bearer_auth(&self.key)
    }

    async fn read_rows<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, PipelineError> {
        let resp = self
            .authed(self.http.get(self.url(path)))
            .send()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store unreachable: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Persistence(format!(
                "row store read {path} failed with {status}: {body}"
            )));
        }
        resp.json::<Vec<T>>()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store response unreadable: {e}")))
    }

    async fn write_rows<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<T>, PipelineError> {
        let resp = self
            .authed(self.http.post(self.url(path)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store unreachable: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Persistence(format!(
                "row store write {path} failed with {status}: {body}"
            )));
        }
        resp.json::<Vec<T>>()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store response unreadable: {e}")))
    }

    /// Call a stored procedure. A 4xx with a message is a domain error raised
    /// by the procedure itself; everything else is a persistence failure.
    async fn rpc<B: Serialize>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<serde_json::Value, PipelineError> {
        let resp = self
            .authed(self.http.post(self.url(&format!("rpc/{name}"))))
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store unreachable: {e}")))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            let message = serde_json::from_str::<RpcError>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(text);
            return Err(PipelineError::Domain(message));
        }
        if !status.is_success() {
            return Err(PipelineError::Persistence(format!(
                "rpc {name} failed with {status}: {text}"
            )));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| PipelineError::Persistence(format!("rpc {name} response unreadable: {e}")))
    }
}

#[async_trait]
impl Store for RestStore {
    async fn active_sources(&self) -> Result<Vec<Source>, PipelineError> {
        self.read_rows("sources?active=eq.true&order=id.asc").await
    }

    async fn mark_source_fetched(
        &self,
        source_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let resp = self
            .authed(
                self.http
                    .patch(self.url(&format!("sources?id=eq.{source_id}"))),
            )
            .json(&serde_json::json!({ "last_fetched_at": at }))
            .send()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::Persistence(format!(
                "stamping source {source_id} failed with {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn feed_origin_links(&self) -> Result<HashSet<String>, PipelineError> {
        // Two-table union; a link that left the queue via approval is still
        // a seen link.
        let drafts: Vec<OriginRow> = self
            .read_rows("drafts?select=origin_url&source_kind=eq.feed")
            .await?;
        let published: Vec<OriginRow> = self
            .read_rows("published?select=origin_url&source_kind=eq.feed")
            .await?;
        Ok(drafts
            .into_iter()
            .chain(published)
            .filter_map(|r| r.origin_url)
            .collect())
    }

    async fn insert_draft(&self, draft: NewDraft) -> Result<Draft, PipelineError> {
        let body = DraftInsert {
            content: &draft.content,
            provenance: &draft.provenance,
            status: DraftStatus::Pending,
            generated_at: Utc::now(),
        };
        let mut rows: Vec<Draft> = self.write_rows("drafts", &body).await?;
        rows.pop()
            .ok_or_else(|| PipelineError::Persistence("insert returned no row".into()))
    }

    async fn draft(&self, id: i64) -> Result<Option<Draft>, PipelineError> {
        let mut rows: Vec<Draft> = self.read_rows(&format!("drafts?id=eq.{id}")).await?;
        Ok(rows.pop())
    }

    async fn pending_drafts(&self, limit: usize) -> Result<Vec<Draft>, PipelineError> {
        self.read_rows(&format!(
            "drafts?status=eq.pending&order=generated_at.desc&limit={limit}"
        ))
        .await
    }

    async fn promote_draft(&self, draft_id: i64) -> Result<i64, PipelineError> {
        let v = self
            .rpc("promote_draft", &serde_json::json!({ "p_draft_id": draft_id }))
            .await?;
        v.as_i64().ok_or_else(|| {
            PipelineError::Persistence(format!("promote_draft returned non-id payload: {v}"))
        })
    }

    async fn reject_draft(
        &self,
        draft_id: i64,
        note: Option<String>,
    ) -> Result<(), PipelineError> {
        self.rpc(
            "reject_draft",
            &serde_json::json!({ "p_draft_id": draft_id, "p_note": note }),
        )
        .await?;
        Ok(())
    }

    async fn published(&self, id: i64) -> Result<Option<Published>, PipelineError> {
        let mut rows: Vec<Published> = self.read_rows(&format!("published?id=eq.{id}")).await?;
        Ok(rows.pop())
    }

    async fn delete_published(&self, id: i64) -> Result<(), PipelineError> {
        let resp = self
            .authed(self.http.delete(self.url(&format!("published?id=eq.{id}"))))
            .send()
            .await
            .map_err(|e| PipelineError::Persistence(format!("row store unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(PipelineError::Persistence(format!(
                "deleting published {id} failed with {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn append_ledger(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, PipelineError> {
        let mut rows: Vec<LedgerEntry> = self.write_rows("ledger", &entry).await?;
        rows.pop()
            .ok_or_else(|| PipelineError::Persistence("ledger insert returned no row".into()))
    }

    async fn success_count_since(&self, since: DateTime<Utc>) -> Result<usize, PipelineError> {
        let rows: Vec<IdRow> = self.read_rows(&Self::ledger_since_path(since)).await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ledger_filter_uses_query_safe_timestamps() {
        let since = Utc.with_ymd_and_hms(2026, 8, 27, 0, 0, 0).unwrap();
        let path = RestStore::ledger_since_path(since);
        assert_eq!(
            path,
            "ledger?select=id&outcome=eq.success&created_at=gte.2026-08-27T00:00:00Z"
        );
        assert!(!path.contains('+'));
    }
}
