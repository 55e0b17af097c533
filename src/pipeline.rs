// src/pipeline.rs
// Run orchestration. A run is sequential over its work items: the budget
// counter and the dedup snapshot must stay read-consistent, and no source's
// failure may spill over into its siblings.

use chrono::{Datelike, Utc, Weekday};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::dedup;
use crate::error::PipelineError;
use crate::fetch::feed::FeedFetcher;
use crate::fetch::page::PageFetcher;
use crate::generate::client::ModelClient;
use crate::generate::{Generator, Material};
use crate::ledger;
use crate::settings::Settings;
use crate::source::{select_work, Source, SourceKind, SourcePayload};
use crate::store::{AttemptOutcome, Draft, NewDraft, Provenance, Store};

#[derive(Debug, Serialize)]
pub struct SourceOutcome {
    pub source_id: i64,
    pub name: String,
    pub kind: SourceKind,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub generated: usize,
    pub outcomes: Vec<SourceOutcome>,
}

pub struct Pipeline {
    store: Arc<dyn Store>,
    generator: Generator,
    feeds: FeedFetcher,
    pages: PageFetcher,
    settings: Settings,
}

impl Pipeline {
    pub fn new(store: Arc<dyn Store>, model: Arc<dyn ModelClient>, settings: Settings) -> Self {
        let timeout = std::time::Duration::from_secs(settings.model.timeout_secs);
        Self {
            store,
            generator: Generator::new(model, settings.model.max_tokens),
            feeds: FeedFetcher::new(timeout),
            pages: PageFetcher::new(timeout),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// One scheduled run: select work, then fetch → dedup → generate →
    /// persist → ledger for each source, isolating per-source failures.
    /// Theme scheduling is evaluated against the invoker's calendar.
    pub async fn run_once(&self) -> Result<RunSummary, PipelineError> {
        self.run_for_day(Utc::now().weekday()).await
    }

    /// Same run with the weekday pinned; lets callers and tests control
    /// which themes are due.
    pub async fn run_for_day(&self, today: Weekday) -> Result<RunSummary, PipelineError> {
        crate::metrics::describe_series();

        // Missing credential is fatal to the whole run; nothing is attempted.
        if !self.generator.model().is_configured() {
            return Err(PipelineError::Config(
                "model API key is not configured".into(),
            ));
        }

        let sources = self.store.active_sources().await?;
        let budget =
            ledger::remaining_budget(&*self.store, self.settings.max_articles_per_day).await;
        let work = select_work(&sources, today, &mut rand::rng());

        // Dedup snapshot: computed once, before any generation starts.
        let seen = dedup::live_feed_links(&*self.store).await?;

        let mut summary = RunSummary {
            generated: 0,
            outcomes: Vec::with_capacity(work.len()),
        };

        for source in &work {
            // The ceiling counts drafts actually inserted; a failed or
            // skipped attempt frees its slot for the next candidate.
            if summary.generated >= budget {
                break;
            }
            let started = Instant::now();
            let result = self.process_source(source, &seen).await;
            histogram!("generation_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

            let (outcome, detail, draft_id) = match result {
                Ok(Some(draft)) => {
                    summary.generated += 1;
                    (AttemptOutcome::Success, None, Some(draft.id))
                }
                Ok(None) => (
                    AttemptOutcome::Skipped,
                    Some("no new content".to_string()),
                    None,
                ),
                Err(e) => {
                    tracing::warn!(
                        source = source.name.as_str(),
                        error = %e,
                        "source attempt failed; run continues"
                    );
                    (AttemptOutcome::Failed, Some(e.to_string()), None)
                }
            };

            counter!("pipeline_attempts_total", "outcome" => outcome.as_str()).increment(1);
            ledger::record(
                &*self.store,
                Some(source.id),
                source.payload.kind(),
                outcome,
                detail.clone(),
                None,
            )
            .await;

            summary.outcomes.push(SourceOutcome {
                source_id: source.id,
                name: source.name.clone(),
                kind: source.payload.kind(),
                outcome,
                detail,
                draft_id,
            });
        }

        counter!("pipeline_runs_total").increment(1);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            generated = summary.generated,
            attempted = summary.outcomes.len(),
            "pipeline run finished"
        );
        Ok(summary)
    }

    /// `Ok(None)` means the source had nothing new this run (skipped).
    async fn process_source(
        &self,
        source: &Source,
        seen: &HashSet<String>,
    ) -> Result<Option<Draft>, PipelineError> {
        match &source.payload {
            SourcePayload::Feed { feed_url } => {
                let items = self.feeds.fetch(feed_url).await?;
                // Stamp last-fetch even if nothing new turns up.
                let _ = self.store.mark_source_fetched(source.id, Utc::now()).await;

                let Some(item) = dedup::first_unseen(&items, seen) else {
                    return Ok(None);
                };
                let content = self
                    .generator
                    .generate(&Material::FeedItem(item), &source.default_tag)
                    .await?;
                let draft = self
                    .store
                    .insert_draft(NewDraft {
                        content: content.into(),
                        provenance: Provenance {
                            source_kind: SourceKind::Feed,
                            source_id: Some(source.id),
                            origin_title: Some(item.title.clone()),
                            origin_url: item.link.clone(),
                        },
                    })
                    .await?;
                Ok(Some(draft))
            }
            SourcePayload::Theme {
                theme_description, ..
            } => {
                let content = self
                    .generator
                    .generate(
                        &Material::Theme {
                            description: theme_description,
                        },
                        &source.default_tag,
                    )
                    .await?;
                let draft = self
                    .store
                    .insert_draft(NewDraft {
                        content: content.into(),
                        provenance: Provenance {
                            source_kind: SourceKind::Theme,
                            source_id: Some(source.id),
                            origin_title: None,
                            origin_url: None,
                        },
                    })
                    .await?;
                Ok(Some(draft))
            }
            SourcePayload::Topic { topic_prompt } => {
                let content = self
                    .generator
                    .generate(
                        &Material::Topic {
                            prompt: topic_prompt,
                        },
                        &source.default_tag,
                    )
                    .await?;
                let draft = self
                    .store
                    .insert_draft(NewDraft {
                        content: content.into(),
                        provenance: Provenance {
                            source_kind: SourceKind::Topic,
                            source_id: Some(source.id),
                            origin_title: None,
                            origin_url: None,
                        },
                    })
                    .await?;
                Ok(Some(draft))
            }
        }
    }

    /// Ad-hoc single-request path: fetch one page, generate one draft. No
    /// shared run state; timeouts on both the page fetch and the model call
    /// are bounded by the fetcher/client configuration.
    pub async fn generate_from_url(
        &self,
        url: &str,
        tag: Option<&str>,
    ) -> Result<Draft, PipelineError> {
        crate::metrics::describe_series();
        if !self.generator.model().is_configured() {
            return Err(PipelineError::Config(
                "model API key is not configured".into(),
            ));
        }

        let tag = tag
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.settings.default_tag);

        let attempt = async {
            let page = self.pages.fetch(url).await?;
            let content = self.generator.generate(&Material::Page(&page), tag).await?;
            self.store
                .insert_draft(NewDraft {
                    content: content.into(),
                    provenance: Provenance {
                        source_kind: SourceKind::Url,
                        source_id: None,
                        origin_title: Some(page.title.clone()),
                        origin_url: Some(page.url.clone()),
                    },
                })
                .await
        };

        match attempt.await {
            Ok(draft) => {
                ledger::record(
                    &*self.store,
                    None,
                    SourceKind::Url,
                    AttemptOutcome::Success,
                    None,
                    None,
                )
                .await;
                Ok(draft)
            }
            Err(e) => {
                ledger::record(
                    &*self.store,
                    None,
                    SourceKind::Url,
                    AttemptOutcome::Failed,
                    Some(e.to_string()),
                    None,
                )
                .await;
                Err(e)
            }
        }
    }
}
