// tests/pipeline_run.rs
// End-to-end runs over the in-memory store with a deterministic model.
// Feed fixtures are served from a local socket so the fetcher's real HTTP
// path is exercised without leaving the host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Utc, Weekday};
use shuttle_axum::axum::{routing::get, Router};

use newsforge::error::PipelineError;
use newsforge::generate::client::ModelClient;
use newsforge::pipeline::Pipeline;
use newsforge::settings::Settings;
use newsforge::source::{Source, SourceKind, SourcePayload};
use newsforge::store::{
    ArticleContent, AttemptOutcome, Draft, DraftStatus, MemoryStore, NewLedgerEntry, Provenance,
    Published, Store,
};
use newsforge::{MockModel, OpenAiClient};

const RSS: &str = include_str!("fixtures/sample_rss.xml");

const MODEL_OK: &str = r###"Here is the article you asked for:
{"title": "Generated Headline", "slug": "generated-headline", "excerpt": "Short teaser.",
 "body": "## What happened\nFull article text.", "tag": "local",
 "seo_title": "Generated Headline", "seo_description": "Teaser.", "seo_keywords": ["local", "news"]}
Let me know if you need edits."###;

/// Serve a fixture body over a local socket; returns the URL to fetch.
async fn serve_fixture(body: &'static str) -> String {
    let app = Router::new().route("/feed.xml", get(move || async move { body }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        shuttle_axum::axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/feed.xml")
}

/// Counts completions so tests can assert how often generation ran.
struct CountingModel {
    inner: MockModel,
    calls: AtomicUsize,
}

impl CountingModel {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            inner: MockModel::returning(MODEL_OK),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ModelClient for CountingModel {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(prompt, max_tokens).await
    }
    fn provider_name(&self) -> &'static str {
        "counting-mock"
    }
}

fn feed_source(id: i64, url: &str) -> Source {
    Source {
        id,
        name: format!("feed-{id}"),
        payload: SourcePayload::Feed {
            feed_url: url.to_string(),
        },
        default_tag: "news".into(),
        active: true,
        last_fetched_at: None,
    }
}

fn theme_source(id: i64, day: &str) -> Source {
    Source {
        id,
        name: format!("theme-{id}"),
        payload: SourcePayload::Theme {
            theme_day: day.into(),
            theme_description: "weekly culture roundup".into(),
        },
        default_tag: "culture".into(),
        active: true,
        last_fetched_at: None,
    }
}

fn content(slug: &str) -> ArticleContent {
    ArticleContent {
        title: slug.to_string(),
        slug: slug.to_string(),
        excerpt: "e".into(),
        body: "b".into(),
        tag: "news".into(),
        seo_title: "t".into(),
        seo_description: "d".into(),
        seo_keywords: vec![],
    }
}

fn feed_provenance(url: &str) -> Provenance {
    Provenance {
        source_kind: SourceKind::Feed,
        source_id: Some(1),
        origin_title: Some("seen before".into()),
        origin_url: Some(url.to_string()),
    }
}

fn pipeline(store: Arc<MemoryStore>, model: Arc<dyn ModelClient>) -> Pipeline {
    Pipeline::new(store, model, Settings::default())
}

fn pipeline_with_ceiling(
    store: Arc<MemoryStore>,
    model: Arc<dyn ModelClient>,
    ceiling: usize,
) -> Pipeline {
    let mut settings = Settings::default();
    settings.max_articles_per_day = ceiling;
    Pipeline::new(store, model, settings)
}

#[tokio::test]
async fn feed_source_produces_one_draft_and_one_ledger_row() {
    let url = serve_fixture(RSS).await;
    let store = Arc::new(MemoryStore::new());
    store.seed_source(feed_source(1, &url));

    let model = CountingModel::ok();
    let p = pipeline(store.clone(), model.clone());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    assert_eq!(summary.generated, 1);
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.outcomes[0].outcome, AttemptOutcome::Success);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);

    let drafts = store.drafts_snapshot();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, DraftStatus::Pending);
    assert_eq!(drafts[0].provenance.source_kind, SourceKind::Feed);
    assert_eq!(
        drafts[0].provenance.origin_url.as_deref(),
        Some("https://news.example.com/transit-expansion")
    );

    let ledger = store.ledger_snapshot();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].outcome, AttemptOutcome::Success);
    assert_eq!(ledger[0].source_id, Some(1));

    // Successful retrieval stamps the source.
    let sources = store.active_sources().await.unwrap();
    assert!(sources[0].last_fetched_at.is_some());
}

#[tokio::test]
async fn dedup_set_spans_both_drafts_and_published() {
    let url = serve_fixture(RSS).await;
    let store = Arc::new(MemoryStore::new());
    store.seed_source(feed_source(1, &url));

    // First fixture item already sits in the queue; second was approved and
    // now lives only in the published table.
    store.seed_draft(Draft {
        id: 100,
        content: content("transit"),
        provenance: feed_provenance("https://news.example.com/transit-expansion"),
        status: DraftStatus::Pending,
        rejection_note: None,
        generated_at: Utc::now(),
        reviewed_at: None,
    });
    store.seed_published(Published {
        id: 101,
        content: content("startup"),
        provenance: feed_provenance("https://news.example.com/startup-series-b"),
        published_at: Utc::now(),
    });

    let model = CountingModel::ok();
    let p = pipeline(store.clone(), model.clone());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    // Exactly one generation, for the one remaining item.
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(summary.generated, 1);
    let drafts = store.drafts_snapshot();
    let new = drafts.iter().find(|d| d.id != 100).unwrap();
    assert_eq!(
        new.provenance.origin_url.as_deref(),
        Some("https://news.example.com/museum-reopens")
    );
    assert_eq!(store.ledger_snapshot().len(), 1);
}

#[tokio::test]
async fn exhausted_feed_is_skipped_not_failed() {
    let url = serve_fixture(RSS).await;
    let store = Arc::new(MemoryStore::new());
    store.seed_source(feed_source(1, &url));
    for link in [
        "https://news.example.com/transit-expansion",
        "https://news.example.com/startup-series-b",
        "https://news.example.com/museum-reopens",
    ] {
        store.seed_published(Published {
            id: 200 + link.len() as i64,
            content: content(link),
            provenance: feed_provenance(link),
            published_at: Utc::now(),
        });
    }

    let model = CountingModel::ok();
    let p = pipeline(store.clone(), model.clone());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.outcomes[0].outcome, AttemptOutcome::Skipped);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    let ledger = store.ledger_snapshot();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].outcome, AttemptOutcome::Skipped);
}

#[tokio::test]
async fn off_day_theme_contributes_no_work_and_no_ledger_rows() {
    let store = Arc::new(MemoryStore::new());
    store.seed_source(theme_source(1, "friday"));

    let p = pipeline(store.clone(), CountingModel::ok());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    assert_eq!(summary.generated, 0);
    assert!(summary.outcomes.is_empty());
    assert!(store.ledger_snapshot().is_empty());
}

#[tokio::test]
async fn on_day_theme_generates_with_source_default_tag_available() {
    let store = Arc::new(MemoryStore::new());
    store.seed_source(theme_source(1, "friday"));

    let p = pipeline(store.clone(), CountingModel::ok());
    let summary = p.run_for_day(Weekday::Fri).await.unwrap();

    assert_eq!(summary.generated, 1);
    let drafts = store.drafts_snapshot();
    assert_eq!(drafts[0].provenance.source_kind, SourceKind::Theme);
    assert_eq!(drafts[0].provenance.source_id, Some(1));
}

#[tokio::test]
async fn run_never_exceeds_daily_ceiling() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=5 {
        store.seed_source(theme_source(id, "monday"));
    }

    let p = pipeline(store.clone(), CountingModel::ok());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    // Default ceiling is 3.
    assert_eq!(summary.generated, 3);
    assert_eq!(summary.outcomes.len(), 3);
    assert_eq!(store.drafts_snapshot().len(), 3);
}

#[tokio::test]
async fn failed_feed_does_not_consume_a_budget_slot() {
    // Nothing listens on this port, so the feed attempt fails fast.
    let store = Arc::new(MemoryStore::new());
    store.seed_source(feed_source(1, "http://127.0.0.1:9/feed.xml"));
    for id in 2..=4 {
        store.seed_source(theme_source(id, "monday"));
    }

    let p = pipeline(store.clone(), CountingModel::ok());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    // All three due themes still run after the failed feed.
    assert_eq!(summary.generated, 3);
    assert_eq!(summary.outcomes.len(), 4);
    assert_eq!(summary.outcomes[0].outcome, AttemptOutcome::Failed);
    assert!(summary.outcomes[1..]
        .iter()
        .all(|o| o.outcome == AttemptOutcome::Success));
    assert_eq!(store.ledger_snapshot().len(), 4);
}

#[tokio::test]
async fn zero_ceiling_attempts_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.seed_source(theme_source(1, "monday"));

    let model = CountingModel::ok();
    let p = pipeline_with_ceiling(store.clone(), model.clone(), 0);
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    assert_eq!(summary.generated, 0);
    assert!(summary.outcomes.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert!(store.ledger_snapshot().is_empty());
}

#[tokio::test]
async fn budget_counts_successes_already_ledgered_today() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=5 {
        store.seed_source(theme_source(id, "monday"));
    }
    for _ in 0..2 {
        store
            .append_ledger(NewLedgerEntry {
                source_id: None,
                source_kind: SourceKind::Topic,
                outcome: AttemptOutcome::Success,
                error: None,
                tokens_used: None,
            })
            .await
            .unwrap();
    }

    let p = pipeline(store.clone(), CountingModel::ok());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    // 3 per day, 2 already used.
    assert_eq!(summary.generated, 1);
}

#[tokio::test]
async fn one_failing_source_does_not_abort_its_siblings() {
    let store = Arc::new(MemoryStore::new());
    store.seed_source(theme_source(1, "monday"));
    store.seed_source(theme_source(2, "monday"));

    let model = Arc::new(MockModel::failing("model quota exceeded"));
    let p = pipeline(store.clone(), model);
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    assert_eq!(summary.generated, 0);
    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.outcome == AttemptOutcome::Failed));
    let ledger = store.ledger_snapshot();
    assert_eq!(ledger.len(), 2);
    assert!(ledger[0]
        .error
        .as_deref()
        .unwrap()
        .contains("model quota exceeded"));
}

#[tokio::test]
async fn ledger_outage_is_swallowed() {
    let store = Arc::new(MemoryStore::new());
    store.seed_source(theme_source(1, "monday"));
    store.fail_ledger_writes(true);

    let p = pipeline(store.clone(), CountingModel::ok());
    let summary = p.run_for_day(Weekday::Mon).await.unwrap();

    // The draft landed; only the audit row is missing.
    assert_eq!(summary.generated, 1);
    assert_eq!(store.drafts_snapshot().len(), 1);
    assert!(store.ledger_snapshot().is_empty());
}

#[tokio::test]
async fn missing_model_credential_fails_the_run_before_any_attempt() {
    let store = Arc::new(MemoryStore::new());
    store.seed_source(theme_source(1, "monday"));

    let unconfigured = Arc::new(OpenAiClient::new(
        String::new(),
        "gpt-4o-mini".into(),
        std::time::Duration::from_secs(5),
    ));
    let p = pipeline(store.clone(), unconfigured);
    let err = p.run_for_day(Weekday::Mon).await.unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert!(store.drafts_snapshot().is_empty());
    assert!(store.ledger_snapshot().is_empty());
}

#[tokio::test]
async fn blocked_page_fetch_maps_to_a_distinct_message() {
    // A 403 from the target site must not read like a network failure.
    let app = Router::new().route(
        "/article",
        get(|| async {
            (
                shuttle_axum::axum::http::StatusCode::FORBIDDEN,
                "go away",
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        shuttle_axum::axum::serve(listener, app).await.unwrap();
    });

    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone(), CountingModel::ok());
    let err = p
        .generate_from_url(&format!("http://{addr}/article"), None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("blocked"));
    // The failed ad-hoc attempt is still ledgered.
    let ledger = store.ledger_snapshot();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].outcome, AttemptOutcome::Failed);
    assert_eq!(ledger[0].source_kind, SourceKind::Url);
}

#[tokio::test]
async fn adhoc_url_generation_creates_a_pending_draft() {
    let html: &str = "<html><head><title>Big Story</title></head>\
         <body><article><p>Something happened downtown.</p></article></body></html>";
    let app = Router::new().route("/article", get(move || async move { shuttle_axum::axum::response::Html(html) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        shuttle_axum::axum::serve(listener, app).await.unwrap();
    });

    let store = Arc::new(MemoryStore::new());
    let p = pipeline(store.clone(), CountingModel::ok());
    let draft = p
        .generate_from_url(&format!("http://{addr}/article"), Some("metro"))
        .await
        .unwrap();

    assert_eq!(draft.status, DraftStatus::Pending);
    assert_eq!(draft.provenance.source_kind, SourceKind::Url);
    assert_eq!(draft.provenance.origin_title.as_deref(), Some("Big Story"));
    let ledger = store.ledger_snapshot();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].outcome, AttemptOutcome::Success);
}
