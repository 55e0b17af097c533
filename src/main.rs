//! Newsforge binary entrypoint.
//! Boots the Axum HTTP server, wiring the pipeline, store, and model client.
//!
//! The scheduled trigger is an external daily cron hitting POST /run/scheduled.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsforge::api::{create_router, AppState};
use newsforge::generate::client::{ModelClient, OpenAiClient};
use newsforge::metrics::Metrics;
use newsforge::pipeline::Pipeline;
use newsforge::settings::Settings;
use newsforge::store::{MemoryStore, RestStore, Store};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - NEWSFORGE_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("NEWSFORGE_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsforge=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let settings = Settings::load().expect("Failed to load settings");

    // Row store: REST when credentials are present, in-memory otherwise
    // (local development only; drafts vanish on restart).
    let store: Arc<dyn Store> = match RestStore::from_env() {
        Some(rest) => Arc::new(rest),
        None => {
            tracing::warn!("row store credentials missing; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let model: Arc<dyn ModelClient> = Arc::new(OpenAiClient::new(
        settings.model.api_key.clone(),
        settings.model.model.clone(),
        std::time::Duration::from_secs(settings.model.timeout_secs),
    ));

    let prometheus = Metrics::init(settings.max_articles_per_day);

    let state = AppState {
        run_secret: settings.run_secret.clone(),
        pipeline: Arc::new(Pipeline::new(store, model, settings)),
    };
    let router = create_router(state).merge(prometheus.router());

    Ok(router.into())
}
