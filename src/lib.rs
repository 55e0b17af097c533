// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod generate;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod settings;
pub mod source;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::error::PipelineError;
pub use crate::generate::client::{MockModel, ModelClient, OpenAiClient};
pub use crate::pipeline::{Pipeline, RunSummary};
pub use crate::settings::Settings;
pub use crate::source::{Source, SourceKind, SourcePayload};
pub use crate::store::{MemoryStore, RestStore, Store};
