// src/ledger.rs
// Generation ledger: one row per attempt, best-effort. A ledger outage is
// observability lost, never a pipeline abort.

use chrono::{DateTime, NaiveTime, Utc};
use metrics::counter;

use crate::source::SourceKind;
use crate::store::{AttemptOutcome, NewLedgerEntry, Store};

/// Append one attempt row. Write failures are logged and swallowed here so
/// they can never mask the pipeline's real effects.
pub async fn record(
    store: &dyn Store,
    source_id: Option<i64>,
    kind: SourceKind,
    outcome: AttemptOutcome,
    error: Option<String>,
    tokens_used: Option<u32>,
) {
    let entry = NewLedgerEntry {
        source_id,
        source_kind: kind,
        outcome,
        error,
        tokens_used,
    };
    match store.append_ledger(entry).await {
        Ok(_) => {
            counter!("ledger_entries_total", "outcome" => outcome.as_str()).increment(1);
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = kind.as_str(), "ledger write failed; continuing");
            counter!("ledger_write_errors_total").increment(1);
        }
    }
}

/// How many drafts may still be generated today. Counts successful attempts
/// ledgered since UTC midnight, so a manual re-trigger on the same day keeps
/// honoring the daily ceiling. Unreadable ledger falls back to the full
/// ceiling; the budget is a guard, not a correctness dependency.
pub async fn remaining_budget(store: &dyn Store, max_per_day: usize) -> usize {
    let midnight = utc_midnight(Utc::now());
    match store.success_count_since(midnight).await {
        Ok(used) => max_per_day.saturating_sub(used),
        Err(e) => {
            tracing::warn!(error = %e, "could not read ledger for budget; assuming full budget");
            max_per_day
        }
    }
}

fn utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
