// src/error.rs
// Error classes the pipeline distinguishes. Fetch/generation failures are
// isolated per source; persistence and domain errors surface to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing required credential or broken settings. Fatal to a run;
    /// nothing is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or HTTP failure against a feed or page.
    #[error("{message}")]
    Fetch { status: Option<u16>, message: String },

    /// Model call failure or an unparsable/incomplete response.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Row-store write/read failure. The draft was never durably saved, so
    /// this propagates to the caller of the operation.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Approval/rejection attempted on a missing draft or one in the wrong
    /// state. Surfaced to the moderation caller verbatim.
    #[error("{0}")]
    Domain(String),
}

impl PipelineError {
    pub fn fetch_status(status: u16) -> Self {
        // A caller-visible message must distinguish "the site refused us"
        // from a generic network problem.
        let message = if matches!(status, 401 | 403 | 429) {
            format!("site blocked the request (HTTP {status})")
        } else {
            format!("request failed with HTTP {status}")
        };
        Self::Fetch {
            status: Some(status),
            message,
        }
    }

    pub fn fetch_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out; retry later".to_string()
        } else {
            format!("network error: {err}")
        };
        Self::Fetch {
            status: None,
            message,
        }
    }

    /// True for errors worth retrying without changing anything (timeouts,
    /// transient network failures) as opposed to content errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { status: None, .. } => true,
            Self::Fetch {
                status: Some(s), ..
            } => matches!(s, 429 | 500..=599),
            _ => false,
        }
    }
}
