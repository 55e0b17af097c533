// src/generate/client.rs
// Model client abstraction: a single-turn completion call. The OpenAI
// provider is the production path; the mock keeps tests hermetic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PipelineError;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single-turn request carrying a prompt and a response-size ceiling.
    /// Returns the raw response text; structure extraction happens upstream.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, PipelineError>;

    fn provider_name(&self) -> &'static str;

    /// False when the required credential is missing; a run fails fast with
    /// a configuration error instead of attempting sources.
    fn is_configured(&self) -> bool {
        true
    }
}

/// OpenAI Chat Completions provider. Requires an API key.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("newsforge/0.1 (+https://github.com/newsforge)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}
#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}
#[derive(Deserialize)]
struct ErrBody {
    error: Option<ErrDetail>,
}
#[derive(Deserialize)]
struct ErrDetail {
    message: String,
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, PipelineError> {
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Generation("model request timed out; retry later".into())
                } else {
                    PipelineError::Generation(format!("model request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            // Surface the upstream error text when the endpoint provides one.
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(PipelineError::Generation(format!(
                "model endpoint returned {status}: {detail}"
            )));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| PipelineError::Generation(format!("model response unreadable: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(PipelineError::Generation("model returned empty text".into()));
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Deterministic client for tests and local runs: always returns the fixed
/// response, optionally failing instead.
#[derive(Clone, Default)]
pub struct MockModel {
    pub response: String,
    pub fail_with: Option<String>,
}

impl MockModel {
    pub fn returning(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_with: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, PipelineError> {
        if let Some(msg) = &self.fail_with {
            return Err(PipelineError::Generation(msg.clone()));
        }
        Ok(self.response.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
