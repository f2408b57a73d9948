//! Injected LLM completion capability (§1, §4.1 `AI_COMPLETION`).
//!
//! Real third-party APIs are explicitly out of scope; `MockCompletion` is
//! what runs whenever `COMPLETION_API_KEY` is unset (§6), and is what the
//! engine's own test suite runs against.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: u32,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion capability unreachable: {0}")]
    Unreachable(String),
    #[error("missing prompt template")]
    MissingTemplate,
}

#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, CompletionError>;
}

/// Deterministic mock: hashes the fully-interpolated prompt so the same
/// input always yields the same canned response, which keeps engine tests
/// (including hash-stability assertions) reproducible without a network
/// call.
pub struct MockCompletion;

#[async_trait]
impl Completion for MockCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, CompletionError> {
        if req.user_prompt.trim().is_empty() {
            return Err(CompletionError::MissingTemplate);
        }
        let mut hasher = Sha256::new();
        hasher.update(req.user_prompt.as_bytes());
        let digest = hasher.finalize();
        let short_hash = hex_prefix(&digest, 8);
        let tokens_used = (req.user_prompt.split_whitespace().count() as u32).max(1) * 2;
        Ok(CompletionResponse {
            content: format!("[mock-completion:{short_hash}] {}", req.user_prompt),
            model: req.model,
            tokens_used: req.max_tokens.unwrap_or(tokens_used).min(tokens_used),
        })
    }
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

/// Thin HTTP-backed implementation used only when `COMPLETION_API_KEY` is
/// configured; kept minimal since the real API is out of scope (§1).
pub struct HttpCompletion {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpCompletion {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Completion for HttpCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, CompletionError> {
        if req.user_prompt.trim().is_empty() {
            return Err(CompletionError::MissingTemplate);
        }
        let body = serde_json::json!({
            "model": req.model,
            "system": req.system_prompt,
            "prompt": req.user_prompt,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Unreachable(e.to_string()))?;
        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CompletionError::Unreachable(e.to_string()))?;
        Ok(CompletionResponse {
            content: parsed
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            model: req.model,
            tokens_used: parsed
                .get("tokens_used")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_completion_is_deterministic() {
        let mock = MockCompletion;
        let req = || CompletionRequest {
            system_prompt: None,
            user_prompt: "hello world".into(),
            model: "mock-1".into(),
            temperature: None,
            max_tokens: None,
        };
        let a = mock.complete(req()).await.unwrap();
        let b = mock.complete(req()).await.unwrap();
        assert_eq!(a.content, b.content);
    }

    #[tokio::test]
    async fn mock_completion_rejects_empty_prompt() {
        let mock = MockCompletion;
        let result = mock
            .complete(CompletionRequest {
                system_prompt: None,
                user_prompt: "".into(),
                model: "mock-1".into(),
                temperature: None,
                max_tokens: None,
            })
            .await;
        assert!(result.is_err());
    }
}
