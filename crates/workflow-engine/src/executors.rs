//! Node execution contracts (§4.1 table).
//!
//! Each executor is a pure-ish async function from `(config, StepContext)`
//! to `(output, Option<selected_branch>)`. Suspension (network calls) is
//! the worker's concern; `DELAY` never blocks a thread — it reports back
//! that it wants to be re-enqueued after `delayMs` and the caller
//! (`engine::execute_step`) is the one that re-enqueues.

use std::collections::HashMap;

use thiserror::Error;
use workflow_domain::expr::{eval_condition, interpolate, interpolate_value, parse_condition_expr, StepContext};
use workflow_domain::model::{
    AiCompletionConfig, ConditionConfig, DelayConfig, HttpRequestConfig, NodeKind, TransformConfig,
    WebhookConfig,
};

use crate::completion::{Completion, CompletionError, CompletionRequest};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("completion capability error: {0}")]
    Completion(#[from] CompletionError),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("missing template")]
    MissingTemplate,
    #[error("missing url")]
    MissingUrl,
}

pub struct NodeOutcome {
    pub output: serde_json::Value,
    /// Set only for `CONDITION` nodes; selects the sole successor per §4.1
    /// "Edge selection after a step completes".
    pub selected_branch: Option<String>,
}

impl NodeOutcome {
    fn plain(output: serde_json::Value) -> Self {
        Self {
            output,
            selected_branch: None,
        }
    }
}

pub async fn execute_node(
    kind: &NodeKind,
    ctx: &StepContext,
    completion: &dyn Completion,
    http: &reqwest::Client,
) -> Result<NodeOutcome, ExecutorError> {
    match kind {
        NodeKind::AiCompletion(cfg) => execute_ai_completion(cfg, ctx, completion).await,
        NodeKind::HttpRequest(cfg) => execute_http_request(cfg, ctx, http).await,
        NodeKind::Condition(cfg) => Ok(execute_condition(cfg, ctx)),
        NodeKind::Transform(cfg) => Ok(execute_transform(cfg, ctx)),
        NodeKind::Delay(cfg) => Ok(execute_delay(cfg)),
        NodeKind::Webhook(cfg) => execute_webhook(cfg, ctx, http).await,
    }
}

async fn execute_ai_completion(
    cfg: &AiCompletionConfig,
    ctx: &StepContext,
    completion: &dyn Completion,
) -> Result<NodeOutcome, ExecutorError> {
    if cfg.user_prompt_template.trim().is_empty() {
        return Err(ExecutorError::MissingTemplate);
    }
    let user_prompt = interpolate(&cfg.user_prompt_template, ctx);
    let system_prompt = cfg.system_prompt.as_ref().map(|s| interpolate(s, ctx));
    let response = completion
        .complete(CompletionRequest {
            system_prompt,
            user_prompt,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
        .await?;
    Ok(NodeOutcome::plain(serde_json::json!({
        "content": response.content,
        "model": response.model,
        "tokensUsed": response.tokens_used,
    })))
}

async fn execute_http_request(
    cfg: &HttpRequestConfig,
    ctx: &StepContext,
    http: &reqwest::Client,
) -> Result<NodeOutcome, ExecutorError> {
    if cfg.url.trim().is_empty() {
        return Err(ExecutorError::MissingUrl);
    }
    let url = interpolate(&cfg.url, ctx);
    let method = reqwest::Method::from_bytes(cfg.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let mut builder = http.request(method, &url);
    for (k, v) in &cfg.headers {
        builder = builder.header(k, interpolate(v, ctx));
    }
    if let Some(body) = &cfg.body {
        builder = builder.json(&interpolate_value(body, ctx));
    }
    let resp = builder
        .send()
        .await
        .map_err(|e| ExecutorError::Http(e.to_string()))?;
    let status = resp.status().as_u16();
    let headers: HashMap<String, String> = resp
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let text = resp
        .text()
        .await
        .map_err(|e| ExecutorError::Http(e.to_string()))?;
    let body = serde_json::from_str::<serde_json::Value>(&text)
        .unwrap_or(serde_json::Value::String(text));
    // Non-2xx is not an error (§4.1): the node returns the status so a
    // downstream CONDITION can branch on it.
    Ok(NodeOutcome::plain(serde_json::json!({
        "statusCode": status,
        "headers": headers,
        "body": body,
    })))
}

fn execute_condition(cfg: &ConditionConfig, ctx: &StepContext) -> NodeOutcome {
    if cfg.expression.trim().is_empty() {
        return NodeOutcome {
            output: serde_json::json!({"conditionResult": false, "selectedBranch": serde_json::Value::Null}),
            selected_branch: None,
        };
    }
    let result = parse_condition_expr(&cfg.expression)
        .map(|expr| eval_condition(&expr, ctx))
        .unwrap_or(false);
    let selected = if result {
        cfg.true_branch.clone()
    } else {
        cfg.false_branch.clone()
    };
    NodeOutcome {
        output: serde_json::json!({
            "conditionResult": result,
            "selectedBranch": selected,
        }),
        selected_branch: selected,
    }
}

fn execute_transform(cfg: &TransformConfig, ctx: &StepContext) -> NodeOutcome {
    let interpolated: serde_json::Map<String, serde_json::Value> = cfg
        .template
        .iter()
        .map(|(k, v)| (k.clone(), interpolate_value(v, ctx)))
        .collect();
    NodeOutcome::plain(serde_json::Value::Object(interpolated))
}

fn execute_delay(cfg: &DelayConfig) -> NodeOutcome {
    let delay_ms = cfg.clamped_delay_ms();
    NodeOutcome::plain(serde_json::json!({
        "delayed": true,
        "delayMs": delay_ms,
    }))
}

async fn execute_webhook(
    cfg: &WebhookConfig,
    ctx: &StepContext,
    http: &reqwest::Client,
) -> Result<NodeOutcome, ExecutorError> {
    if cfg.webhook_url.trim().is_empty() {
        return Err(ExecutorError::MissingUrl);
    }
    let url = interpolate(&cfg.webhook_url, ctx);
    let resp = http
        .post(&url)
        .send()
        .await
        .map_err(|e| ExecutorError::Http(e.to_string()))?;
    let status = resp.status();
    Ok(NodeOutcome::plain(serde_json::json!({
        "statusCode": status.as_u16(),
        "acknowledged": status.is_success(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MockCompletion;
    use std::collections::HashMap as Map;
    use workflow_domain::expr::StepContext;

    fn ctx() -> StepContext {
        StepContext {
            input: serde_json::json!({"x": 1}),
            steps: Map::new(),
            env: Map::new(),
        }
    }

    #[test]
    fn transform_interpolates_string_leaves() {
        let mut template = Map::new();
        template.insert("greeting".to_string(), serde_json::json!("x={{input.x}}"));
        let outcome = execute_transform(&TransformConfig { template }, &ctx());
        assert_eq!(outcome.output["greeting"], "x=1");
    }

    #[test]
    fn delay_clamps_to_max() {
        let outcome = execute_delay(&DelayConfig { delay_ms: 999_999 });
        assert_eq!(outcome.output["delayMs"], 30_000);
    }

    #[test]
    fn condition_selects_true_branch() {
        let cfg = ConditionConfig {
            expression: "input.x > 0".into(),
            true_branch: Some("hi".into()),
            false_branch: Some("lo".into()),
        };
        let outcome = execute_condition(&cfg, &ctx());
        assert_eq!(outcome.selected_branch.as_deref(), Some("hi"));
        assert_eq!(outcome.output["conditionResult"], true);
    }

    #[tokio::test]
    async fn ai_completion_uses_mock_and_interpolates() {
        let cfg = AiCompletionConfig {
            system_prompt: None,
            user_prompt_template: "value is {{input.x}}".into(),
            model: "mock-1".into(),
            temperature: None,
            max_tokens: None,
        };
        let outcome = execute_ai_completion(&cfg, &ctx(), &MockCompletion)
            .await
            .unwrap();
        assert!(outcome.output["content"]
            .as_str()
            .unwrap()
            .contains("value is 1"));
    }
}
