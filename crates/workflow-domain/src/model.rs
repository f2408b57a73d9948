//! Workflow-domain entities (§3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub version: u32,
    pub definition: WorkflowDefinition,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub metadata: WorkflowMetadata,
    pub nodes: HashMap<String, Node>,
    pub edges: Vec<Edge>,
    pub entrypoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub next: Vec<String>,
}

/// Per-type node configuration, tagged on `type` (§3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    AiCompletion(AiCompletionConfig),
    HttpRequest(HttpRequestConfig),
    Condition(ConditionConfig),
    Transform(TransformConfig),
    Delay(DelayConfig),
    Webhook(WebhookConfig),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::AiCompletion(_) => "AI_COMPLETION",
            NodeKind::HttpRequest(_) => "HTTP_REQUEST",
            NodeKind::Condition(_) => "CONDITION",
            NodeKind::Transform(_) => "TRANSFORM",
            NodeKind::Delay(_) => "DELAY",
            NodeKind::Webhook(_) => "WEBHOOK",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCompletionConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub user_prompt_template: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequestConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub expression: String,
    #[serde(default)]
    pub true_branch: Option<String>,
    #[serde(default)]
    pub false_branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub template: HashMap<String, serde_json::Value>,
}

/// Maximum delay the engine will honor; longer requests are clamped (§8
/// boundary behavior "Delay ≥ 30 000 ms is clamped").
pub const MAX_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    pub delay_ms: u64,
}

impl DelayConfig {
    pub fn clamped_delay_ms(&self) -> u64 {
        self.delay_ms.min(MAX_DELAY_MS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_key: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub run_id: Uuid,
    pub step_key: String,
    pub node_type: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn new_pending(run_id: Uuid, step_key: &str, node_type: &str) -> Self {
        let idempotency_key = platform_core::job::step_idempotency_key(run_id, step_key, 0);
        Self {
            id: Uuid::new_v4(),
            run_id,
            step_key: step_key.to_string(),
            node_type: node_type.to_string(),
            status: StepStatus::Pending,
            input: None,
            output: None,
            error: None,
            retry_count: 0,
            idempotency_key,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    RunStarted,
    StepStarted,
    StepCompleted,
    StepFailed,
    RunCompleted,
    RunFailed,
    RunCancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl platform_core::append_log::Timestamped for Event {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
