//! Step worker (§4.2): drains the step queue, enforces the idempotency
//! gate, and dispatches into the engine. Configurable concurrency and a
//! process-wide token bucket smooth burst load on downstream services.

use std::sync::Arc;

use platform_core::job::JobStore;
use platform_core::ratelimit::TokenBucket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use workflow_domain::model::{RunStatus, StepStatus};

use crate::engine::{Engine, StepJobPayload, STEP_QUEUE};
use crate::repository::{RunRepository, StepRepository};

/// Default per-process worker concurrency (§4.2, §5).
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Default token-bucket rate, steps/s/process (§4.2).
pub const DEFAULT_RATE_PER_SEC: u32 = 50;

pub struct StepWorker {
    job_store: Arc<dyn JobStore>,
    engine: Arc<Engine>,
    runs: Arc<dyn RunRepository>,
    steps: Arc<dyn StepRepository>,
    concurrency: usize,
    limiter: Arc<TokenBucket>,
}

impl StepWorker {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        engine: Arc<Engine>,
        runs: Arc<dyn RunRepository>,
        steps: Arc<dyn StepRepository>,
    ) -> Self {
        Self {
            job_store,
            engine,
            runs,
            steps,
            concurrency: DEFAULT_CONCURRENCY,
            limiter: Arc::new(TokenBucket::per_second(DEFAULT_RATE_PER_SEC)),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs `concurrency` draining loops until `shutdown` fires, then lets
    /// in-flight jobs finish (the bounded drain window is enforced by the
    /// caller wrapping this in a `tokio::time::timeout`, per §5).
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_idx in 0..self.concurrency {
            let job_store = self.job_store.clone();
            let engine = self.engine.clone();
            let runs = self.runs.clone();
            let steps = self.steps.clone();
            let limiter = self.limiter.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                drain_loop(worker_idx, job_store, engine, runs, steps, limiter, shutdown).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn drain_loop(
    worker_idx: usize,
    job_store: Arc<dyn JobStore>,
    engine: Arc<Engine>,
    runs: Arc<dyn RunRepository>,
    steps: Arc<dyn StepRepository>,
    limiter: Arc<TokenBucket>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        let job = tokio::select! {
            job = job_store.dequeue(STEP_QUEUE) => job,
            _ = shutdown.cancelled() => return,
        };
        let job = match job {
            Ok(job) => job,
            Err(err) => {
                error!(worker_idx, %err, "step worker failed to dequeue");
                continue;
            }
        };

        let payload: StepJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                error!(worker_idx, job_id = %job.id, %err, "malformed step job payload, dropping");
                continue;
            }
        };

        if !idempotency_gate(runs.as_ref(), steps.as_ref(), payload.run_id, &payload.step_key).await
        {
            debug!(
                worker_idx,
                run_id = %payload.run_id,
                step_key = %payload.step_key,
                "idempotency gate dropped job"
            );
            let _ = job_store.ack(&job).await;
            continue;
        }

        limiter.acquire().await;

        if let Err(err) = engine.execute_step(payload.run_id, &payload.step_key).await {
            warn!(
                worker_idx,
                run_id = %payload.run_id,
                step_key = %payload.step_key,
                %err,
                "step execution returned an error"
            );
        }
        let _ = job_store.ack(&job).await;
    }
}

/// §4.2 "Idempotency gate": drop the job if the step is already terminal
/// (COMPLETED/SKIPPED) or if the run itself is no longer live
/// (CANCELLED/FAILED). Returns `true` when the caller should proceed.
async fn idempotency_gate(
    runs: &dyn RunRepository,
    steps: &dyn StepRepository,
    run_id: uuid::Uuid,
    step_key: &str,
) -> bool {
    let run = match runs.get_by_id(run_id).await {
        Ok(run) => run,
        Err(_) => return false,
    };
    if matches!(run.status, RunStatus::Cancelled | RunStatus::Failed) {
        return false;
    }
    match steps.get(run_id, step_key).await {
        Ok(step) => !matches!(step.status, StepStatus::Completed | StepStatus::Skipped),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::in_memory::{InMemoryRunRepository, InMemoryStepRepository};
    use chrono::Utc;
    use uuid::Uuid;
    use workflow_domain::model::{Run, Step};

    fn sample_run(id: Uuid, status: RunStatus) -> Run {
        Run {
            id,
            tenant_id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            status,
            input: serde_json::json!({}),
            output: None,
            error: None,
            current_step_key: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn gate_drops_when_run_is_cancelled() {
        let runs = InMemoryRunRepository::new();
        let steps = InMemoryStepRepository::new();
        let run_id = Uuid::new_v4();
        runs.create(sample_run(run_id, RunStatus::Cancelled))
            .await
            .unwrap();
        steps
            .create_many(vec![Step::new_pending(run_id, "a", "TRANSFORM")])
            .await
            .unwrap();
        assert!(!idempotency_gate(&runs, &steps, run_id, "a").await);
    }

    #[tokio::test]
    async fn gate_drops_when_step_already_completed() {
        let runs = InMemoryRunRepository::new();
        let steps = InMemoryStepRepository::new();
        let run_id = Uuid::new_v4();
        runs.create(sample_run(run_id, RunStatus::Running))
            .await
            .unwrap();
        let mut step = Step::new_pending(run_id, "a", "TRANSFORM");
        step.status = StepStatus::Completed;
        steps.create_many(vec![step]).await.unwrap();
        assert!(!idempotency_gate(&runs, &steps, run_id, "a").await);
    }

    #[tokio::test]
    async fn gate_proceeds_for_pending_step_on_running_run() {
        let runs = InMemoryRunRepository::new();
        let steps = InMemoryStepRepository::new();
        let run_id = Uuid::new_v4();
        runs.create(sample_run(run_id, RunStatus::Running))
            .await
            .unwrap();
        steps
            .create_many(vec![Step::new_pending(run_id, "a", "TRANSFORM")])
            .await
            .unwrap();
        assert!(idempotency_gate(&runs, &steps, run_id, "a").await);
    }
}
