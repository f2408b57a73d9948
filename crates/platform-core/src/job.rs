//! Durable job queue abstraction (§4.2, §5).
//!
//! The job store gives at-least-once delivery; the idempotency gate each
//! worker applies before dispatch (step worker, build worker) is what turns
//! that into effectively-once persisted state (property 3, §8).

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::errors::JobStoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub kind: String,
    pub payload: serde_json::Value,
    /// Natural dedup key; SHOULD equal the job id so native queue dedup
    /// (where available) lines up with the idempotency gate.
    pub idempotency_key: String,
    pub not_before: DateTime<Utc>,
}

impl Job {
    pub fn new(queue: &str, kind: &str, idempotency_key: String, payload: serde_json::Value) -> Self {
        Self {
            id: idempotency_key.clone(),
            queue: queue.to_string(),
            kind: kind.to_string(),
            payload,
            idempotency_key,
            not_before: Utc::now(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.not_before = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        self
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), JobStoreError>;

    async fn enqueue_delayed(&self, job: Job, delay: Duration) -> Result<(), JobStoreError> {
        self.enqueue(job.with_delay(delay)).await
    }

    /// Blocking-style pop: waits until a job is available or ready.
    async fn dequeue(&self, queue: &str) -> Result<Job, JobStoreError>;

    /// Acknowledge successful processing (a no-op for queues without
    /// visibility timeouts; present so swapping in one later is additive).
    async fn ack(&self, _job: &Job) -> Result<(), JobStoreError> {
        Ok(())
    }

    /// Cheap reachability probe for `/health` (§6). Default `Ok(())` suits
    /// the in-memory store; `RedisJobStore` overrides with a real `PING`.
    async fn ping(&self) -> Result<(), JobStoreError> {
        Ok(())
    }
}

struct QueueState {
    ready: VecDeque<Job>,
    delayed: BinaryHeap<Reverse<DelayedJob>>,
}

struct DelayedJob {
    not_before: DateTime<Utc>,
    job: Job,
}

impl PartialEq for DelayedJob {
    fn eq(&self, other: &Self) -> bool {
        self.not_before == other.not_before
    }
}
impl Eq for DelayedJob {}
impl PartialOrd for DelayedJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DelayedJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.not_before.cmp(&other.not_before)
    }
}

/// In-process job store backing unit and integration tests (§8 test
/// tooling): no external Redis needed to exercise the engine or workers.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            ready: VecDeque::new(),
            delayed: BinaryHeap::new(),
        }
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    async fn promote_due(&self) {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        while let Some(Reverse(top)) = state.delayed.peek() {
            if top.not_before <= now {
                let Reverse(due) = state.delayed.pop().unwrap();
                state.ready.push_back(due.job);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: Job) -> Result<(), JobStoreError> {
        let mut state = self.state.lock().await;
        if job.not_before <= Utc::now() {
            state.ready.push_back(job);
        } else {
            state.delayed.push(Reverse(DelayedJob {
                not_before: job.not_before,
                job,
            }));
        }
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Job, JobStoreError> {
        loop {
            self.promote_due().await;
            {
                let mut state = self.state.lock().await;
                if let Some(pos) = state.ready.iter().position(|j| j.queue == queue) {
                    return Ok(state.ready.remove(pos).unwrap());
                }
            }
            let wait = tokio::time::sleep(Duration::from_millis(50));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = wait => {}
            }
        }
    }
}

/// A stable identifier suitable for a step idempotency key (§3, §4.2):
/// `runId:stepKey:retryCount`.
pub fn step_idempotency_key(run_id: Uuid, step_key: &str, retry_count: u32) -> String {
    format!("{run_id}:{step_key}:{retry_count}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_dequeue_roundtrips() {
        let store = InMemoryJobStore::new();
        let job = Job::new("steps", "execute_step", "run:a:0".into(), serde_json::json!({}));
        store.enqueue(job.clone()).await.unwrap();
        let popped = store.dequeue("steps").await.unwrap();
        assert_eq!(popped.id, job.id);
    }

    #[tokio::test]
    async fn delayed_job_is_not_ready_immediately() {
        let store = InMemoryJobStore::new();
        let job = Job::new("steps", "execute_step", "run:a:1".into(), serde_json::json!({}));
        store
            .enqueue_delayed(job, Duration::from_millis(30))
            .await
            .unwrap();
        let result = tokio::time::timeout(Duration::from_millis(5), store.dequeue("steps")).await;
        assert!(result.is_err(), "job should not be ready yet");
        let popped = tokio::time::timeout(Duration::from_millis(200), store.dequeue("steps"))
            .await
            .expect("job should become ready");
        assert!(popped.is_ok());
    }

    #[test]
    fn idempotency_key_format() {
        let run_id = Uuid::nil();
        assert_eq!(
            step_idempotency_key(run_id, "step-a", 2),
            format!("{run_id}:step-a:2")
        );
    }
}
