//! Push bus (§4.3): one broadcast channel per run, fed by the worker after
//! each persisted state transition and fanned out to every websocket
//! connection-actor subscribed to that run.
//!
//! Grounded on the teacher's `stream` module's "each connection owns a
//! receiver" shape, generalized from a single process-wide stream to a
//! per-run topic map.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Bounded so a slow/disconnected subscriber can only ever lag, never block
/// a publisher; `tokio::sync::broadcast` drops the oldest entries for a lagged
/// receiver rather than applying backpressure to the worker.
const CHANNEL_CAPACITY: usize = 256;

/// Interval at which `PushBus::heartbeat` should be invoked per
/// connection-actor (§4.3 "idle connections receive a heartbeat every 30s").
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    RunStarted {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        run_id: Uuid,
        step_key: String,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        run_id: Uuid,
        step_key: String,
        output: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        run_id: Uuid,
        step_key: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: Uuid,
        output: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RunCancelled {
        run_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
}

impl PushEvent {
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            PushEvent::RunStarted { run_id, .. }
            | PushEvent::StepStarted { run_id, .. }
            | PushEvent::StepCompleted { run_id, .. }
            | PushEvent::StepFailed { run_id, .. }
            | PushEvent::RunCompleted { run_id, .. }
            | PushEvent::RunFailed { run_id, .. }
            | PushEvent::RunCancelled { run_id, .. } => Some(*run_id),
            PushEvent::Heartbeat { .. } => None,
        }
    }
}

/// One broadcast topic per run, created lazily on first publish or first
/// subscribe and never explicitly torn down — an idle topic with no
/// subscribers and no further publishes is just a dead `Sender` sitting in
/// the map, reclaimed the next time the owning run is GC'd at the process
/// level. Acceptable for a run's lifetime, which is bounded.
#[derive(Default)]
pub struct PushBus {
    topics: DashMap<Uuid, broadcast::Sender<PushEvent>>,
}

impl PushBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, run_id: Uuid) -> broadcast::Sender<PushEvent> {
        self.topics
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribers never see events published before they subscribed; §4.3
    /// leaves catch-up to the `GET /runs/{id}/events?since=` HTTP endpoint.
    pub fn subscribe(&self, run_id: Uuid) -> broadcast::Receiver<PushEvent> {
        self.topic(run_id).subscribe()
    }

    /// No-op (not an error) if nobody is currently subscribed; that's the
    /// normal case for a run nobody is watching live.
    pub fn publish(&self, event: PushEvent) {
        if let Some(run_id) = event.run_id() {
            let _ = self.topic(run_id).send(event);
        }
    }

    /// `PushEvent::Heartbeat` carries no `run_id`, so it can't route through
    /// `publish`'s topic lookup; send it straight to the caller's topic.
    pub fn heartbeat(&self, run_id: Uuid) {
        let _ = self.topic(run_id).send(PushEvent::Heartbeat {
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event_for_its_run() {
        let bus = PushBus::new();
        let run_id = Uuid::new_v4();
        let mut rx = bus.subscribe(run_id);
        bus.publish(PushEvent::StepStarted {
            run_id,
            step_key: "a".into(),
            timestamp: Utc::now(),
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.run_id(), Some(run_id));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = PushBus::new();
        bus.publish(PushEvent::RunCancelled {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn subscribers_to_different_runs_are_isolated() {
        let bus = PushBus::new();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        let mut rx_b = bus.subscribe(run_b);
        bus.publish(PushEvent::StepStarted {
            run_id: run_a,
            step_key: "a".into(),
            timestamp: Utc::now(),
        });
        assert!(rx_b.try_recv().is_err());
    }
}
