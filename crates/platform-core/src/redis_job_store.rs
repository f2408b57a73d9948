//! Redis-backed `JobStore` (§4.2, §6 `KV_URL`).
//!
//! Ready jobs live in a per-queue Redis list (`LPUSH`/`BRPOP`); delayed jobs
//! live in a per-queue sorted set scored by `not_before` epoch-millis. A
//! background promotion loop moves due members from the sorted set into the
//! list so `dequeue` only ever needs the cheap blocking list pop.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::JobStoreError;
use crate::job::{Job, JobStore};

pub struct RedisJobStore {
    conn: ConnectionManager,
}

impl RedisJobStore {
    pub async fn connect(url: &str) -> Result<Self, JobStoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    fn ready_key(queue: &str) -> String {
        format!("jobs:{queue}:ready")
    }

    fn delayed_key(queue: &str) -> String {
        format!("jobs:{queue}:delayed")
    }

    /// Move any delayed members whose score has elapsed into the ready list.
    /// Called on every `dequeue` poll and can also be driven by a standalone
    /// background task for lower dequeue latency under load.
    pub async fn promote_due(&self, queue: &str) -> Result<(), JobStoreError> {
        let mut conn = self.conn.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let due: Vec<String> = conn
            .zrangebyscore(Self::delayed_key(queue), 0, now_ms)
            .await
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        for payload in due {
            let mut pipe = redis::pipe();
            pipe.zrem(Self::delayed_key(queue), payload.clone())
                .ignore()
                .lpush(Self::ready_key(queue), payload)
                .ignore();
            let _: () = pipe
                .query_async(&mut conn)
                .await
                .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(&self, job: Job) -> Result<(), JobStoreError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&job)?;
        if job.not_before <= chrono::Utc::now() {
            let _: () = conn
                .lpush(Self::ready_key(&job.queue), payload)
                .await
                .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        } else {
            let score = job.not_before.timestamp_millis();
            let _: () = conn
                .zadd(Self::delayed_key(&job.queue), payload, score)
                .await
                .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Job, JobStoreError> {
        loop {
            self.promote_due(queue).await?;
            let mut conn = self.conn.clone();
            let popped: Option<(String, String)> = conn
                .brpop(Self::ready_key(queue), 1.0)
                .await
                .map_err(|e| JobStoreError::Unavailable(e.to_string()))?;
            if let Some((_, payload)) = popped {
                let job: Job = serde_json::from_str(&payload)?;
                return Ok(job);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn ping(&self) -> Result<(), JobStoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| JobStoreError::Unavailable(e.to_string()))
    }
}
