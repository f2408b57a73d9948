//! Build worker (§4.4, §5): drains the build queue and dispatches into
//! `BuildEngine::execute_build`. Default concurrency 2 (§5), lower than the
//! step worker's 10 since a build does real upload I/O per page.

use std::sync::Arc;

use platform_core::job::JobStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

use crate::build::{BuildEngine, BUILD_QUEUE};
use crate::resolver::SiteResolver;

/// Default per-process build worker concurrency (§5).
pub const DEFAULT_CONCURRENCY: usize = 2;

#[derive(serde::Deserialize)]
struct BuildJobPayload {
    #[serde(rename = "buildJobId")]
    build_job_id: Uuid,
}

pub struct BuildWorker {
    job_store: Arc<dyn JobStore>,
    engine: Arc<BuildEngine>,
    resolver: Option<Arc<SiteResolver>>,
    concurrency: usize,
}

impl BuildWorker {
    pub fn new(job_store: Arc<dyn JobStore>, engine: Arc<BuildEngine>) -> Self {
        Self {
            job_store,
            engine,
            resolver: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// When set, the resolver's per-subdomain cache is invalidated after
    /// every successful build so activation is visible immediately rather
    /// than after the 30 s TTL (§4.5 "invalidate on publish/rollback").
    pub fn with_resolver(mut self, resolver: Arc<SiteResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_idx in 0..self.concurrency {
            let job_store = self.job_store.clone();
            let engine = self.engine.clone();
            let resolver = self.resolver.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                drain_loop(worker_idx, job_store, engine, resolver, shutdown).await;
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
    engine: Arc<BuildEngine>,
    resolver: Option<Arc<SiteResolver>>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }
        let job = tokio::select! {
            job = job_store.dequeue(BUILD_QUEUE) => job,
            _ = shutdown.cancelled() => return,
        };
        let job = match job {
            Ok(job) => job,
            Err(err) => {
                error!(worker_idx, %err, "build worker failed to dequeue");
                continue;
            }
        };

        let payload: BuildJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                error!(worker_idx, job_id = %job.id, %err, "malformed build job payload, dropping");
                continue;
            }
        };

        match engine.execute_build(payload.build_job_id).await {
            Ok(site) => {
                if let Some(resolver) = &resolver {
                    resolver.invalidate(&site.subdomain);
                }
            }
            Err(err) => {
                warn!(
                    worker_idx,
                    build_job_id = %payload.build_job_id,
                    %err,
                    "build execution returned an error"
                );
            }
        }
        let _ = job_store.ack(&job).await;
    }
}
