//! Repository traits the engine is built against (§1 "accessed through
//! narrow repository interfaces"). Every method takes a `TenantScope` so
//! tenant isolation (§8 property 1) is structural, not a discipline.

use async_trait::async_trait;
use platform_core::errors::RepositoryError;
use platform_core::pagination::{PageParams, Paginated};
use platform_core::tenancy::TenantScope;
use uuid::Uuid;
use workflow_domain::model::{Event, Run, Step, Workflow};

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create(&self, workflow: Workflow) -> Result<Workflow, RepositoryError>;
    async fn get(&self, scope: TenantScope, id: Uuid) -> Result<Workflow, RepositoryError>;
    async fn list(
        &self,
        scope: TenantScope,
        page: PageParams,
    ) -> Result<Paginated<Workflow>, RepositoryError>;
    /// Replaces the definition and bumps `version` (§3 invariant).
    async fn update(&self, workflow: Workflow) -> Result<Workflow, RepositoryError>;
    async fn soft_delete(&self, scope: TenantScope, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn create(&self, run: Run) -> Result<Run, RepositoryError>;
    async fn get(&self, scope: TenantScope, id: Uuid) -> Result<Run, RepositoryError>;
    /// Primary-key lookup with no tenant filter. Workers dequeue jobs that
    /// carry only a `run_id` (§4.2); this is safe precisely because it is a
    /// lookup by an opaque id the caller cannot forge into a cross-tenant
    /// scan, unlike `get`, which is what every tenant-facing handler uses.
    async fn get_by_id(&self, id: Uuid) -> Result<Run, RepositoryError>;
    async fn update(&self, run: Run) -> Result<Run, RepositoryError>;
    async fn list_for_workflow(
        &self,
        scope: TenantScope,
        workflow_id: Uuid,
        page: PageParams,
    ) -> Result<Paginated<Run>, RepositoryError>;
}

#[async_trait]
pub trait StepRepository: Send + Sync {
    async fn create_many(&self, steps: Vec<Step>) -> Result<(), RepositoryError>;
    async fn get(&self, run_id: Uuid, step_key: &str) -> Result<Step, RepositoryError>;
    async fn update(&self, step: Step) -> Result<Step, RepositoryError>;
    async fn list_for_run(&self, run_id: Uuid) -> Result<Vec<Step>, RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn append(&self, event: Event) -> Result<(), RepositoryError>;
    async fn list_since(
        &self,
        run_id: Uuid,
        since: Option<chrono::DateTime<chrono::Utc>>,
        page: PageParams,
    ) -> Result<Paginated<Event>, RepositoryError>;
}

pub mod in_memory {
    //! In-memory repository implementations backing unit/integration tests
    //! (§8 test tooling) so the engine's behavior is exercisable without a
    //! live relational store.

    use std::collections::HashMap;
    use std::sync::RwLock;

    use platform_core::append_log::AppendLog;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryWorkflowRepository {
        workflows: RwLock<HashMap<Uuid, Workflow>>,
    }

    impl InMemoryWorkflowRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl WorkflowRepository for InMemoryWorkflowRepository {
        async fn create(&self, workflow: Workflow) -> Result<Workflow, RepositoryError> {
            let mut guard = self.workflows.write().unwrap();
            guard.insert(workflow.id, workflow.clone());
            Ok(workflow)
        }

        async fn get(&self, scope: TenantScope, id: Uuid) -> Result<Workflow, RepositoryError> {
            let guard = self.workflows.read().unwrap();
            guard
                .get(&id)
                .filter(|w| w.tenant_id == scope.tenant_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("workflow {id}")))
        }

        async fn list(
            &self,
            scope: TenantScope,
            page: PageParams,
        ) -> Result<Paginated<Workflow>, RepositoryError> {
            let guard = self.workflows.read().unwrap();
            let mut all: Vec<Workflow> = guard
                .values()
                .filter(|w| w.tenant_id == scope.tenant_id && w.is_active)
                .cloned()
                .collect();
            all.sort_by_key(|w| w.created_at);
            let total = all.len() as u64;
            let start = page.offset() as usize;
            let page_items = all
                .into_iter()
                .skip(start)
                .take(page.limit as usize)
                .collect();
            Ok(Paginated::new(page_items, page, total))
        }

        async fn update(&self, workflow: Workflow) -> Result<Workflow, RepositoryError> {
            let mut guard = self.workflows.write().unwrap();
            guard.insert(workflow.id, workflow.clone());
            Ok(workflow)
        }

        async fn soft_delete(&self, scope: TenantScope, id: Uuid) -> Result<(), RepositoryError> {
            let mut guard = self.workflows.write().unwrap();
            let workflow = guard
                .get_mut(&id)
                .filter(|w| w.tenant_id == scope.tenant_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("workflow {id}")))?;
            workflow.is_active = false;
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryRunRepository {
        runs: RwLock<HashMap<Uuid, Run>>,
    }

    impl InMemoryRunRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl RunRepository for InMemoryRunRepository {
        async fn create(&self, run: Run) -> Result<Run, RepositoryError> {
            self.runs.write().unwrap().insert(run.id, run.clone());
            Ok(run)
        }

        async fn get(&self, scope: TenantScope, id: Uuid) -> Result<Run, RepositoryError> {
            self.runs
                .read()
                .unwrap()
                .get(&id)
                .filter(|r| r.tenant_id == scope.tenant_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("run {id}")))
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Run, RepositoryError> {
            self.runs
                .read()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("run {id}")))
        }

        async fn update(&self, run: Run) -> Result<Run, RepositoryError> {
            self.runs.write().unwrap().insert(run.id, run.clone());
            Ok(run)
        }

        async fn list_for_workflow(
            &self,
            scope: TenantScope,
            workflow_id: Uuid,
            page: PageParams,
        ) -> Result<Paginated<Run>, RepositoryError> {
            let guard = self.runs.read().unwrap();
            let mut all: Vec<Run> = guard
                .values()
                .filter(|r| r.tenant_id == scope.tenant_id && r.workflow_id == workflow_id)
                .cloned()
                .collect();
            all.sort_by_key(|r| r.started_at);
            let total = all.len() as u64;
            let start = page.offset() as usize;
            let page_items = all
                .into_iter()
                .skip(start)
                .take(page.limit as usize)
                .collect();
            Ok(Paginated::new(page_items, page, total))
        }
    }

    #[derive(Default)]
    pub struct InMemoryStepRepository {
        steps: RwLock<HashMap<(Uuid, String), Step>>,
    }

    impl InMemoryStepRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl StepRepository for InMemoryStepRepository {
        async fn create_many(&self, steps: Vec<Step>) -> Result<(), RepositoryError> {
            let mut guard = self.steps.write().unwrap();
            for step in steps {
                guard.insert((step.run_id, step.step_key.clone()), step);
            }
            Ok(())
        }

        async fn get(&self, run_id: Uuid, step_key: &str) -> Result<Step, RepositoryError> {
            self.steps
                .read()
                .unwrap()
                .get(&(run_id, step_key.to_string()))
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("step {run_id}/{step_key}")))
        }

        async fn update(&self, step: Step) -> Result<Step, RepositoryError> {
            let mut guard = self.steps.write().unwrap();
            guard.insert((step.run_id, step.step_key.clone()), step.clone());
            Ok(step)
        }

        async fn list_for_run(&self, run_id: Uuid) -> Result<Vec<Step>, RepositoryError> {
            let guard = self.steps.read().unwrap();
            Ok(guard
                .values()
                .filter(|s| s.run_id == run_id)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct InMemoryEventRepository {
        by_run: RwLock<HashMap<Uuid, AppendLog<Event>>>,
    }

    impl InMemoryEventRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl EventRepository for InMemoryEventRepository {
        async fn append(&self, event: Event) -> Result<(), RepositoryError> {
            let mut guard = self.by_run.write().unwrap();
            guard.entry(event.run_id).or_default().append(event);
            Ok(())
        }

        async fn list_since(
            &self,
            run_id: Uuid,
            since: Option<chrono::DateTime<chrono::Utc>>,
            page: PageParams,
        ) -> Result<Paginated<Event>, RepositoryError> {
            let guard = self.by_run.read().unwrap();
            let all = guard
                .get(&run_id)
                .map(|log| log.since(since))
                .unwrap_or_default();
            let total = all.len() as u64;
            let start = page.offset() as usize;
            let page_items = all.into_iter().skip(start).take(page.limit as usize).collect();
            Ok(Paginated::new(page_items, page, total))
        }
    }
}
