use crate::config::{CoordinatorConfig, SUPPORTED_API_VERSIONS, TerminalNodeRunPolicy};
use crate::errors::{
    into_service_error, node_run_already_terminal, parent_node_run_mismatch,
    parent_node_run_not_found,
};
use crate::events::{
    LifecycleEvent, LifecycleEventKind, LifecycleEventSink, node_run_stream_stub, run_stream_stub,
};
use arp_gateway::{DependencyStatus, Gateways};
use arp_model::{
    COMPLETION_ERROR_EXTENSION_KEY, CompleteNodeRunRequest, CreateNodeRunsRequest, Health,
    HealthStatus, NodeRun, NodeRunEvent, NodeRunState, NodeRunsCreateResponse, Run, RunEvent,
    RunState, ServiceError, ServiceResult, StartRunRequest, Timestamp, VersionInfo,
};
use arp_store::{FsLifecycleStore, MemoryLifecycleStore, SharedLifecycleStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Orchestrates the Run and NodeRun lifecycle on top of a [`LifecycleStore`].
///
/// Every read-modify-write goes through the store; the coordinator keeps no
/// copies of records between calls.
///
/// [`LifecycleStore`]: arp_store::LifecycleStore
#[derive(Clone)]
pub struct RunCoordinator {
    store: SharedLifecycleStore,
    gateways: Gateways,
    config: CoordinatorConfig,
    events: LifecycleEventSink,
    next_sequence_no: Arc<AtomicU64>,
}

impl RunCoordinator {
    /// Uses `store` as-is and builds HTTP gateways for every configured endpoint.
    pub fn new(store: SharedLifecycleStore, config: CoordinatorConfig) -> Self {
        let gateways = Gateways::from_endpoints(&config.endpoints);
        Self {
            store,
            gateways,
            config,
            events: LifecycleEventSink::default(),
            next_sequence_no: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Opens the file store under `state_dir` when set, otherwise a memory store.
    pub fn from_config(config: CoordinatorConfig) -> ServiceResult<Self> {
        let store: SharedLifecycleStore = match config.state_dir.as_ref() {
            Some(state_dir) => {
                Arc::new(FsLifecycleStore::new(state_dir).map_err(into_service_error)?)
            }
            None => Arc::new(MemoryLifecycleStore::new()),
        };
        Ok(Self::new(store, config))
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryLifecycleStore::new()),
            CoordinatorConfig::default(),
        )
    }

    pub fn with_gateways(mut self, gateways: Gateways) -> Self {
        self.gateways = gateways;
        self
    }

    pub fn with_event_sink(mut self, events: LifecycleEventSink) -> Self {
        self.events = events;
        self
    }

    pub fn store(&self) -> &SharedLifecycleStore {
        &self.store
    }

    pub fn gateways(&self) -> &Gateways {
        &self.gateways
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub async fn start_run(&self, request: StartRunRequest) -> ServiceResult<Run> {
        let run_id = request.run_id.unwrap_or_else(generate_run_id);
        let root_node_run_id = generate_node_run_id();
        let now = now();

        let run = Run {
            run_id: run_id.clone(),
            state: RunState::Running,
            root_node_run_id: root_node_run_id.clone(),
            run_context: request.run_context,
            started_at: now,
            ended_at: None,
            extensions: request.extensions.clone(),
        };
        let root = NodeRun::queued(
            root_node_run_id,
            run_id,
            None,
            request.root_node_type_ref,
            request.input,
            request.extensions,
            now,
        );

        let (run, root) = self
            .store
            .create_run_with_root(run, root)
            .await
            .map_err(into_service_error)?;

        tracing::info!(
            run_id = %run.run_id,
            root_node_run_id = %root.node_run_id,
            node_type_id = %root.node_type_ref.node_type_id,
            "run started"
        );
        self.emit(LifecycleEventKind::RunStarted {
            run_id: run.run_id.clone(),
            root_node_run_id: root.node_run_id,
        });
        Ok(run)
    }

    pub async fn get_run(&self, run_id: &str) -> ServiceResult<Run> {
        self.store.get_run(run_id).await.map_err(into_service_error)
    }

    /// Cancels a running Run; a terminal Run is returned unchanged.
    pub async fn cancel_run(&self, run_id: &str) -> ServiceResult<Run> {
        let mut run = self.get_run(run_id).await?;
        if run.state.is_terminal() {
            tracing::debug!(run_id, state = %run.state, "cancel ignored for terminal run");
            return Ok(run);
        }

        run.state = RunState::Canceled;
        run.ended_at = Some(now());
        let run = self.store.update_run(run).await.map_err(into_service_error)?;

        tracing::info!(run_id, "run canceled");
        self.emit(LifecycleEventKind::RunCanceled {
            run_id: run.run_id.clone(),
        });
        Ok(run)
    }

    /// Validates the Run and parent, then creates one queued NodeRun per entry.
    ///
    /// Validation completes before the first creation, so a rejected request
    /// leaves no NodeRun behind. The checks and creations are not isolated
    /// from a concurrent cancel of the same Run.
    pub async fn create_node_runs(
        &self,
        request: CreateNodeRunsRequest,
    ) -> ServiceResult<NodeRunsCreateResponse> {
        let run = self.get_run(&request.run_id).await?;
        let parent = match self.store.get_node_run(&request.parent_node_run_id).await {
            Ok(parent) => parent,
            Err(StoreError::NotFound { .. }) => {
                return Err(parent_node_run_not_found(&request.parent_node_run_id));
            }
            Err(error) => return Err(into_service_error(error)),
        };
        if parent.run_id != run.run_id {
            return Err(parent_node_run_mismatch(
                &parent.node_run_id,
                &parent.run_id,
                &run.run_id,
            ));
        }

        let mut created = Vec::with_capacity(request.node_runs.len());
        for spec in request.node_runs {
            let node_run = NodeRun::queued(
                generate_node_run_id(),
                run.run_id.clone(),
                Some(parent.node_run_id.clone()),
                spec.node_type_ref,
                spec.inputs,
                spec.extensions,
                now(),
            );
            let node_run = self
                .store
                .create_node_run(node_run)
                .await
                .map_err(into_service_error)?;
            created.push(node_run);
        }

        tracing::info!(
            run_id = %run.run_id,
            parent_node_run_id = %parent.node_run_id,
            count = created.len(),
            "node runs created"
        );
        self.emit(LifecycleEventKind::NodeRunsCreated {
            run_id: run.run_id,
            parent_node_run_id: parent.node_run_id,
            node_run_ids: created
                .iter()
                .map(|node_run| node_run.node_run_id.clone())
                .collect(),
        });
        Ok(NodeRunsCreateResponse {
            node_runs: created,
            extensions: request.extensions,
        })
    }

    pub async fn get_node_run(&self, node_run_id: &str) -> ServiceResult<NodeRun> {
        self.store
            .get_node_run(node_run_id)
            .await
            .map_err(into_service_error)
    }

    /// Replaces `evaluation_result` and nothing else.
    pub async fn report_node_run_evaluation(
        &self,
        node_run_id: &str,
        evaluation_result: Value,
    ) -> ServiceResult<()> {
        let mut node_run = self.get_node_run(node_run_id).await?;
        self.check_terminal_policy(&node_run, "evaluation")?;

        node_run.evaluation_result = Some(evaluation_result);
        let node_run = self.write_node_run(node_run).await?;

        tracing::debug!(node_run_id, "node run evaluation recorded");
        self.emit(LifecycleEventKind::NodeRunEvaluated {
            run_id: node_run.run_id,
            node_run_id: node_run.node_run_id,
        });
        Ok(())
    }

    /// Moves a NodeRun into a terminal state and records its results.
    ///
    /// A reported error is stored under `extensions.completion_error`; other
    /// extension keys are kept.
    pub async fn complete_node_run(
        &self,
        node_run_id: &str,
        request: CompleteNodeRunRequest,
    ) -> ServiceResult<()> {
        let mut node_run = self.get_node_run(node_run_id).await?;
        self.check_terminal_policy(&node_run, "completion")?;

        node_run.state = NodeRunState::from(request.state);
        node_run.outputs = request.outputs;
        node_run.output_artifacts = request.output_artifacts;
        node_run.ended_at = Some(now());

        let error_code = request.error.as_ref().map(|error| error.code.clone());
        if let Some(error) = request.error {
            let value = serde_json::to_value(&error).map_err(|err| {
                ServiceError::internal("completion_error_encoding_failed", err.to_string())
            })?;
            node_run
                .extensions
                .get_or_insert_with(Default::default)
                .insert(COMPLETION_ERROR_EXTENSION_KEY.to_string(), value);
        }

        let node_run = self.write_node_run(node_run).await?;

        tracing::info!(
            node_run_id,
            run_id = %node_run.run_id,
            state = %node_run.state,
            error_code = error_code.as_deref().unwrap_or(""),
            "node run completed"
        );
        self.emit(LifecycleEventKind::NodeRunCompleted {
            run_id: node_run.run_id,
            node_run_id: node_run.node_run_id,
            state: node_run.state,
            error_code,
        });
        Ok(())
    }

    pub fn health(&self) -> Health {
        Health {
            status: HealthStatus::Ok,
            time: now(),
        }
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            service_name: self.config.service_name.clone(),
            service_version: self.config.service_version.clone(),
            supported_api_versions: SUPPORTED_API_VERSIONS
                .iter()
                .map(|version| version.to_string())
                .collect(),
        }
    }

    /// Placeholder stream: one synthetic `run_started` record, whether or not
    /// the Run exists.
    pub async fn stream_run_events(&self, run_id: &str) -> ServiceResult<Vec<RunEvent>> {
        Ok(run_stream_stub(run_id, now()))
    }

    pub async fn stream_node_run_events(
        &self,
        node_run_id: &str,
    ) -> ServiceResult<Vec<NodeRunEvent>> {
        Ok(node_run_stream_stub(node_run_id, now()))
    }

    pub async fn probe_dependencies(&self) -> Vec<DependencyStatus> {
        let statuses = self.gateways.probe_health().await;
        for status in statuses.iter().filter(|status| !status.healthy) {
            tracing::warn!(
                service = %status.service,
                base_url = %status.base_url,
                error = status.error.as_ref().map(|error| error.code.as_str()).unwrap_or(""),
                "dependency unhealthy"
            );
        }
        statuses
    }

    fn check_terminal_policy(&self, node_run: &NodeRun, update: &str) -> ServiceResult<()> {
        if !node_run.state.is_terminal() {
            return Ok(());
        }
        match self.config.terminal_node_run_policy {
            TerminalNodeRunPolicy::Reject => Err(node_run_already_terminal(
                &node_run.node_run_id,
                node_run.state.as_str(),
            )),
            TerminalNodeRunPolicy::Overwrite => {
                tracing::warn!(
                    node_run_id = %node_run.node_run_id,
                    state = %node_run.state,
                    update,
                    "overwriting terminal node run"
                );
                Ok(())
            }
        }
    }

    /// Under `Reject` the store refuses the write if the NodeRun turned terminal
    /// after it was read.
    async fn write_node_run(&self, node_run: NodeRun) -> ServiceResult<NodeRun> {
        let written = match self.config.terminal_node_run_policy {
            TerminalNodeRunPolicy::Reject => self.store.update_active_node_run(node_run).await,
            TerminalNodeRunPolicy::Overwrite => self.store.update_node_run(node_run).await,
        };
        written.map_err(into_service_error)
    }

    fn emit(&self, kind: LifecycleEventKind) {
        if !self.events.is_enabled() {
            return;
        }
        self.events.emit(LifecycleEvent {
            sequence_no: self.next_sequence_no.fetch_add(1, Ordering::Relaxed),
            timestamp: now(),
            kind,
        });
    }
}

fn now() -> Timestamp {
    chrono::Utc::now()
}

pub fn generate_run_id() -> String {
    format!("run_{}", Uuid::new_v4().simple())
}

pub fn generate_node_run_id() -> String {
    format!("node_run_{}", Uuid::new_v4().simple())
}
