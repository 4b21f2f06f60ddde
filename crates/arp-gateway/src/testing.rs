use crate::clients::{
    AtomicExecutorClient, CompositeExecutorClient, NodeRegistryClient, PdpClient,
    SelectionClient,
};
use crate::error::DownstreamError;
use arp_model::{
    AtomicExecuteRequest, AtomicExecuteResult, CandidateSet, CandidateSetRequest,
    CompositeBeginRequest, CompositeBeginResponse, ErrorDetails, Health, HealthStatus, NodeType,
    NodeTypeRef, NodeRunTerminalState, PolicyDecision, PolicyDecisionRequest, PolicyEffect,
    VersionInfo,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Failure a [`MockDownstream`] injects into a call.
#[derive(Clone, Debug, PartialEq)]
pub enum MockFailure {
    Api {
        code: String,
        message: String,
        status_code: Option<u16>,
        details: Option<ErrorDetails>,
    },
    Transport(String),
    Decode(String),
    Panic(String),
}

impl MockFailure {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            status_code: None,
            details: None,
        }
    }

    fn into_error(self) -> DownstreamError {
        match self {
            Self::Api {
                code,
                message,
                status_code,
                details,
            } => DownstreamError::Api {
                code,
                message,
                status_code,
                details,
            },
            Self::Transport(message) => DownstreamError::Transport(message),
            Self::Decode(message) => DownstreamError::Decode(message),
            Self::Panic(message) => panic!("{message}"),
        }
    }
}

/// In-memory stand-in for every downstream service.
///
/// Records each operation name it receives, answers with canned echo
/// payloads, and can be told to fail or hang per operation.
#[derive(Clone, Debug, Default)]
pub struct MockDownstream {
    inner: Arc<Mutex<MockDownstreamState>>,
}

#[derive(Debug, Default)]
struct MockDownstreamState {
    calls: Vec<String>,
    failures: BTreeMap<String, MockFailure>,
    fail_all: Option<MockFailure>,
    holds: BTreeMap<String, Arc<Notify>>,
    health: Option<HealthStatus>,
}

impl MockDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_operation(&self, operation: &str, failure: MockFailure) {
        if let Ok(mut state) = self.inner.lock() {
            state.failures.insert(operation.to_string(), failure);
        }
    }

    pub fn fail_all(&self, failure: MockFailure) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_all = Some(failure);
        }
    }

    /// Makes calls to `operation` wait until the returned handle is notified.
    pub fn hold_operation(&self, operation: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        if let Ok(mut state) = self.inner.lock() {
            state
                .holds
                .insert(operation.to_string(), Arc::clone(&notify));
        }
        notify
    }

    pub fn set_health(&self, status: HealthStatus) {
        if let Ok(mut state) = self.inner.lock() {
            state.health = Some(status);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    async fn enter(&self, operation: &str) -> Result<(), DownstreamError> {
        let (failure, hold) = {
            let mut state = self
                .inner
                .lock()
                .map_err(|_| DownstreamError::Transport("mock downstream mutex poisoned".into()))?;
            state.calls.push(operation.to_string());
            let failure = state
                .failures
                .get(operation)
                .cloned()
                .or_else(|| state.fail_all.clone());
            (failure, state.holds.get(operation).cloned())
        };

        if let Some(hold) = hold {
            hold.notified().await;
        }
        match failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn health_status(&self) -> HealthStatus {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.health)
            .unwrap_or(HealthStatus::Ok)
    }

    async fn canned_health(&self) -> Result<Health, DownstreamError> {
        self.enter("health").await?;
        Ok(Health {
            status: self.health_status(),
            time: chrono::Utc::now(),
        })
    }

    async fn canned_version(&self) -> Result<VersionInfo, DownstreamError> {
        self.enter("version").await?;
        Ok(VersionInfo {
            service_name: "mock-downstream".to_string(),
            service_version: "0.0.0".to_string(),
            supported_api_versions: vec!["v1".to_string()],
        })
    }
}

#[async_trait]
impl AtomicExecutorClient for MockDownstream {
    async fn execute_atomic_node_run(
        &self,
        request: AtomicExecuteRequest,
    ) -> Result<AtomicExecuteResult, DownstreamError> {
        self.enter("execute_atomic_node_run").await?;
        Ok(AtomicExecuteResult {
            node_run_id: request.node_run_id,
            state: NodeRunTerminalState::Succeeded,
            outputs: Some(serde_json::json!({ "echo": request.inputs })),
            output_artifacts: None,
            error: None,
        })
    }

    async fn cancel_atomic_node_run(&self, _node_run_id: String) -> Result<(), DownstreamError> {
        self.enter("cancel_atomic_node_run").await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.canned_health().await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.canned_version().await
    }
}

#[async_trait]
impl CompositeExecutorClient for MockDownstream {
    async fn begin_composite_node_run(
        &self,
        _request: CompositeBeginRequest,
    ) -> Result<CompositeBeginResponse, DownstreamError> {
        self.enter("begin_composite_node_run").await?;
        Ok(CompositeBeginResponse {
            accepted: true,
            message: None,
            extensions: None,
        })
    }

    async fn cancel_composite_node_run(
        &self,
        _node_run_id: String,
    ) -> Result<(), DownstreamError> {
        self.enter("cancel_composite_node_run").await
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.canned_health().await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.canned_version().await
    }
}

#[async_trait]
impl SelectionClient for MockDownstream {
    async fn generate_candidate_set(
        &self,
        request: CandidateSetRequest,
    ) -> Result<CandidateSet, DownstreamError> {
        self.enter("generate_candidate_set").await?;
        Ok(CandidateSet {
            candidate_set_id: format!("candidate_set_{}", request.node_run_id),
            candidates: vec![NodeTypeRef::new("mock.echo", "1.0.0")],
            extensions: None,
        })
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.canned_health().await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.canned_version().await
    }
}

#[async_trait]
impl PdpClient for MockDownstream {
    async fn decide_policy(
        &self,
        _request: PolicyDecisionRequest,
    ) -> Result<PolicyDecision, DownstreamError> {
        self.enter("decide_policy").await?;
        Ok(PolicyDecision {
            decision: PolicyEffect::Allow,
            reason_code: None,
            message: None,
        })
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.canned_health().await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.canned_version().await
    }
}

#[async_trait]
impl NodeRegistryClient for MockDownstream {
    async fn get_node_type(
        &self,
        node_type_ref: NodeTypeRef,
    ) -> Result<NodeType, DownstreamError> {
        self.enter("get_node_type").await?;
        Ok(NodeType {
            node_type_ref,
            kind: Some("atomic".to_string()),
            description: None,
            extensions: None,
        })
    }

    async fn health(&self) -> Result<Health, DownstreamError> {
        self.canned_health().await
    }

    async fn version(&self) -> Result<VersionInfo, DownstreamError> {
        self.canned_version().await
    }
}
