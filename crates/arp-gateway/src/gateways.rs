use crate::call::call_downstream;
use crate::clients::{
    AtomicExecutorClient, CompositeExecutorClient, NodeRegistryClient, PdpClient,
    SelectionClient,
};
use crate::error::ServiceTarget;
use crate::http::HttpServiceClient;
use arp_model::{
    AtomicExecuteRequest, AtomicExecuteResult, CandidateSet, CandidateSetRequest,
    CompositeBeginRequest, CompositeBeginResponse, Health, NodeType, NodeTypeRef,
    PolicyDecision, PolicyDecisionRequest, ServiceError, ServiceResult, VersionInfo,
};
use futures::future::{BoxFuture, FutureExt, join_all};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ATOMIC_EXECUTOR_URL_ENV: &str = "ARP_ATOMIC_EXECUTOR_URL";
pub const COMPOSITE_EXECUTOR_URL_ENV: &str = "ARP_COMPOSITE_EXECUTOR_URL";
pub const SELECTION_SERVICE_URL_ENV: &str = "ARP_SELECTION_SERVICE_URL";
pub const PDP_URL_ENV: &str = "ARP_PDP_URL";
pub const NODE_REGISTRY_URL_ENV: &str = "ARP_NODE_REGISTRY_URL";

#[derive(Clone)]
pub struct AtomicExecutorGateway {
    target: ServiceTarget,
    client: Arc<dyn AtomicExecutorClient>,
}

impl AtomicExecutorGateway {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn AtomicExecutorClient>) -> Self {
        Self {
            target: ServiceTarget::atomic_executor(base_url),
            client,
        }
    }

    pub fn http(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = Arc::new(HttpServiceClient::new(base_url.clone()));
        Self::new(base_url, client)
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    pub async fn execute_atomic_node_run(
        &self,
        request: AtomicExecuteRequest,
    ) -> ServiceResult<AtomicExecuteResult> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move {
            client.execute_atomic_node_run(request).await
        })
        .await
    }

    pub async fn cancel_atomic_node_run(&self, node_run_id: &str) -> ServiceResult<()> {
        let client = Arc::clone(&self.client);
        let node_run_id = node_run_id.to_string();
        call_downstream(&self.target, async move {
            client.cancel_atomic_node_run(node_run_id).await
        })
        .await
    }

    pub async fn health(&self) -> ServiceResult<Health> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.health().await }).await
    }

    pub async fn version(&self) -> ServiceResult<VersionInfo> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.version().await }).await
    }
}

#[derive(Clone)]
pub struct CompositeExecutorGateway {
    target: ServiceTarget,
    client: Arc<dyn CompositeExecutorClient>,
}

impl CompositeExecutorGateway {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn CompositeExecutorClient>) -> Self {
        Self {
            target: ServiceTarget::composite_executor(base_url),
            client,
        }
    }

    pub fn http(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = Arc::new(HttpServiceClient::new(base_url.clone()));
        Self::new(base_url, client)
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    pub async fn begin_composite_node_run(
        &self,
        request: CompositeBeginRequest,
    ) -> ServiceResult<CompositeBeginResponse> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move {
            client.begin_composite_node_run(request).await
        })
        .await
    }

    pub async fn cancel_composite_node_run(&self, node_run_id: &str) -> ServiceResult<()> {
        let client = Arc::clone(&self.client);
        let node_run_id = node_run_id.to_string();
        call_downstream(&self.target, async move {
            client.cancel_composite_node_run(node_run_id).await
        })
        .await
    }

    pub async fn health(&self) -> ServiceResult<Health> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.health().await }).await
    }

    pub async fn version(&self) -> ServiceResult<VersionInfo> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.version().await }).await
    }
}

#[derive(Clone)]
pub struct SelectionGateway {
    target: ServiceTarget,
    client: Arc<dyn SelectionClient>,
}

impl SelectionGateway {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn SelectionClient>) -> Self {
        Self {
            target: ServiceTarget::selection_service(base_url),
            client,
        }
    }

    pub fn http(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = Arc::new(HttpServiceClient::new(base_url.clone()));
        Self::new(base_url, client)
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    pub async fn generate_candidate_set(
        &self,
        request: CandidateSetRequest,
    ) -> ServiceResult<CandidateSet> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move {
            client.generate_candidate_set(request).await
        })
        .await
    }

    pub async fn health(&self) -> ServiceResult<Health> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.health().await }).await
    }

    pub async fn version(&self) -> ServiceResult<VersionInfo> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.version().await }).await
    }
}

#[derive(Clone)]
pub struct PdpGateway {
    target: ServiceTarget,
    client: Arc<dyn PdpClient>,
}

impl PdpGateway {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn PdpClient>) -> Self {
        Self {
            target: ServiceTarget::pdp(base_url),
            client,
        }
    }

    pub fn http(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = Arc::new(HttpServiceClient::new(base_url.clone()));
        Self::new(base_url, client)
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    pub async fn decide_policy(
        &self,
        request: PolicyDecisionRequest,
    ) -> ServiceResult<PolicyDecision> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.decide_policy(request).await }).await
    }

    pub async fn health(&self) -> ServiceResult<Health> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.health().await }).await
    }

    pub async fn version(&self) -> ServiceResult<VersionInfo> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.version().await }).await
    }
}

#[derive(Clone)]
pub struct NodeRegistryGateway {
    target: ServiceTarget,
    client: Arc<dyn NodeRegistryClient>,
}

impl NodeRegistryGateway {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn NodeRegistryClient>) -> Self {
        Self {
            target: ServiceTarget::node_registry(base_url),
            client,
        }
    }

    pub fn http(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let client = Arc::new(HttpServiceClient::new(base_url.clone()));
        Self::new(base_url, client)
    }

    pub fn target(&self) -> &ServiceTarget {
        &self.target
    }

    pub async fn get_node_type(&self, node_type_ref: NodeTypeRef) -> ServiceResult<NodeType> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move {
            client.get_node_type(node_type_ref).await
        })
        .await
    }

    pub async fn health(&self) -> ServiceResult<Health> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.health().await }).await
    }

    pub async fn version(&self) -> ServiceResult<VersionInfo> {
        let client = Arc::clone(&self.client);
        call_downstream(&self.target, async move { client.version().await }).await
    }
}

/// Base URLs of the downstream services; unset entries get no gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayEndpoints {
    pub atomic_executor_url: Option<String>,
    pub composite_executor_url: Option<String>,
    pub selection_service_url: Option<String>,
    pub pdp_url: Option<String>,
    pub node_registry_url: Option<String>,
}

impl GatewayEndpoints {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            atomic_executor_url: read(ATOMIC_EXECUTOR_URL_ENV),
            composite_executor_url: read(COMPOSITE_EXECUTOR_URL_ENV),
            selection_service_url: read(SELECTION_SERVICE_URL_ENV),
            pdp_url: read(PDP_URL_ENV),
            node_registry_url: read(NODE_REGISTRY_URL_ENV),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Health of one configured dependency as seen through its gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub service: String,
    pub base_url: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

impl DependencyStatus {
    fn from_result(target: &ServiceTarget, result: ServiceResult<Health>) -> Self {
        let (healthy, error) = match result {
            Ok(health) => (health.status == arp_model::HealthStatus::Ok, None),
            Err(error) => (false, Some(error)),
        };
        Self {
            service: target.name().to_string(),
            base_url: target.base_url().to_string(),
            healthy,
            error,
        }
    }
}

/// The optional set of gateways a coordinator may consult.
#[derive(Clone, Default)]
pub struct Gateways {
    pub atomic_executor: Option<AtomicExecutorGateway>,
    pub composite_executor: Option<CompositeExecutorGateway>,
    pub selection_service: Option<SelectionGateway>,
    pub pdp: Option<PdpGateway>,
    pub node_registry: Option<NodeRegistryGateway>,
}

impl Gateways {
    pub fn from_endpoints(endpoints: &GatewayEndpoints) -> Self {
        Self {
            atomic_executor: endpoints
                .atomic_executor_url
                .as_deref()
                .map(AtomicExecutorGateway::http),
            composite_executor: endpoints
                .composite_executor_url
                .as_deref()
                .map(CompositeExecutorGateway::http),
            selection_service: endpoints
                .selection_service_url
                .as_deref()
                .map(SelectionGateway::http),
            pdp: endpoints.pdp_url.as_deref().map(PdpGateway::http),
            node_registry: endpoints
                .node_registry_url
                .as_deref()
                .map(NodeRegistryGateway::http),
        }
    }

    pub fn configured_services(&self) -> Vec<&'static str> {
        self.targets().into_iter().map(ServiceTarget::name).collect()
    }

    fn targets(&self) -> Vec<&ServiceTarget> {
        let mut targets = Vec::new();
        if let Some(gateway) = &self.atomic_executor {
            targets.push(gateway.target());
        }
        if let Some(gateway) = &self.composite_executor {
            targets.push(gateway.target());
        }
        if let Some(gateway) = &self.selection_service {
            targets.push(gateway.target());
        }
        if let Some(gateway) = &self.pdp {
            targets.push(gateway.target());
        }
        if let Some(gateway) = &self.node_registry {
            targets.push(gateway.target());
        }
        targets
    }

    /// Calls `health` on every configured gateway concurrently.
    pub async fn probe_health(&self) -> Vec<DependencyStatus> {
        let mut probes: Vec<BoxFuture<'_, DependencyStatus>> = Vec::new();
        if let Some(gateway) = &self.atomic_executor {
            probes.push(
                async move {
                    DependencyStatus::from_result(gateway.target(), gateway.health().await)
                }
                .boxed(),
            );
        }
        if let Some(gateway) = &self.composite_executor {
            probes.push(
                async move {
                    DependencyStatus::from_result(gateway.target(), gateway.health().await)
                }
                .boxed(),
            );
        }
        if let Some(gateway) = &self.selection_service {
            probes.push(
                async move {
                    DependencyStatus::from_result(gateway.target(), gateway.health().await)
                }
                .boxed(),
            );
        }
        if let Some(gateway) = &self.pdp {
            probes.push(
                async move {
                    DependencyStatus::from_result(gateway.target(), gateway.health().await)
                }
                .boxed(),
            );
        }
        if let Some(gateway) = &self.node_registry {
            probes.push(
                async move {
                    DependencyStatus::from_result(gateway.target(), gateway.health().await)
                }
                .boxed(),
            );
        }
        join_all(probes).await
    }
}
