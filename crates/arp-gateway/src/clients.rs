//! Raw client contracts, one per downstream service.
//!
//! Implementations report failures as [`DownstreamError`]; the gateways turn
//! them into the uniform error.

use crate::error::DownstreamError;
use arp_model::{
    AtomicExecuteRequest, AtomicExecuteResult, CandidateSet, CandidateSetRequest,
    CompositeBeginRequest, CompositeBeginResponse, Health, NodeType, NodeTypeRef,
    PolicyDecision, PolicyDecisionRequest, VersionInfo,
};
use async_trait::async_trait;

#[async_trait]
pub trait AtomicExecutorClient: Send + Sync {
    async fn execute_atomic_node_run(
        &self,
        request: AtomicExecuteRequest,
    ) -> Result<AtomicExecuteResult, DownstreamError>;

    async fn cancel_atomic_node_run(&self, node_run_id: String) -> Result<(), DownstreamError>;

    async fn health(&self) -> Result<Health, DownstreamError>;

    async fn version(&self) -> Result<VersionInfo, DownstreamError>;
}

#[async_trait]
pub trait CompositeExecutorClient: Send + Sync {
    async fn begin_composite_node_run(
        &self,
        request: CompositeBeginRequest,
    ) -> Result<CompositeBeginResponse, DownstreamError>;

    async fn cancel_composite_node_run(&self, node_run_id: String)
    -> Result<(), DownstreamError>;

    async fn health(&self) -> Result<Health, DownstreamError>;

    async fn version(&self) -> Result<VersionInfo, DownstreamError>;
}

#[async_trait]
pub trait SelectionClient: Send + Sync {
    async fn generate_candidate_set(
        &self,
        request: CandidateSetRequest,
    ) -> Result<CandidateSet, DownstreamError>;

    async fn health(&self) -> Result<Health, DownstreamError>;

    async fn version(&self) -> Result<VersionInfo, DownstreamError>;
}

#[async_trait]
pub trait PdpClient: Send + Sync {
    async fn decide_policy(
        &self,
        request: PolicyDecisionRequest,
    ) -> Result<PolicyDecision, DownstreamError>;

    async fn health(&self) -> Result<Health, DownstreamError>;

    async fn version(&self) -> Result<VersionInfo, DownstreamError>;
}

#[async_trait]
pub trait NodeRegistryClient: Send + Sync {
    async fn get_node_type(&self, node_type_ref: NodeTypeRef)
    -> Result<NodeType, DownstreamError>;

    async fn health(&self) -> Result<Health, DownstreamError>;

    async fn version(&self) -> Result<VersionInfo, DownstreamError>;
}
