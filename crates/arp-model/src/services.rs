//! Payloads exchanged with downstream services.
//!
//! Only the fields the coordinator reads or forwards are typed; everything
//! else rides along in `extensions`.

use crate::types::{
    ErrorPayload, Extensions, NodeRunId, NodeRunTerminalState, NodeTypeRef, RunId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtomicExecuteRequest {
    pub node_run_id: NodeRunId,
    pub run_id: RunId,
    pub node_type_ref: NodeTypeRef,
    pub inputs: Value,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtomicExecuteResult {
    pub node_run_id: NodeRunId,
    pub state: NodeRunTerminalState,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub output_artifacts: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeBeginRequest {
    pub node_run_id: NodeRunId,
    pub run_id: RunId,
    pub node_type_ref: NodeTypeRef,
    pub inputs: Value,
    #[serde(default)]
    pub coordinator_endpoint: Option<String>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeBeginResponse {
    pub accepted: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateSetRequest {
    pub run_id: RunId,
    pub node_run_id: NodeRunId,
    pub subtask: Value,
    #[serde(default)]
    pub max_candidates: Option<u32>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub candidate_set_id: String,
    pub candidates: Vec<NodeTypeRef>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecisionRequest {
    pub action: String,
    pub run_id: RunId,
    #[serde(default)]
    pub node_run_id: Option<NodeRunId>,
    #[serde(default)]
    pub node_type_ref: Option<NodeTypeRef>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: PolicyEffect,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub node_type_ref: NodeTypeRef,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}
