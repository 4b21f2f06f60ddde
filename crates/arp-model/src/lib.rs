//! Shared data model for the run coordinator workspace.
//!
//! Runs and NodeRuns, their lifecycle states, the payload shapes exchanged
//! with downstream services, and the single error type every layer reports.

pub mod error;
pub mod events;
pub mod services;
pub mod types;

pub use error::{ErrorDetails, ServiceError, ServiceResult};
pub use events::{NodeRunEvent, RunEvent, encode_ndjson};
pub use services::{
    AtomicExecuteRequest, AtomicExecuteResult, CandidateSet, CandidateSetRequest,
    CompositeBeginRequest, CompositeBeginResponse, NodeType, PolicyDecision,
    PolicyDecisionRequest, PolicyEffect,
};
pub use types::{
    COMPLETION_ERROR_EXTENSION_KEY, CompleteNodeRunRequest, CreateNodeRunsRequest, ErrorPayload,
    Extensions, Health, HealthStatus, NodeRun, NodeRunCreateSpec, NodeRunId, NodeRunState,
    NodeRunTerminalState, NodeRunsCreateResponse, NodeTypeRef, Run, RunId, RunState,
    StartRunRequest, Timestamp, VersionInfo,
};
