use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub type RunId = String;
pub type NodeRunId = String;
pub type Timestamp = DateTime<Utc>;
pub type Extensions = Map<String, Value>;

/// Extensions key that holds the error reported by a failed completion.
pub const COMPLETION_ERROR_EXTENSION_KEY: &str = "completion_error";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeTypeRef {
    pub node_type_id: String,
    pub version: String,
}

impl NodeTypeRef {
    pub fn new(node_type_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            node_type_id: node_type_id.into(),
            version: version.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for NodeRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The states a completion report may move a NodeRun into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunTerminalState {
    Succeeded,
    Failed,
    Canceled,
}

impl From<NodeRunTerminalState> for NodeRunState {
    fn from(state: NodeRunTerminalState) -> Self {
        match state {
            NodeRunTerminalState::Succeeded => Self::Succeeded,
            NodeRunTerminalState::Failed => Self::Failed,
            NodeRunTerminalState::Canceled => Self::Canceled,
        }
    }
}

impl FromStr for NodeRunTerminalState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!(
                "'{other}' is not a terminal node run state (expected succeeded, failed or canceled)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub state: RunState,
    pub root_node_run_id: NodeRunId,
    pub run_context: Option<Value>,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRun {
    pub node_run_id: NodeRunId,
    pub run_id: RunId,
    pub parent_node_run_id: Option<NodeRunId>,
    pub node_type_ref: NodeTypeRef,
    pub state: NodeRunState,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub inputs: Value,
    pub outputs: Option<Value>,
    pub output_artifacts: Option<Vec<Value>>,
    pub evaluation_result: Option<Value>,
    pub extensions: Option<Extensions>,
}

impl NodeRun {
    /// A freshly created NodeRun: queued, with every result field unset.
    pub fn queued(
        node_run_id: NodeRunId,
        run_id: RunId,
        parent_node_run_id: Option<NodeRunId>,
        node_type_ref: NodeTypeRef,
        inputs: Value,
        extensions: Option<Extensions>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            node_run_id,
            run_id,
            parent_node_run_id,
            node_type_ref,
            state: NodeRunState::Queued,
            created_at,
            started_at: None,
            ended_at: None,
            inputs,
            outputs: None,
            output_artifacts: None,
            evaluation_result: None,
            extensions,
        }
    }

    pub fn completion_error(&self) -> Option<&Value> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get(COMPLETION_ERROR_EXTENSION_KEY))
    }
}

/// Error object reported by executors and stored on failed NodeRuns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartRunRequest {
    #[serde(default)]
    pub run_id: Option<RunId>,
    pub root_node_type_ref: NodeTypeRef,
    pub input: Value,
    #[serde(default)]
    pub run_context: Option<Value>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRunCreateSpec {
    pub node_type_ref: NodeTypeRef,
    pub inputs: Value,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateNodeRunsRequest {
    pub run_id: RunId,
    pub parent_node_run_id: NodeRunId,
    pub node_runs: Vec<NodeRunCreateSpec>,
    #[serde(default)]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRunsCreateResponse {
    pub node_runs: Vec<NodeRun>,
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompleteNodeRunRequest {
    pub state: NodeRunTerminalState,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub output_artifacts: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

impl CompleteNodeRunRequest {
    pub fn new(state: NodeRunTerminalState) -> Self {
        Self {
            state,
            outputs: None,
            output_artifacts: None,
            error: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Down,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: HealthStatus,
    pub time: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub service_name: String,
    pub service_version: String,
    pub supported_api_versions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_run_state_terminal_set_expected_three_states() {
        let terminal: Vec<_> = [
            NodeRunState::Queued,
            NodeRunState::Running,
            NodeRunState::Succeeded,
            NodeRunState::Failed,
            NodeRunState::Canceled,
        ]
        .into_iter()
        .filter(|state| state.is_terminal())
        .collect();

        assert_eq!(
            terminal,
            vec![
                NodeRunState::Succeeded,
                NodeRunState::Failed,
                NodeRunState::Canceled
            ]
        );
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Canceled.is_terminal());
    }

    #[test]
    fn terminal_state_from_str_non_terminal_expected_error() {
        assert_eq!(
            "failed".parse::<NodeRunTerminalState>(),
            Ok(NodeRunTerminalState::Failed)
        );
        assert!("running".parse::<NodeRunTerminalState>().is_err());
        assert!("queued".parse::<NodeRunTerminalState>().is_err());
    }

    #[test]
    fn complete_request_deserialize_non_terminal_state_expected_rejected() {
        let parsed = serde_json::from_value::<CompleteNodeRunRequest>(serde_json::json!({
            "state": "running"
        }));
        assert!(parsed.is_err());

        let parsed = serde_json::from_value::<CompleteNodeRunRequest>(serde_json::json!({
            "state": "failed",
            "error": {"code": "boom", "message": "failure"}
        }))
        .expect("terminal completion should parse");
        assert_eq!(parsed.state, NodeRunTerminalState::Failed);
        assert_eq!(
            parsed.error.map(|error| error.code),
            Some("boom".to_string())
        );
    }

    #[test]
    fn run_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(RunState::Canceled).expect("state should serialize"),
            serde_json::json!("canceled")
        );
        assert_eq!(NodeRunState::Queued.to_string(), "queued");
    }
}
