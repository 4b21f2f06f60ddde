use arp_model::{NodeRun, Run};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {resource} ({id})")]
    NotFound { resource: &'static str, id: String },

    #[error("resource already exists: {resource} ({id})")]
    AlreadyExists { resource: &'static str, id: String },

    #[error("resource already terminal: {resource} ({id}) is {state}")]
    AlreadyTerminal {
        resource: &'static str,
        id: String,
        state: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type SharedLifecycleStore = Arc<dyn LifecycleStore>;

/// Keyed storage for Runs and NodeRuns.
///
/// Each call is atomic for the keys it touches: a concurrent `update_*` on the
/// same key either fully precedes or fully follows another one.
#[async_trait::async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn create_run(&self, run: Run) -> StoreResult<Run>;

    /// Stores a Run together with its root NodeRun. Nothing is stored when
    /// either id is already taken.
    async fn create_run_with_root(&self, run: Run, root: NodeRun) -> StoreResult<(Run, NodeRun)>;

    async fn get_run(&self, run_id: &str) -> StoreResult<Run>;

    async fn update_run(&self, run: Run) -> StoreResult<Run>;

    async fn create_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun>;

    async fn get_node_run(&self, node_run_id: &str) -> StoreResult<NodeRun>;

    async fn update_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun>;

    /// Same as [`update_node_run`](Self::update_node_run), but fails with
    /// `AlreadyTerminal` when the stored NodeRun is terminal. The check and the
    /// write happen under the same lock.
    async fn update_active_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun>;

    /// NodeRuns owned by `run_id`, at most `limit` of them, in no particular order.
    async fn list_node_runs_for_run(&self, run_id: &str, limit: usize)
    -> StoreResult<Vec<NodeRun>>;
}
