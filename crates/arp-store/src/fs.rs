use crate::memory::{MemoryLifecycleStore, MemoryState};
use crate::store::{LifecycleStore, StoreError, StoreResult};
use arp_model::{NodeRun, Run};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "lifecycle-state.json";

/// Memory store that rewrites a JSON snapshot after every mutation.
///
/// A mutation becomes visible in memory only after its snapshot has been
/// written, so a failed write leaves both memory and disk unchanged.
#[derive(Clone, Debug)]
pub struct FsLifecycleStore {
    state_file: PathBuf,
    inner: MemoryLifecycleStore,
}

impl FsLifecycleStore {
    pub fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        fs::create_dir_all(root.as_ref())
            .map_err(|err| StoreError::Backend(format!("create fs store root failed: {err}")))?;
        let state_file = root.as_ref().join(STATE_FILE_NAME);
        let state = if state_file.exists() {
            let raw = fs::read(&state_file)
                .map_err(|err| StoreError::Backend(format!("read state file failed: {err}")))?;
            serde_json::from_slice::<MemoryState>(&raw)
                .map_err(|err| StoreError::Serialization(err.to_string()))?
        } else {
            MemoryState::default()
        };
        tracing::debug!(
            path = %state_file.display(),
            runs = state.runs.len(),
            node_runs = state.node_runs.len(),
            "opened lifecycle state file"
        );

        Ok(Self {
            state_file,
            inner: MemoryLifecycleStore::from_state(state),
        })
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    fn apply<T, F>(&self, mutate: F) -> StoreResult<T>
    where
        F: FnOnce(&mut MemoryState) -> StoreResult<T>,
    {
        self.inner
            .commit_with(mutate, |candidate| self.write_snapshot(candidate))
    }

    fn write_snapshot(&self, state: &MemoryState) -> StoreResult<()> {
        let raw = serde_json::to_vec_pretty(state)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| StoreError::Backend(format!("write state file failed: {err}")))?;
        fs::rename(&tmp, &self.state_file)
            .map_err(|err| StoreError::Backend(format!("rename state file failed: {err}")))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LifecycleStore for FsLifecycleStore {
    async fn create_run(&self, run: Run) -> StoreResult<Run> {
        self.apply(|state| state.insert_run(run))
    }

    async fn create_run_with_root(&self, run: Run, root: NodeRun) -> StoreResult<(Run, NodeRun)> {
        self.apply(|state| state.insert_run_with_root(run, root))
    }

    async fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        self.inner.get_run(run_id).await
    }

    async fn update_run(&self, run: Run) -> StoreResult<Run> {
        self.apply(|state| state.replace_run(run))
    }

    async fn create_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun> {
        self.apply(|state| state.insert_node_run(node_run))
    }

    async fn get_node_run(&self, node_run_id: &str) -> StoreResult<NodeRun> {
        self.inner.get_node_run(node_run_id).await
    }

    async fn update_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun> {
        self.apply(|state| state.replace_node_run(node_run))
    }

    async fn update_active_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun> {
        self.apply(|state| state.replace_active_node_run(node_run))
    }

    async fn list_node_runs_for_run(
        &self,
        run_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<NodeRun>> {
        self.inner.list_node_runs_for_run(run_id, limit).await
    }
}
