use crate::store::{LifecycleStore, StoreError, StoreResult};
use arp_model::{NodeRun, NodeRunId, Run, RunId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct MemoryState {
    pub runs: BTreeMap<RunId, Run>,
    pub node_runs: BTreeMap<NodeRunId, NodeRun>,
}

impl MemoryState {
    pub(crate) fn insert_run(&mut self, run: Run) -> StoreResult<Run> {
        if self.runs.contains_key(&run.run_id) {
            return Err(StoreError::AlreadyExists {
                resource: "run",
                id: run.run_id,
            });
        }
        self.runs.insert(run.run_id.clone(), run.clone());
        Ok(run)
    }

    pub(crate) fn insert_node_run(&mut self, node_run: NodeRun) -> StoreResult<NodeRun> {
        if self.node_runs.contains_key(&node_run.node_run_id) {
            return Err(StoreError::AlreadyExists {
                resource: "node_run",
                id: node_run.node_run_id,
            });
        }
        self.node_runs
            .insert(node_run.node_run_id.clone(), node_run.clone());
        Ok(node_run)
    }

    pub(crate) fn insert_run_with_root(
        &mut self,
        run: Run,
        root: NodeRun,
    ) -> StoreResult<(Run, NodeRun)> {
        if root.run_id != run.run_id {
            return Err(StoreError::InvalidInput(format!(
                "root node run {} belongs to run {}, not {}",
                root.node_run_id, root.run_id, run.run_id
            )));
        }
        if self.node_runs.contains_key(&root.node_run_id) {
            return Err(StoreError::AlreadyExists {
                resource: "node_run",
                id: root.node_run_id,
            });
        }
        let run = self.insert_run(run)?;
        let root = self.insert_node_run(root)?;
        Ok((run, root))
    }

    pub(crate) fn replace_run(&mut self, run: Run) -> StoreResult<Run> {
        let Some(slot) = self.runs.get_mut(&run.run_id) else {
            return Err(StoreError::NotFound {
                resource: "run",
                id: run.run_id,
            });
        };
        *slot = run.clone();
        Ok(run)
    }

    pub(crate) fn replace_node_run(&mut self, node_run: NodeRun) -> StoreResult<NodeRun> {
        let Some(slot) = self.node_runs.get_mut(&node_run.node_run_id) else {
            return Err(StoreError::NotFound {
                resource: "node_run",
                id: node_run.node_run_id,
            });
        };
        *slot = node_run.clone();
        Ok(node_run)
    }

    pub(crate) fn replace_active_node_run(&mut self, node_run: NodeRun) -> StoreResult<NodeRun> {
        match self.node_runs.get(&node_run.node_run_id) {
            Some(stored) if stored.state.is_terminal() => Err(StoreError::AlreadyTerminal {
                resource: "node_run",
                id: node_run.node_run_id,
                state: stored.state.as_str().to_string(),
            }),
            _ => self.replace_node_run(node_run),
        }
    }
}

/// In-process store; one mutex guards every record and is never held across
/// an `.await`.
#[derive(Clone, Debug, Default)]
pub struct MemoryLifecycleStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryLifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: MemoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Applies `mutate` to a copy of the state, hands the copy to `persist`,
    /// and installs it only when both succeed. The lock is held throughout.
    pub(crate) fn commit_with<T, M, P>(&self, mutate: M, persist: P) -> StoreResult<T>
    where
        M: FnOnce(&mut MemoryState) -> StoreResult<T>,
        P: FnOnce(&MemoryState) -> StoreResult<()>,
    {
        let mut state = self.lock()?;
        let mut candidate = state.clone();
        let value = mutate(&mut candidate)?;
        persist(&candidate)?;
        *state = candidate;
        Ok(value)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory lifecycle store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl LifecycleStore for MemoryLifecycleStore {
    async fn create_run(&self, run: Run) -> StoreResult<Run> {
        self.lock()?.insert_run(run)
    }

    async fn create_run_with_root(&self, run: Run, root: NodeRun) -> StoreResult<(Run, NodeRun)> {
        self.lock()?.insert_run_with_root(run, root)
    }

    async fn get_run(&self, run_id: &str) -> StoreResult<Run> {
        self.lock()?
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: "run",
                id: run_id.to_string(),
            })
    }

    async fn update_run(&self, run: Run) -> StoreResult<Run> {
        self.lock()?.replace_run(run)
    }

    async fn create_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun> {
        self.lock()?.insert_node_run(node_run)
    }

    async fn get_node_run(&self, node_run_id: &str) -> StoreResult<NodeRun> {
        self.lock()?
            .node_runs
            .get(node_run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                resource: "node_run",
                id: node_run_id.to_string(),
            })
    }

    async fn update_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun> {
        self.lock()?.replace_node_run(node_run)
    }

    async fn update_active_node_run(&self, node_run: NodeRun) -> StoreResult<NodeRun> {
        self.lock()?.replace_active_node_run(node_run)
    }

    async fn list_node_runs_for_run(
        &self,
        run_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<NodeRun>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.lock()?;
        Ok(state
            .node_runs
            .values()
            .filter(|node_run| node_run.run_id == run_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
