use arp_model::{NodeRunEvent, NodeRunId, NodeRunState, RunEvent, RunId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use std::sync::Arc;

pub const RUN_STARTED_EVENT: &str = "run_started";
pub const NODE_RUN_STARTED_EVENT: &str = "node_run_started";
const STREAM_PLACEHOLDER_MESSAGE: &str = "event streaming is not implemented; placeholder record";

/// A lifecycle transition the coordinator has already persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub sequence_no: u64,
    pub timestamp: Timestamp,
    pub kind: LifecycleEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    RunStarted {
        run_id: RunId,
        root_node_run_id: NodeRunId,
    },
    RunCanceled {
        run_id: RunId,
    },
    NodeRunsCreated {
        run_id: RunId,
        parent_node_run_id: NodeRunId,
        node_run_ids: Vec<NodeRunId>,
    },
    NodeRunEvaluated {
        run_id: RunId,
        node_run_id: NodeRunId,
    },
    NodeRunCompleted {
        run_id: RunId,
        node_run_id: NodeRunId,
        state: NodeRunState,
        error_code: Option<String>,
    },
}

pub trait LifecycleEventObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> LifecycleEventObserver for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event);
    }
}

pub type SharedLifecycleEventObserver = Arc<dyn LifecycleEventObserver>;
pub type LifecycleEventSender = mpsc::UnboundedSender<LifecycleEvent>;
pub type LifecycleEventReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

#[derive(Clone, Default)]
pub struct LifecycleEventSink {
    observer: Option<SharedLifecycleEventObserver>,
    sender: Option<LifecycleEventSender>,
}

impl LifecycleEventSink {
    pub fn with_observer(observer: SharedLifecycleEventObserver) -> Self {
        Self {
            observer: Some(observer),
            sender: None,
        }
    }

    pub fn with_sender(sender: LifecycleEventSender) -> Self {
        Self {
            observer: None,
            sender: Some(sender),
        }
    }

    pub fn observer(mut self, observer: SharedLifecycleEventObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn sender(mut self, sender: LifecycleEventSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.observer.is_some() || self.sender.is_some()
    }

    pub fn emit(&self, event: LifecycleEvent) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_event(&event);
        }
        if let Some(sender) = self.sender.as_ref() {
            let _ = sender.send(event);
        }
    }
}

pub fn lifecycle_event_channel() -> (LifecycleEventSender, LifecycleEventReceiver) {
    mpsc::unbounded_channel()
}

/// The single synthetic record served for a Run event stream.
pub fn run_stream_stub(run_id: &str, time: Timestamp) -> Vec<RunEvent> {
    vec![RunEvent {
        run_id: run_id.to_string(),
        seq: 0,
        event_type: RUN_STARTED_EVENT.to_string(),
        time,
        data: serde_json::json!({ "message": STREAM_PLACEHOLDER_MESSAGE }),
    }]
}

/// The single synthetic record served for a NodeRun event stream.
pub fn node_run_stream_stub(node_run_id: &str, time: Timestamp) -> Vec<NodeRunEvent> {
    vec![NodeRunEvent {
        node_run_id: node_run_id.to_string(),
        seq: 0,
        event_type: NODE_RUN_STARTED_EVENT.to_string(),
        time,
        data: serde_json::json!({ "message": STREAM_PLACEHOLDER_MESSAGE }),
    }]
}
