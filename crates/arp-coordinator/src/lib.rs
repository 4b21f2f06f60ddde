//! Run coordination core.
//!
//! Accepts Runs made of a tree of NodeRuns, validates every lifecycle
//! transition against the [`arp_store::LifecycleStore`], and exposes the
//! downstream services through [`arp_gateway::Gateways`].

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;

pub use config::{
    ConfigError, CoordinatorConfig, DEFAULT_SERVICE_NAME, TerminalNodeRunPolicy,
};
pub use coordinator::{RunCoordinator, generate_node_run_id, generate_run_id};
pub use errors::into_service_error;
pub use events::{
    LifecycleEvent, LifecycleEventKind, LifecycleEventObserver, LifecycleEventReceiver,
    LifecycleEventSender, LifecycleEventSink, SharedLifecycleEventObserver,
    lifecycle_event_channel,
};
