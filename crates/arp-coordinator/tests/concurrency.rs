use arp_coordinator::{CoordinatorConfig, RunCoordinator, TerminalNodeRunPolicy};
use arp_gateway::{AtomicExecutorGateway, Gateways, MockDownstream, MockFailure, PdpGateway};
use arp_model::{
    CompleteNodeRunRequest, CreateNodeRunsRequest, NodeRunCreateSpec, NodeRunState,
    NodeRunTerminalState, NodeTypeRef, StartRunRequest,
};
use arp_store::{LifecycleStore, MemoryLifecycleStore};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn start_request(run_id: &str) -> StartRunRequest {
    StartRunRequest {
        run_id: Some(run_id.to_string()),
        root_node_type_ref: NodeTypeRef::new("composite.echo", "0.1.0"),
        input: json!({}),
        run_context: None,
        extensions: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_create_node_runs_expected_all_children_with_unique_ids() {
    let coordinator = RunCoordinator::in_memory();
    let run = coordinator
        .start_run(start_request("run_parallel"))
        .await
        .expect("run should start");

    let mut handles = Vec::new();
    for batch in 0..8 {
        let coordinator = coordinator.clone();
        let parent = run.root_node_run_id.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .create_node_runs(CreateNodeRunsRequest {
                    run_id: "run_parallel".to_string(),
                    parent_node_run_id: parent,
                    node_runs: (0..4)
                        .map(|index| NodeRunCreateSpec {
                            node_type_ref: NodeTypeRef::new("atomic.echo", "0.1.0"),
                            inputs: json!({"batch": batch, "index": index}),
                            extensions: None,
                        })
                        .collect(),
                    extensions: None,
                })
                .await
        }));
    }

    let mut ids = BTreeSet::new();
    for handle in handles {
        let response = handle
            .await
            .expect("task should join")
            .expect("batch should be created");
        for node_run in response.node_runs {
            assert!(ids.insert(node_run.node_run_id));
        }
    }
    assert_eq!(ids.len(), 32);

    let stored = coordinator
        .store()
        .list_node_runs_for_run("run_parallel", 100)
        .await
        .expect("listing should succeed");
    assert_eq!(stored.len(), 33);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_same_node_run_expected_one_whole_update() {
    let coordinator = RunCoordinator::in_memory();
    let run = coordinator
        .start_run(start_request("run_race"))
        .await
        .expect("run should start");

    let mut handles = Vec::new();
    for writer in 0..16 {
        let coordinator = coordinator.clone();
        let node_run_id = run.root_node_run_id.clone();
        handles.push(tokio::spawn(async move {
            let state = if writer % 2 == 0 {
                NodeRunTerminalState::Succeeded
            } else {
                NodeRunTerminalState::Failed
            };
            coordinator
                .complete_node_run(
                    &node_run_id,
                    CompleteNodeRunRequest {
                        outputs: Some(json!({"writer": writer})),
                        ..CompleteNodeRunRequest::new(state)
                    },
                )
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .expect("task should join")
            .expect("completion should succeed");
    }

    let node_run = coordinator
        .get_node_run(&run.root_node_run_id)
        .await
        .expect("node run should exist");
    assert!(node_run.ended_at.is_some());
    let writer = node_run
        .outputs
        .as_ref()
        .and_then(|outputs| outputs["writer"].as_u64())
        .expect("winning writer should be recorded");
    let expected_state = if writer % 2 == 0 {
        NodeRunState::Succeeded
    } else {
        NodeRunState::Failed
    };
    assert_eq!(node_run.state, expected_state);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_under_reject_expected_single_acceptance() {
    let coordinator = RunCoordinator::new(
        Arc::new(MemoryLifecycleStore::new()),
        CoordinatorConfig::default().with_terminal_node_run_policy(TerminalNodeRunPolicy::Reject),
    );
    let run = coordinator
        .start_run(start_request("run_reject_race"))
        .await
        .expect("run should start");

    let mut handles = Vec::new();
    for writer in 0..16 {
        let coordinator = coordinator.clone();
        let node_run_id = run.root_node_run_id.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .complete_node_run(
                    &node_run_id,
                    CompleteNodeRunRequest {
                        outputs: Some(json!({"writer": writer})),
                        ..CompleteNodeRunRequest::new(NodeRunTerminalState::Succeeded)
                    },
                )
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.expect("task should join") {
            Ok(()) => accepted += 1,
            Err(error) => assert_eq!(error.code, "node_run_already_terminal"),
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn held_downstream_call_does_not_block_lifecycle_operations() {
    let executor = MockDownstream::new();
    let release = executor.hold_operation("health");
    let coordinator = RunCoordinator::in_memory().with_gateways(Gateways {
        atomic_executor: Some(AtomicExecutorGateway::new(
            "http://atomic.local",
            Arc::new(executor),
        )),
        ..Gateways::default()
    });

    let probing = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.probe_dependencies().await })
    };

    let run = tokio::time::timeout(
        Duration::from_secs(2),
        coordinator.start_run(start_request("run_live")),
    )
    .await
    .expect("start_run should not wait for the held probe")
    .expect("run should start");
    assert_eq!(run.state, arp_model::RunState::Running);
    assert!(!probing.is_finished());

    release.notify_one();
    let statuses = probing.await.expect("probe task should join");
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].healthy);
}

#[tokio::test(flavor = "current_thread")]
async fn probe_dependencies_expected_unhealthy_entry_for_failing_service() {
    let pdp = MockDownstream::new();
    pdp.fail_all(MockFailure::Transport("connection refused".to_string()));
    let coordinator = RunCoordinator::in_memory().with_gateways(Gateways {
        atomic_executor: Some(AtomicExecutorGateway::new(
            "http://atomic.local",
            Arc::new(MockDownstream::new()),
        )),
        pdp: Some(PdpGateway::new("http://pdp.local", Arc::new(pdp))),
        ..Gateways::default()
    });

    let statuses = coordinator.probe_dependencies().await;
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].healthy);
    assert!(!statuses[1].healthy);
    assert_eq!(
        statuses[1].error.as_ref().map(|error| error.code.as_str()),
        Some("pdp_unavailable")
    );

    let root = coordinator
        .start_run(start_request("run_after_probe"))
        .await
        .expect("run should start");
    assert_eq!(
        coordinator
            .get_node_run(&root.root_node_run_id)
            .await
            .expect("root should exist")
            .state,
        NodeRunState::Queued
    );
}
