use arp_coordinator::{
    CoordinatorConfig, LifecycleEvent, LifecycleEventKind, LifecycleEventSink, RunCoordinator,
    lifecycle_event_channel,
};
use arp_model::{
    CompleteNodeRunRequest, CreateNodeRunsRequest, ErrorPayload, NodeRunCreateSpec,
    NodeRunTerminalState, NodeTypeRef, StartRunRequest, encode_ndjson,
};
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "arp-coordinator")]
#[command(about = "In-process host for the ARP run coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Health,
    Version,
    Smoke(SmokeArgs),
    Events(EventsArgs),
    Probe,
}

#[derive(clap::Args, Debug)]
struct SmokeArgs {
    #[arg(long, default_value = "run_1")]
    run_id: String,
    #[arg(long)]
    state_dir: Option<PathBuf>,
    #[arg(long = "no-stream-events", action = ArgAction::SetTrue)]
    no_stream_events: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    event_json: bool,
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["run_id", "node_run_id"])))]
struct EventsArgs {
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    node_run_id: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match load_config() {
        Ok(config) => match cli.command {
            Commands::Health => health_command(config),
            Commands::Version => version_command(config),
            Commands::Smoke(args) => smoke_command(config, args).await,
            Commands::Events(args) => events_command(config, args).await,
            Commands::Probe => probe_command(config).await,
        },
        Err(error) => Err(error),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config() -> Result<CoordinatorConfig, String> {
    let config = CoordinatorConfig::from_env().map_err(|error| error.to_string())?;
    tracing::debug!(?config, "loaded coordinator config");
    Ok(config)
}

fn open_coordinator(config: CoordinatorConfig) -> Result<RunCoordinator, String> {
    RunCoordinator::from_config(config).map_err(|error| error.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{json}");
    Ok(())
}

fn health_command(config: CoordinatorConfig) -> Result<ExitCode, String> {
    let coordinator = open_coordinator(config)?;
    print_json(&coordinator.health())?;
    Ok(ExitCode::SUCCESS)
}

fn version_command(config: CoordinatorConfig) -> Result<ExitCode, String> {
    let coordinator = open_coordinator(config)?;
    print_json(&coordinator.version())?;
    Ok(ExitCode::SUCCESS)
}

/// Runs the echo scenario: root composite run, one atomic child, failed with `boom`.
async fn smoke_command(config: CoordinatorConfig, args: SmokeArgs) -> Result<ExitCode, String> {
    let config = match args.state_dir {
        Some(state_dir) => config.with_state_dir(state_dir),
        None => config,
    };
    let (event_sink, event_task) = event_stream(!args.no_stream_events, args.event_json);
    let coordinator = open_coordinator(config)?.with_event_sink(event_sink);

    let run = coordinator
        .start_run(StartRunRequest {
            run_id: Some(args.run_id),
            root_node_type_ref: NodeTypeRef::new("composite.echo", "0.1.0"),
            input: json!({"prompt": "test"}),
            run_context: None,
            extensions: None,
        })
        .await
        .map_err(|error| error.to_string())?;

    let created = coordinator
        .create_node_runs(CreateNodeRunsRequest {
            run_id: run.run_id.clone(),
            parent_node_run_id: run.root_node_run_id.clone(),
            node_runs: vec![NodeRunCreateSpec {
                node_type_ref: NodeTypeRef::new("atomic.echo", "0.1.0"),
                inputs: json!({"ping": "pong"}),
                extensions: None,
            }],
            extensions: None,
        })
        .await
        .map_err(|error| error.to_string())?;
    let child_id = created
        .node_runs
        .first()
        .map(|node_run| node_run.node_run_id.clone())
        .ok_or_else(|| "no node run was created".to_string())?;

    coordinator
        .complete_node_run(
            &child_id,
            CompleteNodeRunRequest {
                error: Some(ErrorPayload::new("boom", "failure")),
                ..CompleteNodeRunRequest::new(NodeRunTerminalState::Failed)
            },
        )
        .await
        .map_err(|error| error.to_string())?;

    let run = coordinator
        .get_run(&run.run_id)
        .await
        .map_err(|error| error.to_string())?;
    let child = coordinator
        .get_node_run(&child_id)
        .await
        .map_err(|error| error.to_string())?;

    drop(coordinator);
    if let Some(task) = event_task {
        task.await.map_err(|error| error.to_string())?;
    }

    println!("run_id: {}", run.run_id);
    println!("run_state: {}", run.state);
    println!("root_node_run_id: {}", run.root_node_run_id);
    println!("node_run_id: {}", child.node_run_id);
    println!("node_run_state: {}", child.state);
    println!(
        "completion_error_code: {}",
        child
            .completion_error()
            .and_then(|error| error.get("code"))
            .and_then(|code| code.as_str())
            .unwrap_or("<none>")
    );
    Ok(ExitCode::SUCCESS)
}

async fn events_command(config: CoordinatorConfig, args: EventsArgs) -> Result<ExitCode, String> {
    let coordinator = open_coordinator(config)?;
    let encoded = match (args.run_id, args.node_run_id) {
        (Some(run_id), _) => {
            let records = coordinator
                .stream_run_events(&run_id)
                .await
                .map_err(|error| error.to_string())?;
            encode_ndjson(&records)
        }
        (None, Some(node_run_id)) => {
            let records = coordinator
                .stream_node_run_events(&node_run_id)
                .await
                .map_err(|error| error.to_string())?;
            encode_ndjson(&records)
        }
        (None, None) => return Err("one of --run-id or --node-run-id is required".to_string()),
    }
    .map_err(|error| error.to_string())?;
    print!("{encoded}");
    Ok(ExitCode::SUCCESS)
}

async fn probe_command(config: CoordinatorConfig) -> Result<ExitCode, String> {
    let coordinator = open_coordinator(config)?;
    let statuses = coordinator.probe_dependencies().await;
    print_json(&statuses)?;
    if statuses.iter().all(|status| status.healthy) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

fn event_stream(
    stream_events: bool,
    event_json: bool,
) -> (LifecycleEventSink, Option<tokio::task::JoinHandle<()>>) {
    if !stream_events {
        return (LifecycleEventSink::default(), None);
    }

    let (tx, mut rx) = lifecycle_event_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event_json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(_) => print_event_text(&event),
                }
            } else {
                print_event_text(&event);
            }
        }
    });
    (LifecycleEventSink::with_sender(tx), Some(task))
}

fn print_event_text(event: &LifecycleEvent) {
    println!(
        "[event seq={}] {} {}",
        event.sequence_no,
        event.timestamp.to_rfc3339(),
        event_kind_label(&event.kind)
    );
}

fn event_kind_label(kind: &LifecycleEventKind) -> &'static str {
    match kind {
        LifecycleEventKind::RunStarted { .. } => "run_started",
        LifecycleEventKind::RunCanceled { .. } => "run_canceled",
        LifecycleEventKind::NodeRunsCreated { .. } => "node_runs_created",
        LifecycleEventKind::NodeRunEvaluated { .. } => "node_run_evaluated",
        LifecycleEventKind::NodeRunCompleted { .. } => "node_run_completed",
    }
}
