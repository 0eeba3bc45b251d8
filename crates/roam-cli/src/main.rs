use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use roam_db::Database;
use roam_sync::{
    ActionCoordinator, ActionOutcome, ConnectionEntry, ConnectionViewModel, Decision, EventBus,
    HttpConnectionApi, LocalCache, Notice, Session, SessionSlot, SyncConfig, SyncContext,
};
use roam_types::{ConnectionId, ConnectionStatus, ConnectionViewState, Direction, UserId};

#[derive(Parser)]
#[command(name = "roam", about = "Manage Roam connections from the terminal")]
struct Cli {
    /// Overrides ROAM_API_BASE_URL.
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the connection with a user.
    Status { user: String },
    /// Send a connection request.
    Connect { user: String },
    /// Accept a pending request from a user.
    Accept { user: String },
    /// Decline a pending request from a user.
    Reject { user: String },
    /// Withdraw a request or remove a connection.
    Remove { user: String },
    /// List accepted connections.
    Buddies,
    /// List pending requests addressed to you.
    Incoming,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roam=debug,roam_sync=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = SyncConfig::from_env();
    if let Some(api) = cli.api {
        config.api_base_url = api;
    }
    debug!("Using API at {}", config.api_base_url);

    let db = Database::open(&config.cache_path)
        .with_context(|| format!("opening cache at {}", config.cache_path.display()))?;
    let cache = LocalCache::new(Arc::new(db)).with_ttl(config.cache_ttl);

    let session = match (std::env::var("ROAM_USER_ID"), std::env::var("ROAM_TOKEN")) {
        (Ok(user), Ok(token)) => Some(Session::new(user, token)),
        _ => {
            info!("ROAM_USER_ID or ROAM_TOKEN not set; running logged out");
            None
        }
    };

    let ctx = SyncContext::new(
        Arc::new(HttpConnectionApi::new(config.api_base_url.clone())),
        EventBus::new(),
        cache,
        Arc::new(SessionSlot::new(session)),
    )
    .with_transition_delay(config.transition_delay);
    let coordinator = ActionCoordinator::new(ctx.clone());

    match cli.command {
        Command::Status { user } => {
            let vm = ConnectionViewModel::mount(&ctx, UserId::from(user), None).await;
            print_state(vm.counterpart(), &vm.state());
        }
        Command::Connect { user } => {
            let vm = ConnectionViewModel::mount(&ctx, UserId::from(user), None).await;
            report(coordinator.connect(&vm).await);
        }
        Command::Accept { user } => respond(&ctx, &coordinator, user, Decision::Accept).await,
        Command::Reject { user } => respond(&ctx, &coordinator, user, Decision::Reject).await,
        Command::Remove { user } => {
            let vm = ConnectionViewModel::mount(&ctx, UserId::from(user), None).await;
            report(coordinator.remove(&vm).await);
        }
        Command::Buddies => print_entries(&coordinator.buddies().await?),
        Command::Incoming => print_entries(&coordinator.incoming_requests().await?),
    }

    Ok(())
}

async fn respond(ctx: &SyncContext, coordinator: &ActionCoordinator, user: String, decision: Decision) {
    let vm = ConnectionViewModel::mount(ctx, UserId::from(user), None).await;
    let Some(connection_id) = incoming_request(&vm.state()) else {
        println!("No pending request from {}", vm.counterpart());
        return;
    };
    report(coordinator.respond(&vm, Some(connection_id), decision).await);
}

/// The id of a pending request addressed to the local user, if any.
fn incoming_request(state: &ConnectionViewState) -> Option<ConnectionId> {
    match (state.status, state.direction) {
        (Some(ConnectionStatus::Pending), Some(Direction::Received)) => state.connection_id.clone(),
        _ => None,
    }
}

fn report(outcome: ActionOutcome) {
    debug!("Action finished: {:?}", outcome);
    match outcome.notice() {
        Some(Notice::LoginPrompt) => println!("Log in first (set ROAM_USER_ID and ROAM_TOKEN)"),
        Some(Notice::UpgradePrompt(msg)) => println!("{} (upgrade your plan)", msg),
        Some(Notice::Info(msg)) => println!("{}", msg),
        Some(Notice::Error(msg)) => eprintln!("error: {}", msg),
        None => {}
    }
    if let ActionOutcome::Reconciled(state) = &outcome {
        println!("Current state: {}", describe(state));
    }
}

fn print_state(counterpart: &UserId, state: &ConnectionViewState) {
    println!("{}: {}", counterpart, describe(state));
}

fn describe(state: &ConnectionViewState) -> String {
    match (state.status, state.direction) {
        (Some(status), Some(direction)) => match &state.connection_id {
            Some(id) => format!("{} ({:?}, {})", status, direction, id),
            None => format!("{} ({:?})", status, direction),
        },
        (Some(status), None) => status.to_string(),
        _ => "not connected".to_string(),
    }
}

fn print_entries(entries: &[ConnectionEntry]) {
    if entries.is_empty() {
        println!("Nothing here yet");
        return;
    }
    for entry in entries {
        let name = entry
            .profile
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("-");
        println!(
            "{}\t{}\t{}\t{:?}",
            entry.counterpart, name, entry.info.status, entry.info.direction
        );
    }
}
