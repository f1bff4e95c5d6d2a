//! Main Entrypoint for the Switchboard Relay
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the agent manifest and building the session state.
//! 3. Either bridging a live realtime websocket session or replaying a
//!    recorded one offline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use switchboard_core::{
    CoordinatorConfig, EventInterpreter, InMemoryTranscript, SessionState, TracingEventLog,
};
use switchboard_relay::{bridge, config::Config, manifest, replay};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "relay", version)]
#[command(about = "Realtime agent relay: event dispatch, tool calls and agent handoff")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the realtime API and serve one session
    Connect,
    /// Feed a recorded JSON Lines session through the interpreter
    Replay {
        /// Recording with one server event per line
        file: PathBuf,
        /// Also print the final transcript
        #[arg(long)]
        transcript: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded.");

    // --- 3. Agents and Session State ---
    let agents = manifest::load_agents(&config.agents_path)?;
    let session = Arc::new(
        SessionState::new(agents, config.initial_agent.as_deref())
            .context("Failed to initialize session state")?,
    );
    let coordinator_config = CoordinatorConfig {
        tool_timeout: config.tool_timeout,
    };
    info!(agent = %session.selected_agent(), "Session state ready.");

    match cli.command {
        Commands::Connect => {
            let (outbound_tx, outbound_rx) = mpsc::channel(64);
            let interpreter = Arc::new(EventInterpreter::new(
                session,
                Arc::new(InMemoryTranscript::new()),
                Arc::new(outbound_tx),
                Arc::new(TracingEventLog),
                coordinator_config,
            ));

            tokio::select! {
                result = bridge::run(&config, interpreter.clone(), outbound_rx) => {
                    if let Err(e) = &result {
                        error!(error = ?e, "Realtime session ended with an error");
                    }
                    result?;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl+C")?;
                    info!("Received shutdown signal. Shutting down...");
                    interpreter.session().teardown();
                }
            }
        }
        Commands::Replay { file, transcript } => {
            let report = replay::replay_file(&file, session, coordinator_config).await?;
            for event in &report.outbound {
                println!("{}", serde_json::to_string(event)?);
            }
            if transcript {
                for item in &report.transcript {
                    println!("{}", serde_json::to_string(item)?);
                }
            }
            info!(
                events = report.events_read,
                outbound = report.outbound.len(),
                agent = %report.selected_agent,
                "Replay complete."
            );
        }
    }

    info!("Relay has shut down.");
    Ok(())
}
