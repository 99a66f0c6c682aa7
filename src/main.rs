mod artifacts;
mod comm;
mod env;
mod executor;
mod hub;
mod ollama;
mod relay;

use artifacts::{ArtifactConfig, ArtifactStore};
use comm::{Comm, CommConfig};
use executor::{Executor, ExecutorConfig};
use hub::Hub;
use ollama::{OllamaClient, OllamaConfig};
use relay::{RelayConfig, StreamRelay};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt;

/// Tokio runtime with signal handling
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with high observability for dev
    fmt()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting chathub daemon...");

    // Initialize config
    let comm_config = CommConfig::from_env();
    let ollama_config = OllamaConfig::from_env();
    let executor_config = ExecutorConfig::from_env();
    let artifact_config = ArtifactConfig::from_env();

    info!(
        comm_port = comm_config.listen_port,
        model = %ollama_config.default_model,
        sandbox_enabled = executor_config.enabled,
        artifacts_dir = %artifact_config.root.display(),
        "Configuration loaded"
    );
    if !executor_config.enabled {
        warn!("Code execution is disabled; set ENABLE_CODE_EXECUTOR=true to enable it");
    }

    // Initialize comm
    let (comm, mut user_rx) = Comm::new(comm_config).await?;
    info!(addr = %comm.local_addr()?, "Comm initialized");

    // Initialize model client
    let ollama = OllamaClient::new(ollama_config)?;
    info!(model = ollama.default_model(), "Ollama client initialized");

    // Initialize executor
    let executor = Arc::new(Executor::init(executor_config));
    info!(tools = executor.tool_definitions().len(), "Executor initialized");

    // Initialize artifact store and relay
    let store = Arc::new(ArtifactStore::init(artifact_config).await?);
    let relay = StreamRelay::new(store.clone(), RelayConfig::default());
    info!(root = %store.root().display(), "Artifact store initialized");

    let hub = Hub::new(executor, store, relay, ollama);

    // Spawn comm server
    let comm_handle = tokio::spawn(async move {
        if let Err(e) = comm.run().await {
            error!(error = %e, "Comm server error");
        }
    });

    // Main loop with signal handling
    info!("Entering main loop...");

    loop {
        tokio::select! {
            // Handle user requests
            Some(req) = user_rx.recv() => {
                hub.handle_user_request(req);
            }
            // Handle Ctrl+C / SIGTERM
            _ = async {
                signal::ctrl_c().await.ok();
            } => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    // Clean up
    info!("Shutting down...");
    comm_handle.abort();

    info!("Goodbye!");
    Ok(())
}
