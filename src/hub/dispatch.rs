// Request dispatch

use super::error::HubError;
use super::types::{
    ARTIFACT, ARTIFACT_DELETED, ARTIFACTS, EXECUTION_RESULT, MODELS, TOOL_RESULT, TOOLS,
};
use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::comm::{ChatTurn, ClientCommand, REQUEST_ERROR, UserRequest};
use crate::executor::Executor;
use crate::ollama::{ChatMessage, OllamaClient};
use crate::relay::{ClientChannel, MESSAGE_ERROR, RelayOutcome, StreamRelay};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Routes each client command to the component that serves it
#[derive(Clone)]
pub struct Hub {
    executor: Arc<Executor>,
    store: Arc<ArtifactStore>,
    relay: StreamRelay,
    ollama: OllamaClient,
}

impl Hub {
    pub fn new(
        executor: Arc<Executor>,
        store: Arc<ArtifactStore>,
        relay: StreamRelay,
        ollama: OllamaClient,
    ) -> Self {
        Self {
            executor,
            store,
            relay,
            ollama,
        }
    }

    /// Serve one request on its own task
    pub fn handle_user_request(&self, req: UserRequest) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let command = req.command.name();
            info!(
                addr = %req.source_addr,
                seq = req.seq,
                command = command,
                "Handling user request"
            );

            let start = Instant::now();
            let channel: Arc<dyn ClientChannel> = Arc::new(req.channel);

            if let Err(e) = hub.handle(req.command, channel.clone()).await {
                warn!(seq = req.seq, command = command, error = %e, "Request failed");
                if let Err(e) = channel
                    .emit(REQUEST_ERROR, json!({ "error": e.to_string() }))
                    .await
                {
                    debug!(seq = req.seq, error = %e, "Error event not delivered");
                }
            }

            debug!(
                seq = req.seq,
                command = command,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request finished"
            );
        })
    }

    /// Serve one command, replying on `channel`
    pub async fn handle(
        &self,
        command: ClientCommand,
        channel: Arc<dyn ClientChannel>,
    ) -> Result<(), HubError> {
        match command {
            ClientCommand::Chat { model, messages } => self.chat(model, messages, channel).await,
            ClientCommand::Execute { language, code } => {
                let result = self.executor.sandbox().execute(&language, &code).await;
                channel
                    .emit(EXECUTION_RESULT, serde_json::to_value(&result)?)
                    .await?;
                Ok(())
            }
            ClientCommand::CallTool { name, input } => {
                let input: serde_json::Value = serde_json::from_str(&input).map_err(|e| {
                    HubError::InvalidRequest(format!("tool input is not JSON: {}", e))
                })?;
                let output = self.executor.execute(&name, input).await?;
                channel
                    .emit(
                        TOOL_RESULT,
                        json!({
                            "name": name,
                            "content": output.content,
                            "isError": output.is_error,
                        }),
                    )
                    .await?;
                Ok(())
            }
            ClientCommand::ListTools => {
                let tools = self.executor.tool_definitions();
                channel.emit(TOOLS, serde_json::to_value(&tools)?).await?;
                Ok(())
            }
            ClientCommand::ListModels => {
                let models = self.ollama.list_models().await?;
                channel.emit(MODELS, serde_json::to_value(&models)?).await?;
                Ok(())
            }
            ClientCommand::ListArtifacts => {
                let artifacts = self.store.list().await?;
                channel
                    .emit(ARTIFACTS, serde_json::to_value(&artifacts)?)
                    .await?;
                Ok(())
            }
            ClientCommand::GetArtifact { id } => {
                let artifact = self
                    .store
                    .get(&id)
                    .await?
                    .ok_or(ArtifactError::NotFound(id))?;
                channel
                    .emit(ARTIFACT, serde_json::to_value(&artifact)?)
                    .await?;
                Ok(())
            }
            ClientCommand::DeleteArtifact { id } => {
                let deleted = self.store.delete(&id).await?;
                channel
                    .emit(ARTIFACT_DELETED, json!({ "id": id, "deleted": deleted }))
                    .await?;
                Ok(())
            }
        }
    }

    async fn chat(
        &self,
        model: Option<String>,
        messages: Vec<ChatTurn>,
        channel: Arc<dyn ClientChannel>,
    ) -> Result<(), HubError> {
        if messages.is_empty() {
            return Err(HubError::InvalidRequest(
                "chat needs at least one message".to_string(),
            ));
        }

        let messages = messages
            .into_iter()
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content,
            })
            .collect();
        let request = self.ollama.chat_request(model, messages);

        let upstream = match self.ollama.chat_stream(&request).await {
            Ok(upstream) => upstream,
            Err(e) => {
                // Same terminal event a mid-stream failure produces
                error!(model = %request.model, error = %e, "Failed to open chat stream");
                channel
                    .emit(MESSAGE_ERROR, json!({ "error": e.to_string() }))
                    .await?;
                return Ok(());
            }
        };

        match self.relay.relay(upstream, channel).await {
            RelayOutcome::Completed(summary) => {
                info!(
                    model = %request.model,
                    fragments = summary.fragments,
                    artifacts = summary.artifacts,
                    "Chat completed"
                );
            }
            RelayOutcome::Failed(e) => warn!(model = %request.model, error = %e, "Chat failed"),
            RelayOutcome::Disconnected => info!(model = %request.model, "Chat abandoned"),
        }
        Ok(())
    }
}
