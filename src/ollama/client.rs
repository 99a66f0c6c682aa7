// Ollama client - HTTP communication with the model server

use super::{
    ChatMessage, ChatOptions, ChatRequest, ModelList, OllamaConfig, OllamaError, OllamaInitError,
};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Raw response body, one item per network read
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, OllamaError>>;

/// Client for the Ollama HTTP API
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(config: OllamaConfig) -> Result<Self, OllamaInitError> {
        if !config.host.starts_with("http://") && !config.host.starts_with("https://") {
            return Err(OllamaInitError::ConfigInvalid(format!(
                "OLLAMA_HOST must be an http(s) URL, got '{}'",
                config.host
            )));
        }

        info!(
            host = %config.host,
            model = %config.default_model,
            max_retries = config.max_retries,
            "initializing ollama client"
        );

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Streaming chat request with the configured sampling options
    pub fn chat_request(&self, model: Option<String>, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| self.config.default_model.clone()),
            messages,
            stream: true,
            options: ChatOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
            },
        }
    }

    /// Open a streaming chat.
    ///
    /// Opening is retried with exponential backoff; once the body starts
    /// flowing, errors surface through the stream and are not retried.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, OllamaError> {
        info!(
            model = %request.model,
            messages_count = request.messages.len(),
            "opening chat stream"
        );

        let start = Instant::now();
        let mut retries = 0;
        let max_retries = self.config.max_retries;
        let base_delay = Duration::from_millis(self.config.base_retry_delay_ms);

        loop {
            debug!(retry = retries, "sending chat request to ollama");
            match self.open_stream(request).await {
                Ok(stream) => {
                    info!(
                        model = %request.model,
                        latency_ms = start.elapsed().as_millis() as u64,
                        retries = retries,
                        "chat stream opened"
                    );
                    return Ok(stream);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(error = %e, "chat request rejected");
                    return Err(e);
                }
                Err(e) => {
                    retries += 1;
                    if retries > max_retries {
                        error!(
                            retries = retries,
                            total_latency_ms = start.elapsed().as_millis(),
                            error = %e,
                            "opening chat stream failed: exhausted retries"
                        );
                        return Err(OllamaError::Exhausted {
                            retries,
                            last_error: e.to_string(),
                        });
                    }

                    let multiplier = 2u64.saturating_pow(retries - 1);
                    let delay_ms = base_delay.as_millis() as u64 * multiplier;
                    let delay = Duration::from_millis(delay_ms.min(30000));

                    warn!(
                        retry = retries,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "opening chat stream failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, OllamaError> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        debug!(url = %url, "sending HTTP request");

        let response = self.client.post(&url).json(request).send().await?;
        let response = check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(OllamaError::from))
            .boxed())
    }

    /// Installed models
    pub async fn list_models(&self) -> Result<ModelList, OllamaError> {
        let url = format!("{}/api/tags", self.config.host.trim_end_matches('/'));
        debug!(url = %url, "listing models");

        let response = self.client.get(&url).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        let models: ModelList = serde_json::from_str(&body)?;

        info!(model_count = models.models.len(), "models listed");
        Ok(models)
    }
}

/// Map non-success statuses to typed errors
async fn check_status(response: Response) -> Result<Response, OllamaError> {
    let status = response.status();
    debug!(status = status.as_u16(), "received HTTP response");

    if status.is_success() {
        Ok(response)
    } else if status.as_u16() == 404 {
        Err(OllamaError::ModelNotFound(
            response.text().await.unwrap_or_default(),
        ))
    } else if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        Err(OllamaError::Server(format!("HTTP {}: {}", status, body)))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(OllamaError::InvalidRequest(format!(
            "HTTP {}: {}",
            status, body
        )))
    }
}
