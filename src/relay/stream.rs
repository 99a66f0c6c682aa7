// Streaming relay: upstream model output to one client, with artifact capture

use crate::artifacts::{ArtifactStore, CandidateArtifact, extract};
use crate::relay::channel::{
    ARTIFACT_CREATED, ClientChannel, MESSAGE_COMPLETE, MESSAGE_ERROR, MESSAGE_RESPONSE,
};
use crate::relay::error::RelayError;
use crate::relay::lines::LineBuffer;
use crate::relay::types::{RelayConfig, RelayOutcome, RelaySummary, StreamChunk};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Forwards a newline-delimited JSON stream to a client channel.
///
/// Artifact saves never block forwarding: each runs on its own task and
/// announces itself with `artifactCreated` when the write lands.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    store: Arc<ArtifactStore>,
    config: RelayConfig,
}

/// Per-relay mutable state
struct RelayState {
    lines: LineBuffer,
    saves: JoinSet<()>,
    accumulated: String,
    summary: RelaySummary,
}

impl StreamRelay {
    pub fn new(store: Arc<ArtifactStore>, config: RelayConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Relay `upstream` to `channel` until it ends, fails, or the client leaves
    pub async fn relay<S, B, E>(&self, upstream: S, channel: Arc<dyn ClientChannel>) -> RelayOutcome
    where
        S: Stream<Item = Result<B, E>> + Send,
        B: AsRef<[u8]> + Send,
        E: Display + Send,
    {
        let start = Instant::now();
        let mut state = RelayState {
            lines: LineBuffer::new(self.config.max_line_bytes),
            saves: JoinSet::new(),
            accumulated: String::new(),
            summary: RelaySummary::default(),
        };
        tokio::pin!(upstream);

        loop {
            tokio::select! {
                _ = channel.closed() => {
                    return self.abandon(&mut state);
                }
                item = upstream.next() => match item {
                    Some(Ok(chunk)) => {
                        for line in state.lines.push(chunk.as_ref()) {
                            if self.handle_line(&line, &channel, &mut state).await.is_err() {
                                return self.abandon(&mut state);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let message = e.to_string();
                        warn!(error = %message, fragments = state.summary.fragments, "upstream stream failed");
                        if let Err(err) = channel.emit(MESSAGE_ERROR, json!({ "error": message })).await {
                            debug!(error = %err, "error event not delivered");
                        }
                        // In-flight saves finish on their own
                        state.saves.detach_all();
                        return RelayOutcome::Failed(message);
                    }
                    None => break,
                },
                Some(joined) = state.saves.join_next(), if !state.saves.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "artifact save task panicked");
                    }
                }
            }
        }

        if let Some(line) = state.lines.finish() {
            if self.handle_line(&line, &channel, &mut state).await.is_err() {
                return self.abandon(&mut state);
            }
        }

        if channel.emit(MESSAGE_COMPLETE, json!({})).await.is_err() {
            return self.abandon(&mut state);
        }

        // Notifications for saves still in flight follow the completion event
        while let Some(joined) = state.saves.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "artifact save task panicked");
            }
        }

        state.summary.skipped += state.lines.dropped();
        state.summary.content = std::mem::take(&mut state.accumulated);

        info!(
            fragments = state.summary.fragments,
            skipped = state.summary.skipped,
            artifacts = state.summary.artifacts,
            content_chars = state.summary.content.chars().count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "relay completed"
        );

        RelayOutcome::Completed(state.summary)
    }

    /// Parse and forward one record; errors only when the client is gone
    async fn handle_line(
        &self,
        line: &str,
        channel: &Arc<dyn ClientChannel>,
        state: &mut RelayState,
    ) -> Result<(), RelayError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let fragment: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                state.summary.skipped += 1;
                warn!(error = %e, line_bytes = line.len(), "skipping malformed fragment");
                return Ok(());
            }
        };

        let chunk = StreamChunk::from_fragment(&fragment);
        channel.emit(MESSAGE_RESPONSE, fragment).await?;
        state.summary.fragments += 1;

        if chunk.content_delta.is_empty() {
            return Ok(());
        }
        state.accumulated.push_str(&chunk.content_delta);

        // Scan the delta alone; earlier text was scanned when it arrived
        for candidate in extract(&chunk.content_delta) {
            debug!(name = %candidate.name, detector = ?candidate.detector, "artifact candidate");
            state.summary.artifacts += 1;
            state
                .saves
                .spawn(save_and_announce(self.store.clone(), candidate, channel.clone()));
        }

        Ok(())
    }

    fn abandon(&self, state: &mut RelayState) -> RelayOutcome {
        info!(
            fragments = state.summary.fragments,
            pending_saves = state.saves.len(),
            "client disconnected, abandoning relay"
        );
        state.saves.detach_all();
        state.accumulated.clear();
        RelayOutcome::Disconnected
    }
}

/// Persist one candidate and tell the client about it
async fn save_and_announce(
    store: Arc<ArtifactStore>,
    candidate: CandidateArtifact,
    channel: Arc<dyn ClientChannel>,
) {
    let artifact = match store
        .save(
            candidate.content,
            &candidate.name,
            candidate.kind,
            Some(candidate.mime_type.as_str()),
        )
        .await
    {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(name = %candidate.name, error = %e, "failed to save artifact");
            return;
        }
    };

    let payload = match serde_json::to_value(artifact.without_content()) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(id = %artifact.id, error = %e, "failed to encode artifact");
            return;
        }
    };

    if let Err(e) = channel.emit(ARTIFACT_CREATED, payload).await {
        debug!(id = %artifact.id, error = %e, "artifact notification dropped");
    }
}
