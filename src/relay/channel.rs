// Outbound client channel abstraction

use crate::relay::error::RelayError;
use async_trait::async_trait;

/// Incremental content: one upstream fragment, forwarded verbatim
pub const MESSAGE_RESPONSE: &str = "messageResponse";
/// A candidate was persisted; payload is the artifact record
pub const ARTIFACT_CREATED: &str = "artifactCreated";
/// Upstream closed normally
pub const MESSAGE_COMPLETE: &str = "messageComplete";
/// Upstream failed; sent at most once and ends the relay
pub const MESSAGE_ERROR: &str = "messageError";

/// Live channel to one connected client
#[async_trait]
pub trait ClientChannel: Send + Sync {
    /// Deliver one named event; fails once the client is gone
    async fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), RelayError>;

    /// Resolves when the client disconnects
    async fn closed(&self);
}
