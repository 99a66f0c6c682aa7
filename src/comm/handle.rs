use crate::comm::protocol::encode_event;
use crate::relay::{ClientChannel, RelayError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Outbound side of one request on one connection.
///
/// Events are encoded here and queued for the connection's writer task.
/// Once the connection is gone the queue closes and `closed` resolves.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    seq: u32,
    frames: mpsc::Sender<Vec<u8>>,
}

impl ClientHandle {
    pub fn new(seq: u32, frames: mpsc::Sender<Vec<u8>>) -> Self {
        Self { seq, frames }
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_closed()
    }
}

#[async_trait]
impl ClientChannel for ClientHandle {
    async fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), RelayError> {
        let packet = encode_event(self.seq, event, &payload)
            .map_err(|e| RelayError::Encode(event.to_string(), e.to_string()))?;
        self.frames
            .send(packet)
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }

    async fn closed(&self) {
        self.frames.closed().await
    }
}
