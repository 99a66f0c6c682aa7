use crate::comm::handle::ClientHandle;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Message types for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Client → hub: client sends a request
    Request = 0x01,
    /// Hub → client: request accepted, events follow
    RequestAck = 0x02,
    /// Hub → client: one named event for a request
    Event = 0x03,
}

impl MsgType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::RequestAck),
            0x03 => Some(Self::Event),
            _ => None,
        }
    }
}

/// One conversation turn as sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Request payload from client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientCommand {
    /// Stream a model reply; `model` falls back to the configured default
    Chat {
        model: Option<String>,
        messages: Vec<ChatTurn>,
    },
    /// Run a snippet in the sandbox
    Execute { language: String, code: String },
    /// Invoke a registered tool; `input` is JSON text
    CallTool { name: String, input: String },
    ListTools,
    ListModels,
    ListArtifacts,
    GetArtifact { id: String },
    DeleteArtifact { id: String },
}

impl ClientCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Execute { .. } => "execute",
            Self::CallTool { .. } => "call_tool",
            Self::ListTools => "list_tools",
            Self::ListModels => "list_models",
            Self::ListArtifacts => "list_artifacts",
            Self::GetArtifact { .. } => "get_artifact",
            Self::DeleteArtifact { .. } => "delete_artifact",
        }
    }
}

/// Event payload from the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Event name
    pub event: String,
    /// Event body as JSON text
    pub data: String,
}

/// Request sent from Comm to the hub
#[derive(Debug)]
pub struct UserRequest {
    /// Client sequence number; events for this request carry it
    pub seq: u32,
    /// Decoded command
    pub command: ClientCommand,
    /// Channel back to the originating connection
    pub channel: ClientHandle,
    /// Client source address
    pub source_addr: SocketAddr,
}
