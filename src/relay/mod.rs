// Relay module - streams model output to clients and captures artifacts

mod channel;
mod error;
mod lines;
mod stream;
mod types;

pub use channel::{
    ARTIFACT_CREATED, ClientChannel, MESSAGE_COMPLETE, MESSAGE_ERROR, MESSAGE_RESPONSE,
};
pub use error::RelayError;
pub use lines::LineBuffer;
pub use stream::StreamRelay;
pub use types::{ChunkRole, RelayConfig, RelayOutcome, RelaySummary, StreamChunk};
