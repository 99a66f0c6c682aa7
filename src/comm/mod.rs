// Comm module - framed TCP communication with external clients

pub mod config;
pub mod error;
pub mod handle;
pub mod protocol;
pub mod server;
pub mod types;

pub use config::CommConfig;
pub use handle::ClientHandle;
pub use server::{Comm, REQUEST_ERROR};
pub use types::{ChatTurn, ClientCommand, UserRequest};
