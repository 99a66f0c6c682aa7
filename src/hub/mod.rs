// Hub module - routes client commands to the executor, relay and artifact store

pub mod dispatch;
pub mod error;
pub mod types;

pub use dispatch::Hub;
pub use error::HubError;
