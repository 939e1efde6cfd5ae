pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod state;
mod timer;

pub use audiojones_protocol as protocol;
pub use client::{ClientError, RemoteClient};
pub use config::ClientConfig;
pub use dispatcher::CommandDispatcher;
pub use state::{ConnectionStatus, Meter, StateModel};
