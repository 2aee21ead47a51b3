//! ndom-server
//!
//! Multi-client async TCP host for a networked DOM document.

pub mod config;
pub mod document;
pub mod framing;
pub mod server;
pub mod types;

// these are internal modules, not re-exported
mod client;
mod hub;

pub use config::Config;
pub use server::{start, start_with_listener, Server};
pub use types::{ClientEvent, ClientId, HubCommand, HubTx};
