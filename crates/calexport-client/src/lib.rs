//! CLI, socket client and daemon launcher
//!
//! This crate provides the `calexport` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod socket;

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use socket::SocketClient;
