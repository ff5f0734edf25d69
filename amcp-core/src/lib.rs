//! # amcp-core
//!
//! Client library for line-oriented AMCP-style control servers.
//!
//! This crate contains:
//! - **Connection**: `Connection`, the reconnecting facade for sending commands
//! - **Reply**: `Reply` / `BlockingLines`, per-command result streams
//! - **Connectivity**: `Connectivity`, a distinct-until-changed health stream
//! - **Protocol**: status-code framing rules and the `Version` reply
//! - **Codec**: `LineCodec` for CRLF framed TCP I/O via `tokio_util`
//! - **Network**: `Transport` and the non-blocking liveness probe
//! - **Error**: `AmcpError`, a typed `thiserror`-based error hierarchy

pub mod codec;
pub mod config;
pub mod connection;
pub mod connectivity;
pub mod error;
pub mod network;
pub mod protocol;
pub mod reply;

mod reconnect;
mod scheduler;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{LineCodec, MAX_LINE_LENGTH};
pub use config::ConnectionOptions;
pub use connection::Connection;
pub use connectivity::Connectivity;
pub use error::{AmcpError, Result};
pub use network::{Endpoint, Liveness, Transport};
pub use protocol::{DEFAULT_PORT, Framing, ProtocolFailure, StatusCode, Version};
pub use reply::{BlockingLines, Reply};
