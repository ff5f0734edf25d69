//! # amcp-console: interactive AMCP console
//!
//! Reads commands from stdin, sends them over one reconnecting
//! [`amcp_core::Connection`] and prints each reply.

pub mod config;
pub mod console;
