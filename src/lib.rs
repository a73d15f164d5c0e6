//! jarvis-client is a terminal client for the JARVIS migration intelligence
//! backend.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the client runtime: persona sessions, the HTTP request
//!   gateway, named real-time channels, agent run streams, chat and the
//!   detail panel stack.
//! - [`api`] defines the wire payloads exchanged with the backend.
//! - [`utils`] holds URL joining, the shared append-only log and tracing setup.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! parses arguments and dispatches each subcommand onto [`core`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
