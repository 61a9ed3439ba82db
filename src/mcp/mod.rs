//! Model Context Protocol client for a single streamable HTTP tool server.

pub mod client;
pub mod protocol;
pub mod transport;

pub use client::McpSession;
