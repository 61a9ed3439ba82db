//! toolchat is a line-oriented terminal chat client whose model can call
//! tools served by a Model Context Protocol (MCP) server.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns configuration, error types, message construction, the tool
//!   registry, and the conversation session that orchestrates tool calls.
//! - [`api`] defines chat-completion payloads and the HTTP completion client.
//! - [`mcp`] speaks MCP over streamable HTTP to list and invoke tools.
//! - [`cli`] parses arguments and runs the interactive loop and one-shot
//!   commands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod mcp;
pub mod utils;
