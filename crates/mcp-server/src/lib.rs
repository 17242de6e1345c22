//! Tool front end for the coordination core: a fixed registry of named,
//! schema-validated operations served over a stdio JSON-RPC transport.

pub mod schema;
pub mod server;
pub mod tools;
pub mod tracing_setup;

pub use server::McpServer;
pub use tools::ToolRegistry;

pub const SERVER_NAME: &str = "agent-coordination-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
