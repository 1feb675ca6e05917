//! Toolscout core library: tool probing, MCP server discovery, the cached registry,
//! and the matcher behind the `toolscout` CLI.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod entry;
pub mod init;
pub mod matcher;
pub mod probe;
pub mod query;
pub mod registry;
pub mod render;
pub mod servers;

pub use entry::{ToolEntry, ToolKind};
pub use matcher::{Query, QueryMode};
pub use query::{QueryError, ToolScout};
pub use registry::Registry;
