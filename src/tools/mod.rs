//! Tool system for model-initiated function calls.

pub mod context;
pub mod registry;
pub mod tool;

pub use context::ContextRetrievalTool;
pub use registry::ToolRegistry;
pub use tool::{FunctionTool, Tool, ToolParameters};
