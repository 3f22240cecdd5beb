pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{ActionConfig, AgentConfig, BrowserConfig, Config};
pub use error::{Error, Result};
pub use paths::Paths;
pub use types::{MessageType, ToolCallRecord, ToolCallRequest};
