use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A DevTools command or page script failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// There is no page to act on. Callers treat this as fatal for the turn.
    #[error("No active page: {0}")]
    NoActivePage(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Structural failures abort the whole turn instead of being reported
    /// back to the caller as a tool response.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::NoActivePage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
