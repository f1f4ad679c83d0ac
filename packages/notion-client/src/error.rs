//! Error types for the Notion client.

use thiserror::Error;

/// Result type for Notion client operations.
pub type Result<T> = std::result::Result<T, NotionError>;

/// Notion client errors.
#[derive(Debug, Error)]
pub enum NotionError {
    /// Configuration error (missing token or parent page)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response)
    #[error("Notion API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}
