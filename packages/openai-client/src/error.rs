//! Error surface shared by the blocking and streaming chat paths.

use thiserror::Error;

/// Result type for chat completion calls.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// Failures talking to an OpenAI-compatible chat endpoint.
///
/// The same variants cover both `chat` and `chat_stream`: a stream that
/// dies mid-response surfaces as [`OpenAIError::Network`], a chunk that
/// is not valid SSE JSON as [`OpenAIError::Parse`].
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Client built without an API key
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure before or during the response (connect, timeout, dropped stream)
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status (rate limit, bad request, upstream fault)
    #[error("API error: {0}")]
    Api(String),

    /// Response body or stream chunk did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}
