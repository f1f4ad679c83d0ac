//! Error types for the curation pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, CuratorError>;

/// Top-level pipeline errors.
#[derive(Debug, Error)]
pub enum CuratorError {
    /// Configuration error (missing env var, bad value)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fingerprint store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Source database failure
    #[error("Source error: {0}")]
    Source(String),

    /// Publishing failure
    #[error("Publish error: {0}")]
    Publish(String),

    /// Model gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Failures from a single model invocation through the gateway.
///
/// All variants are retried inside the gateway up to its attempt budget;
/// `Exhausted` is what callers see after the budget runs out.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Remote API rejected the request
    #[error("API error: {0}")]
    Api(String),

    /// Transport failure (connection, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Stream completed but produced no content
    #[error("model returned empty response")]
    EmptyResponse,

    /// All retry attempts failed
    #[error("model {model} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        model: String,
        attempts: u32,
        last_error: String,
    },
}

/// Failures from a single smart-model attempt in the depth stage.
///
/// `Unparseable` and `MissingFacets` are distinct classes: both fall through
/// to the next configured model, but the latter means the model produced
/// well-formed output that was structurally incomplete.
#[derive(Debug, Error)]
pub enum DepthError {
    /// No JSON object could be recovered from the model output
    #[error("could not extract a report from model output")]
    Unparseable,

    /// Report parsed but lacks required top-level facets
    #[error("report missing required facets: {0:?}")]
    MissingFacets(Vec<String>),

    /// The gateway call itself failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
