//! Scheduled content-curation pipeline.
//!
//! Pulls recent posts from platform crawl databases, screens them with a
//! fast model, deep-analyzes the highest-scoring ones with a smart model
//! (falling back across configured models), and publishes the resulting
//! reports to a dated Notion hierarchy. Every post's state lives in a
//! fingerprint store keyed by (platform, post id), so reruns are
//! idempotent.

pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod pipeline;
pub mod prompts;
pub mod publish;
pub mod score;
pub mod sources;
pub mod stages;
pub mod store;
pub mod testing;
pub mod types;

pub use config::Config;
pub use error::{CuratorError, Result};
