//! Configuration, resolved once at startup from the environment.
//!
//! A `.env` file is loaded by the binary before this runs; variables
//! already set in the environment always win. The resulting value is
//! passed by reference into every component constructor.

use std::time::Duration;

use crate::error::{CuratorError, Result};

/// Worker-pool and pacing knobs for the two stages.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// How many days of source posts to pull.
    pub days_back: u32,
    /// Score at or above which a post is worth deep processing.
    pub priority_threshold: u8,
    /// How many of the highest-scoring posts enter the depth stage.
    pub top_n_posts: usize,
    /// Fast-tier worker pool size.
    pub fast_workers: usize,
    /// Pacing sleep after each collected fast-tier result.
    pub fast_delay: Duration,
    /// Smart-tier worker pool size.
    pub smart_workers: usize,
    /// Pacing sleep after each collected smart-tier result.
    pub smart_delay: Duration,
    /// Wait between consecutive smart models for one post.
    pub smart_retry_delay: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            days_back: 1,
            priority_threshold: 40,
            top_n_posts: 50,
            fast_workers: 10,
            fast_delay: Duration::from_millis(500),
            smart_workers: 2,
            smart_delay: Duration::from_secs(2),
            smart_retry_delay: Duration::from_secs(10),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fingerprint store database.
    pub learning_db_url: String,
    /// Source crawl databases; a platform without one contributes no posts.
    pub source_x_db_url: Option<String>,
    pub source_jike_db_url: Option<String>,

    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    /// Fast-tier model for priority screening.
    pub fast_model: String,
    /// Smart-tier models, in fallback preference order, deduped.
    pub smart_models: Vec<String>,
    pub max_tokens: u32,

    /// Publishing target; required only for modes that publish.
    pub notion_token: Option<String>,
    pub notion_parent_page_id: Option<String>,

    pub processing: ProcessingConfig,
}

impl Config {
    /// Read configuration from the environment. Missing required values
    /// are fatal; everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = ProcessingConfig::default();

        let processing = ProcessingConfig {
            days_back: env_parse("PROCESSING_DAYS_BACK", defaults.days_back)?,
            priority_threshold: env_parse(
                "PROCESSING_PRIORITY_THRESHOLD",
                defaults.priority_threshold,
            )?,
            top_n_posts: env_parse("PROCESSING_TOP_N_POSTS", defaults.top_n_posts)?,
            fast_workers: env_parse("PROCESSING_FAST_LLM_WORKERS", defaults.fast_workers)?,
            fast_delay: env_duration("PROCESSING_FAST_LLM_DELAY", defaults.fast_delay)?,
            smart_workers: env_parse("PROCESSING_SMART_MODEL_WORKERS", defaults.smart_workers)?,
            smart_delay: env_duration("PROCESSING_SMART_MODEL_DELAY", defaults.smart_delay)?,
            smart_retry_delay: env_duration(
                "PROCESSING_SMART_MODEL_RETRY_DELAY",
                defaults.smart_retry_delay,
            )?,
        };

        Ok(Self {
            learning_db_url: env_required("LEARNING_DB_URL")?,
            source_x_db_url: env_opt("SOURCE_X_DB_URL"),
            source_jike_db_url: env_opt("SOURCE_JIKE_DB_URL"),
            openai_api_key: env_required("OPENAI_API_KEY")?,
            openai_base_url: env_opt("OPENAI_BASE_URL"),
            fast_model: env_opt("LLM_FAST_MODEL_NAME")
                .unwrap_or_else(|| "gpt-3.5-turbo-16k".to_string()),
            smart_models: parse_model_list(&env_opt("LLM_SMART_MODELS").unwrap_or_default()),
            max_tokens: env_parse("LLM_MAX_TOKENS", 20_000)?,
            notion_token: env_opt("NOTION_INTEGRATION_TOKEN"),
            notion_parent_page_id: env_opt("NOTION_PARENT_PAGE_ID"),
            processing,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_required(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| CuratorError::Config(format!("{} not set", key)))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CuratorError::Config(format!("{} has invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    let seconds: f64 = env_parse(key, default.as_secs_f64())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(CuratorError::Config(format!(
            "{} must be a non-negative number of seconds",
            key
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Split a comma-separated model list, trimming entries and dropping
/// duplicates while preserving the first occurrence's position.
fn parse_model_list(raw: &str) -> Vec<String> {
    let mut models = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if !entry.is_empty() && !models.iter().any(|m| m == entry) {
            models.push(entry.to_string());
        }
    }
    models
}
