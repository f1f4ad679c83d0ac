//! Depth stage: smart-tier analysis of the top-scoring posts, with
//! multi-model fallback.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::DepthError;
use crate::extract::extract_json;
use crate::gateway::Gateway;
use crate::prompts::{compose_analysis_content, depth_prompt};
use crate::store::ProcessedStore;
use crate::types::{strip_image_markup, DepthReport, Post, ScoredPost};

/// Some creative latitude; the report is generative, not a classification.
const DEPTH_TEMPERATURE: f32 = 0.5;
/// Fewer retries per model than the fast tier; the fallback loop over
/// multiple model identities is the real retry budget here.
const DEPTH_MAX_RETRIES: u32 = 2;

/// A finished deep analysis, ready for publishing.
#[derive(Debug, Clone)]
pub struct AnalyzedReport {
    pub post: Post,
    pub report: DepthReport,
    pub model: String,
}

/// Run the selected posts through the smart tier.
///
/// Each worker tries the configured models in preference order and stops
/// at the first that yields a valid report. Posts where every model fails
/// are logged and dropped; the rest of the batch proceeds.
pub async fn run(
    posts: Vec<ScoredPost>,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    config: &Config,
) -> Vec<AnalyzedReport> {
    let total = posts.len();
    info!(total, models = ?config.smart_models, "depth stage starting");

    if config.smart_models.is_empty() {
        warn!("no smart models configured, depth stage is a no-op");
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(config.processing.smart_workers.max(1)));
    let mut in_flight = FuturesUnordered::new();

    for scored in posts {
        let semaphore = semaphore.clone();
        in_flight.push(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            analyze_one(scored, gateway, store, config).await
        });
    }

    let mut analyzed = Vec::new();
    while let Some(result) = in_flight.next().await {
        if let Some(report) = result {
            analyzed.push(report);
        }
        if !in_flight.is_empty() {
            tokio::time::sleep(config.processing.smart_delay).await;
        }
    }

    info!(analyzed = analyzed.len(), total, "depth stage finished");
    analyzed
}

async fn analyze_one(
    scored: ScoredPost,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    config: &Config,
) -> Option<AnalyzedReport> {
    let fingerprint = scored.post.fingerprint();
    info!(fingerprint = %fingerprint, score = scored.score, "deep-analyzing post");

    let clean_content = strip_image_markup(&scored.post.content);
    let interpretation = if scored.has_image {
        scored.post.image_interpretation.as_deref()
    } else {
        None
    };
    let analysis_content = compose_analysis_content(&clean_content, interpretation);
    let prompt = depth_prompt(&analysis_content);

    match try_models(&prompt, gateway, config).await {
        Ok((report, model)) => {
            if let Err(e) = store.record_depth(&fingerprint, &report, &model).await {
                warn!(fingerprint = %fingerprint, error = %e, "failed to persist depth report");
            }
            info!(fingerprint = %fingerprint, model = %model, "depth analysis complete");
            Some(AnalyzedReport {
                post: scored.post,
                report,
                model,
            })
        }
        Err(e) => {
            warn!(fingerprint = %fingerprint, error = %e, "all smart models failed for post");
            None
        }
    }
}

/// Try each configured model in order; return the first valid report and
/// the model that produced it.
async fn try_models(
    prompt: &str,
    gateway: &dyn Gateway,
    config: &Config,
) -> Result<(DepthReport, String), DepthError> {
    let models = &config.smart_models;
    let mut last_failure = DepthError::Unparseable;

    for (index, model) in models.iter().enumerate() {
        info!(model = %model, "trying smart model");

        match gateway
            .invoke(prompt, model, DEPTH_TEMPERATURE, DEPTH_MAX_RETRIES)
            .await
        {
            Ok(reply) => match extract_json(&reply.content) {
                Some(parsed) => match DepthReport::from_json(parsed) {
                    Ok(report) => return Ok((report, reply.model)),
                    Err(missing) => {
                        warn!(model = %model, missing = ?missing, "report missing required facets");
                        last_failure = DepthError::MissingFacets(missing);
                    }
                },
                None => {
                    warn!(model = %model, "could not extract a report from model output");
                    last_failure = DepthError::Unparseable;
                }
            },
            Err(e) => {
                warn!(model = %model, error = %e, "smart model invocation failed");
                last_failure = DepthError::Gateway(e);
            }
        }

        if index + 1 < models.len() {
            info!(
                wait_secs = config.processing.smart_retry_delay.as_secs_f64(),
                "waiting before next smart model"
            );
            tokio::time::sleep(config.processing.smart_retry_delay).await;
        }
    }

    Err(last_failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::store::{MemoryStore, ProcessedStore};
    use crate::testing::{scenario_config, MockGateway};
    use crate::types::{Attributes, Category, Fingerprint, Platform, PriorityResult};

    fn scored(id: &str, content: &str, has_image: bool) -> ScoredPost {
        ScoredPost {
            post: Post {
                platform: Platform::X,
                post_id: id.to_string(),
                content: content.to_string(),
                url: None,
                author: None,
                published_at: None,
                image_interpretation: has_image.then(|| "a diagram".to_string()),
            },
            score: 80,
            has_image,
        }
    }

    fn valid_report() -> String {
        serde_json::json!({
            "deconstruction": { "post_type": "tech_insight", "core_thesis": "t" },
            "internalization_and_expression_techniques": { "primary_insight": "i" },
            "reconstruction_showcase": [{ "style": "s", "content": "c", "rationale": "r" }]
        })
        .to_string()
    }

    fn partial_report() -> String {
        serde_json::json!({
            "deconstruction": { "core_thesis": "t" },
            "internalization_and_expression_techniques": {}
        })
        .to_string()
    }

    async fn seeded_store(post: &Post) -> MemoryStore {
        let store = MemoryStore::new();
        let result = PriorityResult {
            category: Category::TechInsight,
            has_image: false,
            attributes: Attributes::default(),
        };
        store.record_priority(post, &result, 80, true).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_first_model_succeeds() {
        let gateway = MockGateway::new(vec![Ok(valid_report())]);
        let config = scenario_config();
        let item = scored("1", "content", false);
        let store = seeded_store(&item.post).await;

        let out = run(vec![item], &gateway, &store, &config).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].model, "smart-a");
        assert_eq!(gateway.call_count(), 1);

        let record = store.get(&Fingerprint::new(Platform::X, "1")).unwrap();
        assert!(record.depth_report.is_some());
        assert_eq!(record.model_used.as_deref(), Some("smart-a"));
    }

    #[tokio::test]
    async fn test_fallback_on_missing_facets() {
        // First model returns a report missing a facet, second is valid;
        // the recorded model is the second one.
        let gateway = MockGateway::new(vec![Ok(partial_report()), Ok(valid_report())]);
        let config = scenario_config();
        let item = scored("1", "content", false);
        let store = seeded_store(&item.post).await;

        let out = run(vec![item], &gateway, &store, &config).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].model, "smart-b");
        assert_eq!(gateway.call_count(), 2);

        let record = store.get(&Fingerprint::new(Platform::X, "1")).unwrap();
        assert_eq!(record.model_used.as_deref(), Some("smart-b"));
        assert_eq!(
            out[0].report.core_thesis(),
            Some("t"),
            "final report is the second model's output"
        );
    }

    #[tokio::test]
    async fn test_fallback_on_gateway_failure() {
        let gateway = MockGateway::new(vec![
            Err(GatewayError::Network("down".into())),
            Ok(valid_report()),
        ]);
        let config = scenario_config();
        let item = scored("1", "content", false);
        let store = seeded_store(&item.post).await;

        let out = run(vec![item], &gateway, &store, &config).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].model, "smart-b");
    }

    #[tokio::test]
    async fn test_all_models_fail() {
        let gateway = MockGateway::new(vec![
            Ok("not json at all".to_string()),
            Ok(partial_report()),
        ]);
        let config = scenario_config();
        let item = scored("1", "content", false);
        let store = seeded_store(&item.post).await;

        let out = run(vec![item], &gateway, &store, &config).await;

        assert!(out.is_empty());
        let record = store.get(&Fingerprint::new(Platform::X, "1")).unwrap();
        assert!(record.depth_report.is_none());
    }

    #[tokio::test]
    async fn test_interpretation_included_in_prompt() {
        let gateway = MockGateway::new(vec![Ok(valid_report())]);
        let config = scenario_config();
        let item = scored("1", "post text ![img](http://x.test/1.png)", true);
        let store = seeded_store(&item.post).await;

        run(vec![item], &gateway, &store, &config).await;

        let prompts = gateway.prompts();
        assert!(prompts[0].contains("[Image visual interpretation]\na diagram"));
        // Image markup is stripped before the prompt is built.
        assert!(!prompts[0].contains("![img]"));
    }

    #[tokio::test]
    async fn test_no_models_configured() {
        let gateway = MockGateway::new(vec![]);
        let mut config = scenario_config();
        config.smart_models.clear();
        let item = scored("1", "content", false);
        let store = seeded_store(&item.post).await;

        let out = run(vec![item], &gateway, &store, &config).await;
        assert!(out.is_empty());
        assert_eq!(gateway.call_count(), 0);
    }
}
