//! Priority stage: fast-tier screening of the full post batch.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::extract::extract_json;
use crate::gateway::Gateway;
use crate::prompts::priority_prompt;
use crate::score::priority_score;
use crate::store::ProcessedStore;
use crate::types::{strip_image_markup, Post, PriorityResult, ScoredPost};

/// Classification asks for a deterministic pick, not creativity.
const FAST_TEMPERATURE: f32 = 0.1;
const FAST_MAX_RETRIES: u32 = 3;

/// Run the batch through the fast tier.
///
/// Every scored post is persisted (upsert by fingerprint); only posts at
/// or above the threshold are returned. Output order is completion order;
/// the caller ranks and truncates to top-N.
pub async fn run(
    posts: Vec<Post>,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    config: &Config,
) -> Vec<ScoredPost> {
    let total = posts.len();
    info!(total, "priority stage starting");

    let semaphore = Arc::new(Semaphore::new(config.processing.fast_workers.max(1)));
    let mut in_flight = FuturesUnordered::new();

    for post in posts {
        let semaphore = semaphore.clone();
        in_flight.push(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            score_one(post, gateway, store, config).await
        });
    }

    let mut worth_processing = Vec::new();
    while let Some(result) = in_flight.next().await {
        if let Some(scored) = result {
            worth_processing.push(scored);
        }
        // Pace downstream consumption regardless of pool size.
        if !in_flight.is_empty() {
            tokio::time::sleep(config.processing.fast_delay).await;
        }
    }

    info!(
        worth = worth_processing.len(),
        total, "priority stage finished"
    );
    worth_processing
}

async fn score_one(
    post: Post,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    config: &Config,
) -> Option<ScoredPost> {
    let fingerprint = post.fingerprint();
    info!(fingerprint = %fingerprint, "scoring post");

    let prompt = priority_prompt(&post.content);
    let reply = match gateway
        .invoke(&prompt, &config.fast_model, FAST_TEMPERATURE, FAST_MAX_RETRIES)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(fingerprint = %fingerprint, error = %e, "priority classification failed, skipping post");
            return None;
        }
    };

    let Some(parsed) = extract_json(&reply.content) else {
        warn!(fingerprint = %fingerprint, "could not parse classifier output, skipping post");
        return None;
    };

    let result = PriorityResult::from_json(&parsed);
    let clean_length = strip_image_markup(&post.content).chars().count();
    let score = priority_score(&result, clean_length);
    let is_worth = score >= config.processing.priority_threshold;

    info!(
        fingerprint = %fingerprint,
        score,
        category = %result.category,
        is_worth,
        "post scored"
    );

    if let Err(e) = store.record_priority(&post, &result, score, is_worth).await {
        warn!(fingerprint = %fingerprint, error = %e, "failed to persist priority result");
    }

    is_worth.then(|| ScoredPost {
        has_image: result.has_image,
        post,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{scenario_config, MockGateway};
    use crate::types::Platform;

    fn post(id: &str, content: &str) -> Post {
        Post {
            platform: Platform::X,
            post_id: id.to_string(),
            content: content.to_string(),
            url: None,
            author: None,
            published_at: None,
            image_interpretation: None,
        }
    }

    fn classifier_reply(category: &str, has_image: u8, all_attrs: u8) -> String {
        format!(
            r#"{{"post_category": "{}", "has_image": {}, "attributes": {{
                "has_unique_insight": {a}, "is_inspirational": {a},
                "is_well_written": {a}, "is_debatable": {a}
            }}}}"#,
            category,
            has_image,
            a = all_attrs
        )
    }

    #[tokio::test]
    async fn test_scenario_maximum_score() {
        // Tier-A category, all attributes, image, long content: 100.
        let gateway = MockGateway::new(vec![Ok(classifier_reply("tech_insight", 1, 1))]);
        let store = MemoryStore::new();
        let config = scenario_config();

        let long_content = "x".repeat(250);
        let out = run(vec![post("1", &long_content)], &gateway, &store, &config).await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, 100);
        assert!(out[0].has_image);

        let record = store
            .get(&crate::types::Fingerprint::new(Platform::X, "1"))
            .unwrap();
        assert_eq!(record.score, 100);
        assert!(record.is_worth_processing);
    }

    #[tokio::test]
    async fn test_scenario_zero_score_excluded() {
        let gateway = MockGateway::new(vec![Ok(classifier_reply("other", 0, 0))]);
        let store = MemoryStore::new();
        let config = scenario_config();

        let out = run(vec![post("1", "short post")], &gateway, &store, &config).await;

        assert!(out.is_empty());
        // Persisted anyway, as discarded.
        let record = store
            .get(&crate::types::Fingerprint::new(Platform::X, "1"))
            .unwrap();
        assert_eq!(record.score, 0);
        assert!(!record.is_worth_processing);
    }

    #[tokio::test]
    async fn test_gateway_failure_skips_without_persisting() {
        let gateway = MockGateway::new(vec![Err(crate::error::GatewayError::EmptyResponse)]);
        let store = MemoryStore::new();
        let config = scenario_config();

        let out = run(vec![post("1", "content")], &gateway, &store, &config).await;

        assert!(out.is_empty());
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_resilience() {
        // 10 posts, one classifier failure: 9 results, batch completes.
        let mut replies = Vec::new();
        for i in 0..10 {
            if i == 3 {
                replies.push(Err(crate::error::GatewayError::Network("down".into())));
            } else {
                replies.push(Ok(classifier_reply("tech_insight", 0, 1)));
            }
        }
        let gateway = MockGateway::new(replies);
        let store = MemoryStore::new();
        let config = scenario_config();

        let posts: Vec<Post> = (0..10).map(|i| post(&i.to_string(), "content")).collect();
        let out = run(posts, &gateway, &store, &config).await;

        assert_eq!(out.len(), 9);
        assert_eq!(store.record_count(), 9);
    }

    #[tokio::test]
    async fn test_idempotent_rerun() {
        let reply = classifier_reply("personal_reflection", 0, 0);
        let gateway = MockGateway::new(vec![Ok(reply.clone()), Ok(reply)]);
        let store = MemoryStore::new();
        let mut config = scenario_config();
        config.processing.priority_threshold = 5;

        run(vec![post("1", "content")], &gateway, &store, &config).await;
        let first = store
            .get(&crate::types::Fingerprint::new(Platform::X, "1"))
            .unwrap();

        run(vec![post("1", "content")], &gateway, &store, &config).await;
        let second = store
            .get(&crate::types::Fingerprint::new(Platform::X, "1"))
            .unwrap();

        assert_eq!(store.record_count(), 1);
        assert_eq!(first.score, second.score);
        assert_eq!(first.is_worth_processing, second.is_worth_processing);
    }

    #[tokio::test]
    async fn test_unparseable_output_skips_post() {
        let gateway = MockGateway::new(vec![Ok("I cannot classify this post.".to_string())]);
        let store = MemoryStore::new();
        let config = scenario_config();

        let out = run(vec![post("1", "content")], &gateway, &store, &config).await;
        assert!(out.is_empty());
        assert_eq!(store.record_count(), 0);
    }
}
