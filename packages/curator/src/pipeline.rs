//! Task orchestration: the three run modes over the shared stages.
//!
//! A post moves one way through the store: scored, then either discarded
//! or worth processing, then analyzed, then published. Priority writes are
//! idempotent upserts, so an interrupted run resumes by simply running the
//! task again.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::publish::Publisher;
use crate::sources::SourceReader;
use crate::stages::{depth, priority, AnalyzedReport};
use crate::store::ProcessedStore;
use crate::types::{DepthReport, Fingerprint, Platform, Post, ProcessingRecord, ScoredPost};

/// Full pipeline: fetch, score, rank, analyze, publish.
pub async fn run_daily(
    sources: &SourceReader,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    publisher: Option<&Publisher>,
    config: &Config,
) -> Result<()> {
    let posts = sources
        .fetch_unprocessed(store, config.processing.days_back)
        .await?;
    if posts.is_empty() {
        info!("no unprocessed posts found");
        return Ok(());
    }

    let scored = priority::run(posts, gateway, store, config).await;
    if scored.is_empty() {
        info!("no posts cleared the priority threshold");
        log_statistics(store).await;
        return Ok(());
    }

    let top = select_top(scored, config.processing.top_n_posts);
    info!(selected = top.len(), "posts selected for depth analysis");

    let analyzed = depth::run(top, gateway, store, config).await;
    publish(publisher, &analyzed, store).await;

    log_statistics(store).await;
    Ok(())
}

/// Priority screening only; scheduled frequently, publishing left to the
/// depth task.
pub async fn run_fast(
    sources: &SourceReader,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    config: &Config,
) -> Result<()> {
    let posts = sources
        .fetch_unprocessed(store, config.processing.days_back)
        .await?;
    if posts.is_empty() {
        info!("no unprocessed posts found");
        return Ok(());
    }

    let total = posts.len();
    let scored = priority::run(posts, gateway, store, config).await;
    info!(
        total,
        worth = scored.len(),
        threshold = config.processing.priority_threshold,
        "fast task finished"
    );

    log_statistics(store).await;
    Ok(())
}

/// Depth analysis and publishing over posts the fast task already scored.
///
/// Posts come back from the store without their image interpretations, so
/// those are re-fetched from the source databases in one batch per
/// platform; a post is treated as having an image exactly when an
/// interpretation exists for it.
pub async fn run_smart(
    sources: &SourceReader,
    gateway: &dyn Gateway,
    store: &dyn ProcessedStore,
    publisher: Option<&Publisher>,
    config: &Config,
) -> Result<()> {
    let records = store.fetch_unanalyzed(config.processing.top_n_posts).await?;
    if records.is_empty() {
        info!("no posts awaiting depth analysis");
    }

    // Leftovers a previous run analyzed but never managed to publish.
    // Fetched before the depth stage so this run's own reports, persisted
    // by `record_depth`, cannot show up in the list a second time.
    let leftovers = store.fetch_unpublished(config.processing.top_n_posts).await?;

    let top = rehydrate(sources, records).await?;
    let with_images = top.iter().filter(|p| p.has_image).count();
    info!(
        selected = top.len(),
        with_images, "posts selected for depth analysis"
    );

    let mut analyzed = depth::run(top, gateway, store, config).await;
    append_unpublished(&mut analyzed, leftovers);

    publish(publisher, &analyzed, store).await;

    log_statistics(store).await;
    Ok(())
}

/// Rank by score descending and keep the first `top_n`.
fn select_top(mut scored: Vec<ScoredPost>, top_n: usize) -> Vec<ScoredPost> {
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(top_n);
    scored
}

/// Rebuild scored posts from stored records, re-attaching image
/// interpretations from the source databases.
async fn rehydrate(
    sources: &SourceReader,
    records: Vec<ProcessingRecord>,
) -> Result<Vec<ScoredPost>> {
    let mut ids_by_platform: HashMap<Platform, Vec<String>> = HashMap::new();
    for record in &records {
        ids_by_platform
            .entry(record.platform)
            .or_default()
            .push(record.post_id.clone());
    }

    let mut interpretations: HashMap<Platform, HashMap<String, String>> = HashMap::new();
    for (platform, ids) in &ids_by_platform {
        let found = sources.fetch_interpretations(*platform, ids).await?;
        info!(platform = %platform, count = found.len(), "image interpretations fetched");
        interpretations.insert(*platform, found);
    }

    Ok(records
        .into_iter()
        .map(|record| {
            let interpretation = interpretations
                .get(&record.platform)
                .and_then(|m| m.get(&record.post_id))
                .cloned();
            let has_image = interpretation.is_some();

            ScoredPost {
                score: record.score.clamp(0, 100) as u8,
                post: Post {
                    platform: record.platform,
                    post_id: record.post_id,
                    content: record.content,
                    url: record.url,
                    author: record.author,
                    published_at: None,
                    image_interpretation: interpretation,
                },
                has_image,
            }
        })
        .collect())
}

/// Convert a stored analyzed-but-unpublished record back into a
/// publishable report. Records whose stored report no longer validates
/// are skipped.
fn report_from_record(record: ProcessingRecord) -> Option<AnalyzedReport> {
    let raw = record.depth_report.as_ref()?.as_object()?.clone();
    let report = match DepthReport::from_json(raw) {
        Ok(report) => report,
        Err(missing) => {
            warn!(
                platform = %record.platform,
                post_id = %record.post_id,
                missing = ?missing,
                "stored report no longer validates, skipping"
            );
            return None;
        }
    };
    let model = record
        .model_used
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    Some(AnalyzedReport {
        post: Post {
            platform: record.platform,
            post_id: record.post_id,
            content: record.content,
            url: record.url,
            author: record.author,
            published_at: None,
            image_interpretation: None,
        },
        report,
        model,
    })
}

/// Add leftover reports to the publish list. A fingerprint this run
/// already produced a report for is dropped, so a post is never queued
/// for publishing twice in one run.
fn append_unpublished(analyzed: &mut Vec<AnalyzedReport>, leftovers: Vec<ProcessingRecord>) {
    let fresh: HashSet<Fingerprint> = analyzed.iter().map(|r| r.post.fingerprint()).collect();
    analyzed.extend(
        leftovers
            .into_iter()
            .filter(|record| !fresh.contains(&record.fingerprint()))
            .filter_map(report_from_record),
    );
}

async fn publish(
    publisher: Option<&Publisher>,
    analyzed: &[AnalyzedReport],
    store: &dyn ProcessedStore,
) {
    if analyzed.is_empty() {
        info!("nothing to publish");
        return;
    }

    let Some(publisher) = publisher else {
        warn!(
            reports = analyzed.len(),
            "publishing not configured, reports remain unpublished"
        );
        return;
    };

    match publisher.publish_batch(analyzed, store).await {
        Ok(published) => info!(published, total = analyzed.len(), "publishing finished"),
        Err(e) => warn!(error = %e, "publishing failed"),
    }
}

async fn log_statistics(store: &dyn ProcessedStore) {
    match store.statistics().await {
        Ok(stats) => info!(
            total_processed = stats.total_processed,
            worth_processing = stats.worth_processing,
            depth_analyzed = stats.depth_analyzed,
            published = stats.published,
            "store statistics"
        ),
        Err(e) => warn!(error = %e, "failed to read statistics"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{depth, priority};
    use crate::store::MemoryStore;
    use crate::testing::{scenario_config, MockGateway};
    use serde_json::json;

    fn post(id: &str) -> Post {
        Post {
            platform: Platform::X,
            post_id: id.to_string(),
            content: "c".repeat(300),
            url: None,
            author: None,
            published_at: None,
            image_interpretation: None,
        }
    }

    fn classifier_reply() -> String {
        json!({
            "post_category": "tech_insight",
            "has_image": 0,
            "attributes": {
                "has_unique_insight": 1,
                "is_inspirational": 1,
                "is_well_written": 1,
                "is_debatable": 1
            }
        })
        .to_string()
    }

    fn depth_reply() -> String {
        json!({
            "deconstruction": { "core_thesis": "t" },
            "internalization_and_expression_techniques": {},
            "reconstruction_showcase": []
        })
        .to_string()
    }

    fn scored(id: &str, score: u8) -> ScoredPost {
        ScoredPost {
            post: Post {
                platform: Platform::X,
                post_id: id.to_string(),
                content: "c".to_string(),
                url: None,
                author: None,
                published_at: None,
                image_interpretation: None,
            },
            score,
            has_image: false,
        }
    }

    #[test]
    fn test_select_top_ranks_and_truncates() {
        let picked = select_top(vec![scored("a", 40), scored("b", 90), scored("c", 70)], 2);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].post.post_id, "b");
        assert_eq!(picked[1].post.post_id, "c");
    }

    #[test]
    fn test_report_from_record_round_trip() {
        let record = ProcessingRecord {
            platform: Platform::Jike,
            post_id: "9".to_string(),
            content: "c".to_string(),
            url: None,
            author: Some("ada".to_string()),
            priority_result: None,
            score: 80,
            is_worth_processing: true,
            depth_report: Some(json!({
                "deconstruction": { "core_thesis": "t" },
                "internalization_and_expression_techniques": {},
                "reconstruction_showcase": []
            })),
            model_used: Some("smart-a".to_string()),
            published: false,
            published_location: None,
        };

        let report = report_from_record(record).unwrap();
        assert_eq!(report.model, "smart-a");
        assert_eq!(report.report.core_thesis(), Some("t"));
    }

    #[test]
    fn test_report_from_record_missing_model_uses_sentinel() {
        let record = ProcessingRecord {
            platform: Platform::Jike,
            post_id: "9".to_string(),
            content: "c".to_string(),
            url: None,
            author: None,
            priority_result: None,
            score: 80,
            is_worth_processing: true,
            depth_report: Some(json!({
                "deconstruction": { "core_thesis": "t" },
                "internalization_and_expression_techniques": {},
                "reconstruction_showcase": []
            })),
            model_used: None,
            published: false,
            published_location: None,
        };

        let report = report_from_record(record).unwrap();
        assert_eq!(report.model, "unknown");
    }

    #[tokio::test]
    async fn test_smart_run_queues_fresh_report_once() {
        let store = MemoryStore::new();
        let config = scenario_config();

        let gateway = MockGateway::new(vec![Ok(classifier_reply())]);
        let scored = priority::run(vec![post("1")], &gateway, &store, &config).await;
        assert_eq!(scored.len(), 1);

        // Assembled the way the smart task does it: leftovers fetched
        // before the depth stage, then merged after it.
        let leftovers = store.fetch_unpublished(10).await.unwrap();
        assert!(leftovers.is_empty());

        let depth_gateway = MockGateway::new(vec![Ok(depth_reply())]);
        let mut analyzed = depth::run(scored, &depth_gateway, &store, &config).await;
        append_unpublished(&mut analyzed, leftovers);
        assert_eq!(analyzed.len(), 1);

        // A leftover fetch made after the depth stage sees this run's
        // freshly persisted report; the merge must not queue it again.
        let overlapping = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(overlapping.len(), 1);
        append_unpublished(&mut analyzed, overlapping);
        assert_eq!(analyzed.len(), 1);
    }

    #[tokio::test]
    async fn test_smart_run_keeps_prior_leftovers() {
        let store = MemoryStore::new();
        let config = scenario_config();

        // An earlier run analyzed "old" but never published it.
        let gateway = MockGateway::new(vec![Ok(classifier_reply())]);
        let old = priority::run(vec![post("old")], &gateway, &store, &config).await;
        let depth_gateway = MockGateway::new(vec![Ok(depth_reply())]);
        depth::run(old, &depth_gateway, &store, &config).await;

        // This run scores and analyzes "new".
        let gateway = MockGateway::new(vec![Ok(classifier_reply())]);
        let new = priority::run(vec![post("new")], &gateway, &store, &config).await;

        let leftovers = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(leftovers.len(), 1);

        let depth_gateway = MockGateway::new(vec![Ok(depth_reply())]);
        let mut analyzed = depth::run(new, &depth_gateway, &store, &config).await;
        append_unpublished(&mut analyzed, leftovers);

        assert_eq!(analyzed.len(), 2);
        let mut ids: Vec<&str> = analyzed.iter().map(|r| r.post.post_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_report_from_record_rejects_invalid() {
        let record = ProcessingRecord {
            platform: Platform::X,
            post_id: "9".to_string(),
            content: "c".to_string(),
            url: None,
            author: None,
            priority_result: None,
            score: 80,
            is_worth_processing: true,
            depth_report: Some(json!({ "deconstruction": {} })),
            model_used: None,
            published: false,
            published_location: None,
        };

        assert!(report_from_record(record).is_none());
    }
}
