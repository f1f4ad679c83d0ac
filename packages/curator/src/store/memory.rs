//! In-memory fingerprint store for testing and development.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{CuratorError, Result};
use crate::store::ProcessedStore;
use crate::types::{
    DepthReport, Fingerprint, Platform, Post, PriorityResult, ProcessingRecord, Statistics,
};

/// In-memory fingerprint store.
///
/// Useful for tests and local development. Data is lost on restart.
pub struct MemoryStore {
    records: RwLock<HashMap<Fingerprint, ProcessingRecord>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Fetch a record by fingerprint (test inspection).
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<ProcessingRecord> {
        self.records.read().unwrap().get(fingerprint).cloned()
    }

    /// Clear all stored records.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}

#[async_trait]
impl ProcessedStore for MemoryStore {
    async fn record_priority(
        &self,
        post: &Post,
        result: &PriorityResult,
        score: u8,
        is_worth_processing: bool,
    ) -> Result<()> {
        let fingerprint = post.fingerprint();
        let mut records = self.records.write().unwrap();

        let record = records
            .entry(fingerprint)
            .or_insert_with(|| ProcessingRecord {
                platform: post.platform,
                post_id: post.post_id.clone(),
                content: post.content.clone(),
                url: post.url.clone(),
                author: post.author.clone(),
                priority_result: None,
                score: 0,
                is_worth_processing: false,
                depth_report: None,
                model_used: None,
                published: false,
                published_location: None,
            });

        record.priority_result = Some(result.clone());
        record.score = score as i32;
        record.is_worth_processing = is_worth_processing;
        Ok(())
    }

    async fn record_depth(
        &self,
        fingerprint: &Fingerprint,
        report: &DepthReport,
        model: &str,
    ) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(fingerprint)
            .ok_or_else(|| CuratorError::Store(format!("no record for {}", fingerprint)))?;

        record.depth_report = Some(serde_json::Value::Object(report.as_json().clone()));
        record.model_used = Some(model.to_string());
        Ok(())
    }

    async fn mark_published(&self, fingerprint: &Fingerprint, location: &str) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(fingerprint)
            .ok_or_else(|| CuratorError::Store(format!("no record for {}", fingerprint)))?;

        record.published = true;
        record.published_location = Some(location.to_string());
        Ok(())
    }

    async fn fetch_unanalyzed(&self, limit: usize) -> Result<Vec<ProcessingRecord>> {
        let records = self.records.read().unwrap();

        let mut eligible: Vec<ProcessingRecord> = records
            .values()
            .filter(|r| r.is_worth_processing && r.depth_report.is_none())
            .cloned()
            .collect();

        eligible.sort_by(|a, b| b.score.cmp(&a.score));
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<ProcessingRecord>> {
        let records = self.records.read().unwrap();

        let mut eligible: Vec<ProcessingRecord> = records
            .values()
            .filter(|r| r.depth_report.is_some() && !r.published)
            .cloned()
            .collect();

        eligible.sort_by(|a, b| b.score.cmp(&a.score));
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn processed_subset(
        &self,
        platform: Platform,
        post_ids: &[String],
    ) -> Result<HashSet<String>> {
        let records = self.records.read().unwrap();

        Ok(post_ids
            .iter()
            .filter(|id| records.contains_key(&Fingerprint::new(platform, (*id).clone())))
            .cloned()
            .collect())
    }

    async fn statistics(&self) -> Result<Statistics> {
        let records = self.records.read().unwrap();

        Ok(Statistics {
            total_processed: records.len() as u64,
            worth_processing: records.values().filter(|r| r.is_worth_processing).count() as u64,
            depth_analyzed: records.values().filter(|r| r.depth_report.is_some()).count() as u64,
            published: records.values().filter(|r| r.published).count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attributes, Category};

    fn post(id: &str) -> Post {
        Post {
            platform: Platform::X,
            post_id: id.to_string(),
            content: "some content".to_string(),
            url: Some(format!("https://x.test/{}", id)),
            author: Some("author".to_string()),
            published_at: None,
            image_interpretation: None,
        }
    }

    fn priority() -> PriorityResult {
        PriorityResult {
            category: Category::TechInsight,
            has_image: false,
            attributes: Attributes::default(),
        }
    }

    fn report() -> DepthReport {
        let map = serde_json::json!({
            "deconstruction": { "core_thesis": "t" },
            "internalization_and_expression_techniques": {},
            "reconstruction_showcase": []
        });
        DepthReport::from_json(map.as_object().unwrap().clone()).unwrap()
    }

    #[tokio::test]
    async fn test_record_priority_upserts() {
        let store = MemoryStore::new();
        let p = post("1");

        store.record_priority(&p, &priority(), 60, true).await.unwrap();
        store.record_priority(&p, &priority(), 45, true).await.unwrap();

        assert_eq!(store.record_count(), 1);
        let record = store.get(&p.fingerprint()).unwrap();
        assert_eq!(record.score, 45);
        assert!(record.is_worth_processing);
    }

    #[tokio::test]
    async fn test_fetch_unanalyzed_orders_by_score() {
        let store = MemoryStore::new();

        store.record_priority(&post("low"), &priority(), 45, true).await.unwrap();
        store.record_priority(&post("high"), &priority(), 90, true).await.unwrap();
        store.record_priority(&post("discarded"), &priority(), 10, false).await.unwrap();

        let eligible = store.fetch_unanalyzed(10).await.unwrap();
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].post_id, "high");
        assert_eq!(eligible[1].post_id, "low");
    }

    #[tokio::test]
    async fn test_depth_report_removes_from_unanalyzed() {
        let store = MemoryStore::new();
        let p = post("1");

        store.record_priority(&p, &priority(), 80, true).await.unwrap();
        store
            .record_depth(&p.fingerprint(), &report(), "model-a")
            .await
            .unwrap();

        assert!(store.fetch_unanalyzed(10).await.unwrap().is_empty());

        let unpublished = store.fetch_unpublished(10).await.unwrap();
        assert_eq!(unpublished.len(), 1);
        assert_eq!(unpublished[0].model_used.as_deref(), Some("model-a"));
    }

    #[tokio::test]
    async fn test_mark_published() {
        let store = MemoryStore::new();
        let p = post("1");

        store.record_priority(&p, &priority(), 80, true).await.unwrap();
        store.record_depth(&p.fingerprint(), &report(), "m").await.unwrap();
        store
            .mark_published(&p.fingerprint(), "https://notion.so/abc")
            .await
            .unwrap();

        assert!(store.fetch_unpublished(10).await.unwrap().is_empty());
        let record = store.get(&p.fingerprint()).unwrap();
        assert!(record.published);
        assert_eq!(record.published_location.as_deref(), Some("https://notion.so/abc"));
    }

    #[tokio::test]
    async fn test_processed_subset() {
        let store = MemoryStore::new();
        store.record_priority(&post("a"), &priority(), 10, false).await.unwrap();
        store.record_priority(&post("b"), &priority(), 10, false).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let processed = store.processed_subset(Platform::X, &ids).await.unwrap();

        assert_eq!(processed.len(), 2);
        assert!(processed.contains("a"));
        assert!(!processed.contains("c"));

        // Different platform, same ids
        let other = store.processed_subset(Platform::Jike, &ids).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = MemoryStore::new();
        store.record_priority(&post("a"), &priority(), 80, true).await.unwrap();
        store.record_priority(&post("b"), &priority(), 10, false).await.unwrap();
        store.record_depth(&post("a").fingerprint(), &report(), "m").await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.worth_processing, 1);
        assert_eq!(stats.depth_analyzed, 1);
        assert_eq!(stats.published, 0);
    }

    #[tokio::test]
    async fn test_depth_without_priority_fails() {
        let store = MemoryStore::new();
        let result = store
            .record_depth(&Fingerprint::new(Platform::X, "ghost"), &report(), "m")
            .await;
        assert!(result.is_err());
    }
}
