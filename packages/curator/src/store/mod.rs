//! Fingerprint store: the durable record of per-post stage completion.
//!
//! Keyed by (platform, post id). Priority writes are upserts, so re-running
//! a stage over the same posts is idempotent; depth and publish writes only
//! touch existing rows.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgProcessedStore;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::types::{DepthReport, Fingerprint, Platform, Post, PriorityResult, ProcessingRecord, Statistics};

#[async_trait]
pub trait ProcessedStore: Send + Sync {
    /// Upsert the priority-stage outcome for a post.
    async fn record_priority(
        &self,
        post: &Post,
        result: &PriorityResult,
        score: u8,
        is_worth_processing: bool,
    ) -> Result<()>;

    /// Attach a depth report and the model that produced it.
    /// The row must already exist (priority runs first).
    async fn record_depth(
        &self,
        fingerprint: &Fingerprint,
        report: &DepthReport,
        model: &str,
    ) -> Result<()>;

    /// Mark a report as published, recording where it landed.
    async fn mark_published(&self, fingerprint: &Fingerprint, location: &str) -> Result<()>;

    /// Records worth processing that have no depth report yet,
    /// highest score first.
    async fn fetch_unanalyzed(&self, limit: usize) -> Result<Vec<ProcessingRecord>>;

    /// Records with a depth report that have not been published,
    /// highest score first.
    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<ProcessingRecord>>;

    /// Which of the given post ids already have a record on this platform.
    async fn processed_subset(
        &self,
        platform: Platform,
        post_ids: &[String],
    ) -> Result<HashSet<String>>;

    /// Aggregate counts for end-of-run reporting.
    async fn statistics(&self) -> Result<Statistics>;
}
