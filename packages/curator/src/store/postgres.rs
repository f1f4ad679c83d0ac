//! PostgreSQL fingerprint store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{CuratorError, Result};
use crate::store::ProcessedStore;
use crate::types::{
    DepthReport, Fingerprint, Platform, Post, PriorityResult, ProcessingRecord, Statistics,
};

/// PostgreSQL-backed fingerprint store.
///
/// Bootstraps its own schema on construction. Priority writes upsert on the
/// (source_platform, source_post_id) unique key.
pub struct PgProcessedStore {
    pool: PgPool,
}

impl PgProcessedStore {
    /// Connect and ensure the schema exists.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| CuratorError::Store(e.to_string()))?;

        Self::from_pool(pool).await
    }

    /// Build from an existing pool, ensuring the schema exists.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_posts (
                id BIGSERIAL PRIMARY KEY,
                source_platform TEXT NOT NULL,
                source_post_id TEXT NOT NULL,
                original_content TEXT,
                original_url TEXT,
                author_name TEXT,
                priority_analysis JSONB,
                final_priority_score INT NOT NULL DEFAULT 0,
                is_worth_processing BOOLEAN NOT NULL DEFAULT FALSE,
                analysis_report JSONB,
                model_used TEXT,
                published BOOLEAN NOT NULL DEFAULT FALSE,
                published_location TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (source_platform, source_post_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processed_posts_created_at ON processed_posts(created_at)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processed_posts_worth ON processed_posts(is_worth_processing)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processed_posts_published ON processed_posts(published)",
        )
        .execute(&self.pool)
        .await
        .ok();

        info!("processed_posts schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    source_platform: String,
    source_post_id: String,
    original_content: Option<String>,
    original_url: Option<String>,
    author_name: Option<String>,
    priority_analysis: Option<serde_json::Value>,
    final_priority_score: i32,
    is_worth_processing: bool,
    analysis_report: Option<serde_json::Value>,
    model_used: Option<String>,
    published: bool,
    published_location: Option<String>,
}

impl RecordRow {
    fn into_record(self) -> Result<ProcessingRecord> {
        let platform = Platform::from_str(&self.source_platform)
            .map_err(CuratorError::Store)?;

        let priority_result = self
            .priority_analysis
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| CuratorError::Store(format!("invalid priority analysis: {}", e)))?;

        Ok(ProcessingRecord {
            platform,
            post_id: self.source_post_id,
            content: self.original_content.unwrap_or_default(),
            url: self.original_url,
            author: self.author_name,
            priority_result,
            score: self.final_priority_score,
            is_worth_processing: self.is_worth_processing,
            depth_report: self.analysis_report,
            model_used: self.model_used,
            published: self.published,
            published_location: self.published_location,
        })
    }
}

const RECORD_COLUMNS: &str = "source_platform, source_post_id, original_content, original_url, \
     author_name, priority_analysis, final_priority_score, is_worth_processing, \
     analysis_report, model_used, published, published_location";

#[async_trait]
impl ProcessedStore for PgProcessedStore {
    async fn record_priority(
        &self,
        post: &Post,
        result: &PriorityResult,
        score: u8,
        is_worth_processing: bool,
    ) -> Result<()> {
        let analysis = serde_json::to_value(result)
            .map_err(|e| CuratorError::Store(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO processed_posts
                (source_platform, source_post_id, original_content, original_url, author_name,
                 priority_analysis, final_priority_score, is_worth_processing)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_platform, source_post_id) DO UPDATE SET
                priority_analysis = EXCLUDED.priority_analysis,
                final_priority_score = EXCLUDED.final_priority_score,
                is_worth_processing = EXCLUDED.is_worth_processing,
                updated_at = NOW()
            "#,
        )
        .bind(post.platform.as_str())
        .bind(&post.post_id)
        .bind(&post.content)
        .bind(&post.url)
        .bind(&post.author)
        .bind(&analysis)
        .bind(score as i32)
        .bind(is_worth_processing)
        .execute(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        debug!(
            fingerprint = %post.fingerprint(),
            score,
            is_worth_processing,
            "priority result recorded"
        );
        Ok(())
    }

    async fn record_depth(
        &self,
        fingerprint: &Fingerprint,
        report: &DepthReport,
        model: &str,
    ) -> Result<()> {
        let report_json = serde_json::Value::Object(report.as_json().clone());

        let result = sqlx::query(
            r#"
            UPDATE processed_posts
            SET analysis_report = $3,
                model_used = $4,
                updated_at = NOW()
            WHERE source_platform = $1 AND source_post_id = $2
            "#,
        )
        .bind(fingerprint.platform.as_str())
        .bind(&fingerprint.post_id)
        .bind(&report_json)
        .bind(model)
        .execute(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CuratorError::Store(format!(
                "no record for {} to attach depth report to",
                fingerprint
            )));
        }

        debug!(fingerprint = %fingerprint, model = %model, "depth report recorded");
        Ok(())
    }

    async fn mark_published(&self, fingerprint: &Fingerprint, location: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE processed_posts
            SET published = TRUE,
                published_location = $3,
                updated_at = NOW()
            WHERE source_platform = $1 AND source_post_id = $2
            "#,
        )
        .bind(fingerprint.platform.as_str())
        .bind(&fingerprint.post_id)
        .bind(location)
        .execute(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CuratorError::Store(format!(
                "no record for {} to mark published",
                fingerprint
            )));
        }

        debug!(fingerprint = %fingerprint, location = %location, "marked published");
        Ok(())
    }

    async fn fetch_unanalyzed(&self, limit: usize) -> Result<Vec<ProcessingRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM processed_posts
            WHERE is_worth_processing = TRUE
              AND analysis_report IS NULL
            ORDER BY final_priority_score DESC, created_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        debug!(count = rows.len(), "fetched records awaiting depth analysis");
        rows.into_iter().map(|r| r.into_record()).collect()
    }

    async fn fetch_unpublished(&self, limit: usize) -> Result<Vec<ProcessingRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM processed_posts
            WHERE analysis_report IS NOT NULL
              AND published = FALSE
            ORDER BY final_priority_score DESC, created_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        debug!(count = rows.len(), "fetched records awaiting publish");
        rows.into_iter().map(|r| r.into_record()).collect()
    }

    async fn processed_subset(
        &self,
        platform: Platform,
        post_ids: &[String],
    ) -> Result<HashSet<String>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT source_post_id FROM processed_posts
            WHERE source_platform = $1 AND source_post_id = ANY($2)
            "#,
        )
        .bind(platform.as_str())
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn statistics(&self) -> Result<Statistics> {
        let (total, worth, analyzed, published): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE is_worth_processing),
                   COUNT(*) FILTER (WHERE analysis_report IS NOT NULL),
                   COUNT(*) FILTER (WHERE published)
            FROM processed_posts
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CuratorError::Store(e.to_string()))?;

        Ok(Statistics {
            total_processed: total as u64,
            worth_processing: worth as u64,
            depth_analyzed: analyzed as u64,
            published: published as u64,
        })
    }
}
