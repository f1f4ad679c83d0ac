//! Source database readers for the two upstream platforms.
//!
//! Each platform has its own crawl database with its own schema; this
//! module narrows both to [`Post`] values and batch interpretation lookups.
//! Already-processed posts are filtered out against the fingerprint store
//! before any model call is made.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{CuratorError, Result};
use crate::store::ProcessedStore;
use crate::types::{Platform, Post};

/// Per-query row cap; a day of crawls stays well under this.
const FETCH_LIMIT: i64 = 1000;

/// Reader over the platform source databases.
///
/// Either pool may be absent; a platform without a configured database
/// simply contributes no posts.
pub struct SourceReader {
    x_pool: Option<PgPool>,
    jike_pool: Option<PgPool>,
}

impl SourceReader {
    /// Connect to whichever source databases are configured.
    pub async fn connect(x_url: Option<&str>, jike_url: Option<&str>) -> Result<Self> {
        let x_pool = match x_url {
            Some(url) => Some(connect_pool(url, "X").await?),
            None => None,
        };
        let jike_pool = match jike_url {
            Some(url) => Some(connect_pool(url, "Jike").await?),
            None => None,
        };

        Ok(Self { x_pool, jike_pool })
    }

    #[cfg(test)]
    pub fn disconnected() -> Self {
        Self {
            x_pool: None,
            jike_pool: None,
        }
    }

    /// Fetch recent posts from both platforms, excluding anything the
    /// fingerprint store has already seen.
    pub async fn fetch_unprocessed(
        &self,
        store: &dyn ProcessedStore,
        days_back: u32,
    ) -> Result<Vec<Post>> {
        let mut all_posts = Vec::new();

        let x_posts = self.fetch_recent_x_posts(days_back).await?;
        let x_new = filter_processed(store, Platform::X, x_posts).await?;
        info!(count = x_new.len(), platform = "X", "unprocessed posts");
        all_posts.extend(x_new);

        let jike_posts = self.fetch_recent_jike_posts(days_back).await?;
        let jike_new = filter_processed(store, Platform::Jike, jike_posts).await?;
        info!(count = jike_new.len(), platform = "Jike", "unprocessed posts");
        all_posts.extend(jike_new);

        info!(total = all_posts.len(), "unprocessed posts across platforms");
        Ok(all_posts)
    }

    async fn fetch_recent_x_posts(&self, days_back: u32) -> Result<Vec<Post>> {
        let Some(pool) = &self.x_pool else {
            return Ok(Vec::new());
        };

        type XRow = (
            String,
            Option<String>,
            Option<String>,
            Option<DateTime<Utc>>,
            Option<String>,
            Option<String>,
        );

        let rows: Vec<XRow> = sqlx::query_as(
            r#"
            SELECT
                p.id::TEXT,
                p.post_url,
                p.post_content,
                p.published_at,
                u.user_id,
                pi.interpretation
            FROM twitter_posts p
            JOIN twitter_users u ON p.user_table_id = u.id
            LEFT JOIN post_insights pi ON p.id = pi.post_id AND pi.status = 'completed'
            WHERE p.created_at >= NOW() - ($1 * INTERVAL '1 day')
            ORDER BY p.published_at DESC
            LIMIT $2
            "#,
        )
        .bind(days_back as i32)
        .bind(FETCH_LIMIT)
        .fetch_all(pool)
        .await
        .map_err(|e| CuratorError::Source(format!("X query failed: {}", e)))?;

        info!(count = rows.len(), days_back, "fetched X posts");

        Ok(rows
            .into_iter()
            .map(
                |(id, url, content, published_at, author, interpretation)| Post {
                    platform: Platform::X,
                    post_id: id,
                    content: content.unwrap_or_default(),
                    url,
                    author,
                    published_at,
                    image_interpretation: interpretation,
                },
            )
            .collect())
    }

    async fn fetch_recent_jike_posts(&self, days_back: u32) -> Result<Vec<Post>> {
        let Some(pool) = &self.jike_pool else {
            return Ok(Vec::new());
        };

        type JikeRow = (
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<DateTime<Utc>>,
            Option<String>,
            Option<String>,
            Option<String>,
        );

        let rows: Vec<JikeRow> = sqlx::query_as(
            r#"
            SELECT
                p.id::TEXT,
                p.link,
                p.title,
                p.summary,
                p.published_at,
                prof.nickname,
                prof.jike_user_id,
                pp.interpretation_text
            FROM jk_posts p
            JOIN jk_profiles prof ON p.profile_id = prof.id
            LEFT JOIN postprocessing pp ON p.id = pp.post_id AND pp.status = 'success'
            WHERE p.created_at >= NOW() - ($1 * INTERVAL '1 day')
            ORDER BY p.published_at DESC
            LIMIT $2
            "#,
        )
        .bind(days_back as i32)
        .bind(FETCH_LIMIT)
        .fetch_all(pool)
        .await
        .map_err(|e| CuratorError::Source(format!("Jike query failed: {}", e)))?;

        info!(count = rows.len(), days_back, "fetched Jike posts");

        Ok(rows
            .into_iter()
            .map(
                |(id, link, title, summary, published_at, nickname, user_id, interpretation)| {
                    Post {
                        platform: Platform::Jike,
                        post_id: id,
                        content: jike_content(title.as_deref(), summary.as_deref()),
                        url: link,
                        author: nickname.or(user_id),
                        published_at,
                        image_interpretation: interpretation,
                    }
                },
            )
            .collect())
    }

    /// Batch lookup of vision-model readings for posts on one platform.
    ///
    /// Used by the depth-and-publish mode, where posts come from the
    /// fingerprint store and have lost their interpretations.
    pub async fn fetch_interpretations(
        &self,
        platform: Platform,
        post_ids: &[String],
    ) -> Result<HashMap<String, String>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, String)> = match platform {
            Platform::X => {
                let Some(pool) = &self.x_pool else {
                    warn!("X source database not configured, skipping interpretation lookup");
                    return Ok(HashMap::new());
                };
                sqlx::query_as(
                    r#"
                    SELECT pi.post_id::TEXT, pi.interpretation
                    FROM post_insights pi
                    WHERE pi.post_id::TEXT = ANY($1)
                      AND pi.status = 'completed'
                      AND pi.interpretation IS NOT NULL
                    "#,
                )
                .bind(post_ids)
                .fetch_all(pool)
                .await
                .map_err(|e| CuratorError::Source(format!("X interpretation query failed: {}", e)))?
            }
            Platform::Jike => {
                let Some(pool) = &self.jike_pool else {
                    warn!("Jike source database not configured, skipping interpretation lookup");
                    return Ok(HashMap::new());
                };
                sqlx::query_as(
                    r#"
                    SELECT pp.post_id::TEXT, pp.interpretation_text
                    FROM postprocessing pp
                    WHERE pp.post_id::TEXT = ANY($1)
                      AND pp.status = 'success'
                      AND pp.interpretation_text IS NOT NULL
                    "#,
                )
                .bind(post_ids)
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    CuratorError::Source(format!("Jike interpretation query failed: {}", e))
                })?
            }
        };

        Ok(rows.into_iter().collect())
    }
}

async fn connect_pool(url: &str, label: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .map_err(|e| CuratorError::Source(format!("{} database connection failed: {}", label, e)))
}

/// Title and summary joined with a blank line; either may be missing.
fn jike_content(title: Option<&str>, summary: Option<&str>) -> String {
    [title, summary]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn filter_processed(
    store: &dyn ProcessedStore,
    platform: Platform,
    posts: Vec<Post>,
) -> Result<Vec<Post>> {
    if posts.is_empty() {
        return Ok(posts);
    }

    let ids: Vec<String> = posts.iter().map(|p| p.post_id.clone()).collect();
    let processed = store.processed_subset(platform, &ids).await?;

    Ok(posts
        .into_iter()
        .filter(|p| !processed.contains(&p.post_id))
        .collect())
}
