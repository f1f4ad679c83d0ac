//! Notion publishing: a dated page hierarchy and one formatted page per
//! analyzed post.
//!
//! Pages land under `{parent}/{year}/{MM月}/{DD日}`; each level is found by
//! title or created. Block formatting is pure and tested separately from
//! the API calls.

use chrono::{DateTime, Datelike, Utc};
use notion_client::{blocks, NotionClient};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{CuratorError, Result};
use crate::stages::AnalyzedReport;
use crate::store::ProcessedStore;
use crate::types::{DepthReport, Post};

/// Pause between page creations; Notion rate-limits around 3 req/s.
const PUBLISH_DELAY: Duration = Duration::from_millis(500);

/// Char caps keeping each rich-text payload under Notion's 2000-char limit.
const ORIGINAL_CONTENT_CAP: usize = 1900;
const SUGGESTION_CAP: usize = 1500;
const SHOWCASE_CONTENT_CAP: usize = 1900;
const RATIONALE_CAP: usize = 900;
const TITLE_THESIS_CAP: usize = 40;

/// Publishes analyzed reports to a Notion workspace.
pub struct Publisher {
    client: NotionClient,
    parent_page_id: String,
}

impl Publisher {
    pub fn new(client: NotionClient, parent_page_id: impl Into<String>) -> Self {
        Self {
            client,
            parent_page_id: parent_page_id.into(),
        }
    }

    /// Walk (and extend) the year/month/day hierarchy for the given date,
    /// returning the day page id.
    pub async fn ensure_daily_page(&self, date: DateTime<Utc>) -> Result<String> {
        let year = date.year().to_string();
        let month = format!("{:02}月", date.month());
        let day = format!("{:02}日", date.day());

        info!(year = %year, month = %month, day = %day, "resolving daily page");

        let year_id = self.find_or_create(&self.parent_page_id, &year).await?;
        let month_id = self.find_or_create(&year_id, &month).await?;
        self.find_or_create(&month_id, &day).await
    }

    async fn find_or_create(&self, parent_id: &str, title: &str) -> Result<String> {
        self.client
            .find_or_create_child(parent_id, title)
            .await
            .map_err(|e| CuratorError::Publish(format!("page '{}': {}", title, e)))
    }

    /// Publish a batch of reports under today's page, marking each in the
    /// store as it lands. One report's failure never stops the batch.
    pub async fn publish_batch(
        &self,
        reports: &[AnalyzedReport],
        store: &dyn ProcessedStore,
    ) -> Result<usize> {
        if reports.is_empty() {
            return Ok(0);
        }

        let daily_page_id = self.ensure_daily_page(Utc::now()).await?;
        let mut published = 0;

        for (index, report) in reports.iter().enumerate() {
            let fingerprint = report.post.fingerprint();
            info!(
                fingerprint = %fingerprint,
                position = index + 1,
                total = reports.len(),
                "publishing report"
            );

            let title = page_title(&report.report, report.post.author.as_deref());
            let content = format_report(&report.post, &report.report);

            match self.client.create_page(&daily_page_id, &title, content).await {
                Ok(page) => {
                    if let Err(e) = store.mark_published(&fingerprint, &page.url).await {
                        warn!(fingerprint = %fingerprint, error = %e, "failed to mark published");
                    }
                    info!(fingerprint = %fingerprint, url = %page.url, "report published");
                    published += 1;
                }
                Err(e) => {
                    error!(fingerprint = %fingerprint, error = %e, "failed to publish report");
                }
            }

            if index + 1 < reports.len() {
                tokio::time::sleep(PUBLISH_DELAY).await;
            }
        }

        info!(published, total = reports.len(), "publish batch finished");
        Ok(published)
    }
}

/// Char-count truncation; byte slicing would panic inside multibyte text.
fn truncate_chars(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}

/// Page title: the model's own title when it offered one, else the core
/// thesis truncated plus the author.
pub fn page_title(report: &DepthReport, author: Option<&str>) -> String {
    if let Some(title) = report.page_title() {
        return format!("📝 {}", title);
    }

    let thesis = report.core_thesis().unwrap_or("Learning notes");
    let author = author.unwrap_or("unknown");
    format!("📝 {} - {}", truncate_chars(thesis, TITLE_THESIS_CAP), author)
}

/// Lay out a report as Notion blocks. Sections with no content are omitted;
/// the original-content callout and the meta footer always appear.
pub fn format_report(post: &Post, report: &DepthReport) -> Vec<Value> {
    let mut out = Vec::new();

    let mut original = truncate_chars(&post.content, ORIGINAL_CONTENT_CAP);
    if let Some(url) = &post.url {
        original.push_str(&format!("\n\n[View original]({})", url));
    }
    out.push(blocks::callout(
        blocks::rich_text(&original),
        "📌",
        "gray_background",
    ));

    if let Some(thesis) = report.core_thesis() {
        out.push(blocks::quote(thesis, "blue_background"));
    }

    let mut deconstruction = Vec::new();
    if let Some(post_type) = report.post_type() {
        deconstruction.push(blocks::labeled_paragraph("Type: ", post_type));
    }
    if let Some(assumption) = report.underlying_assumption() {
        deconstruction.push(blocks::labeled_paragraph(
            "Underlying assumption: ",
            assumption,
        ));
    }
    if !deconstruction.is_empty() {
        out.push(blocks::toggle("🔍 Deconstruction", deconstruction));
    }

    if let Some(insight) = report.primary_insight() {
        out.push(blocks::callout(
            blocks::rich_text(insight),
            "💡",
            "yellow_background",
        ));
    }

    if let Some(techniques) = report.technique_analysis() {
        let children = technique_blocks(techniques);
        if !children.is_empty() {
            out.push(blocks::toggle("✨ Expression techniques", children));
        }
    }

    if let Some(showcase) = report.reconstruction_showcase() {
        let children = showcase_blocks(showcase);
        if !children.is_empty() {
            out.push(blocks::toggle("✍️ Reconstruction", children));
        }
    }

    out.push(blocks::divider());
    let meta = format!(
        "📱 {} | 👤 {}",
        post.platform,
        post.author.as_deref().unwrap_or("unknown")
    );
    out.push(json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": {
            "rich_text": [{
                "type": "text",
                "text": { "content": meta },
                "annotations": { "color": "gray" }
            }]
        }
    }));

    out
}

/// Technique entries: bold blue name, then the suggestion, divider-separated.
/// Entries missing either field are skipped.
fn technique_blocks(techniques: &[Value]) -> Vec<Value> {
    let entries: Vec<(&str, &str)> = techniques
        .iter()
        .filter_map(|t| {
            let name = t.get("technique_name")?.as_str()?;
            let suggestion = t.get("application_suggestion")?.as_str()?;
            Some((name, suggestion))
        })
        .collect();

    let mut children = Vec::new();
    for (index, (name, suggestion)) in entries.iter().enumerate() {
        children.push(json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": {
                "rich_text": [{
                    "type": "text",
                    "text": { "content": name },
                    "annotations": { "bold": true, "color": "blue" }
                }]
            }
        }));
        children.push(blocks::paragraph(blocks::rich_text(&truncate_chars(
            suggestion,
            SUGGESTION_CAP,
        ))));

        if index + 1 < entries.len() {
            children.push(blocks::divider());
        }
    }
    children
}

/// Showcase variants: green heading per style, the rewrite in a callout,
/// an italic rationale when present, divider-separated.
fn showcase_blocks(showcase: &[Value]) -> Vec<Value> {
    let entries: Vec<(&str, &str, Option<&str>)> = showcase
        .iter()
        .filter_map(|r| {
            let style = r.get("style")?.as_str()?;
            let content = r.get("content")?.as_str()?;
            let rationale = r.get("rationale").and_then(|v| v.as_str());
            Some((style, content, rationale))
        })
        .collect();

    let mut children = Vec::new();
    for (index, (style, content, rationale)) in entries.iter().enumerate() {
        children.push(blocks::heading_3(style, "green"));
        children.push(blocks::callout(
            blocks::rich_text(&truncate_chars(content, SHOWCASE_CONTENT_CAP)),
            "✍️",
            "gray_background",
        ));
        if let Some(rationale) = rationale {
            children.push(blocks::annotation(
                "Rationale: ",
                &truncate_chars(rationale, RATIONALE_CAP),
            ));
        }

        if index + 1 < entries.len() {
            children.push(blocks::divider());
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use serde_json::json;

    fn sample_post() -> Post {
        Post {
            platform: Platform::X,
            post_id: "1".to_string(),
            content: "original words".to_string(),
            url: Some("https://x.test/p/1".to_string()),
            author: Some("ada".to_string()),
            published_at: None,
            image_interpretation: None,
        }
    }

    fn sample_report() -> DepthReport {
        let value = json!({
            "deconstruction": {
                "post_type": "tech_insight",
                "core_thesis": "small tools compose",
                "underlying_assumption": "readers value brevity"
            },
            "internalization_and_expression_techniques": {
                "primary_insight": "lead with the conclusion",
                "technique_analysis": [
                    { "technique_name": "Contrast", "application_suggestion": "pair old and new" },
                    { "technique_name": "Anchor", "application_suggestion": "open with a number" }
                ]
            },
            "reconstruction_showcase": [
                { "style": "Punchy", "content": "rewrite one", "rationale": "shorter lands harder" },
                { "style": "Story", "content": "rewrite two" }
            ]
        });
        DepthReport::from_json(value.as_object().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_page_title_from_thesis_and_author() {
        let title = page_title(&sample_report(), Some("ada"));
        assert_eq!(title, "📝 small tools compose - ada");
    }

    #[test]
    fn test_page_title_truncates_on_char_boundary() {
        let value = json!({
            "deconstruction": { "core_thesis": "数".repeat(60) },
            "internalization_and_expression_techniques": {},
            "reconstruction_showcase": []
        });
        let report = DepthReport::from_json(value.as_object().unwrap().clone()).unwrap();

        let title = page_title(&report, None);
        assert_eq!(title, format!("📝 {} - unknown", "数".repeat(40)));
    }

    #[test]
    fn test_page_title_prefers_model_supplied() {
        let value = json!({
            "deconstruction": { "core_thesis": "ignored" },
            "internalization_and_expression_techniques": {},
            "reconstruction_showcase": [],
            "page_title": "A sharper headline"
        });
        let report = DepthReport::from_json(value.as_object().unwrap().clone()).unwrap();

        assert_eq!(page_title(&report, Some("ada")), "📝 A sharper headline");
    }

    #[test]
    fn test_format_report_block_order() {
        let blocks = format_report(&sample_post(), &sample_report());

        let types: Vec<&str> = blocks
            .iter()
            .map(|b| b["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            types,
            vec![
                "callout",   // original content
                "quote",     // core thesis
                "toggle",    // deconstruction
                "callout",   // primary insight
                "toggle",    // techniques
                "toggle",    // reconstruction
                "divider",
                "paragraph", // meta footer
            ]
        );

        // Original-content callout carries the source link.
        let original = serde_json::to_string(&blocks[0]).unwrap();
        assert!(original.contains("https://x.test/p/1"));
    }

    #[test]
    fn test_format_report_divider_between_techniques_only() {
        let blocks = format_report(&sample_post(), &sample_report());
        let techniques = blocks[4]["toggle"]["children"].as_array().unwrap();

        // name + suggestion + divider + name + suggestion; no trailing divider.
        assert_eq!(techniques.len(), 5);
        assert_eq!(techniques[2]["type"], "divider");
        assert_ne!(techniques[4]["type"], "divider");
    }

    #[test]
    fn test_format_report_omits_empty_sections() {
        let value = json!({
            "deconstruction": {},
            "internalization_and_expression_techniques": {},
            "reconstruction_showcase": []
        });
        let report = DepthReport::from_json(value.as_object().unwrap().clone()).unwrap();

        let blocks = format_report(&sample_post(), &report);
        let types: Vec<&str> = blocks
            .iter()
            .map(|b| b["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["callout", "divider", "paragraph"]);
    }

    #[test]
    fn test_showcase_rationale_optional() {
        let blocks = format_report(&sample_post(), &sample_report());
        let showcase = blocks[5]["toggle"]["children"].as_array().unwrap();

        // heading + callout + rationale + divider + heading + callout.
        assert_eq!(showcase.len(), 6);
        assert_eq!(showcase[0]["type"], "heading_3");
        assert_eq!(showcase[2]["type"], "paragraph");
        assert_eq!(showcase[5]["type"], "callout");
    }

    #[test]
    fn test_meta_footer_contents() {
        let blocks = format_report(&sample_post(), &sample_report());
        let footer = blocks.last().unwrap();
        assert_eq!(
            footer["paragraph"]["rich_text"][0]["text"]["content"],
            "📱 X | 👤 ada"
        );
    }
}
