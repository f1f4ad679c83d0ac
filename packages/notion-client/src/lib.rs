//! Pure Notion REST API client
//!
//! A minimal client for the Notion API with no domain-specific logic:
//! creating pages, listing child pages, and building block payloads.
//! Page-hierarchy conventions (what the pages mean) belong to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use notion_client::{blocks, NotionClient};
//!
//! let client = NotionClient::new(token);
//! let children = client.get_child_pages(&parent_id).await?;
//! let page = client
//!     .create_page(&parent_id, "2026", vec![blocks::divider()])
//!     .await?;
//! ```

pub mod blocks;
pub mod error;

pub use error::{NotionError, Result};

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

const NOTION_API_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion limits a single page-creation request to 100 child blocks.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// A child page found under a parent page.
#[derive(Debug, Clone)]
pub struct ChildPage {
    pub id: String,
    pub title: String,
}

/// A page created through the API.
#[derive(Debug, Clone)]
pub struct CreatedPage {
    pub id: String,
    pub url: String,
}

impl CreatedPage {
    fn from_id(id: String) -> Self {
        let url = format!("https://www.notion.so/{}", id.replace('-', ""));
        Self { id, url }
    }
}

/// Pure Notion API client.
#[derive(Clone)]
pub struct NotionClient {
    http_client: Client,
    token: String,
    base_url: String,
}

impl NotionClient {
    /// Create a new client with the given integration token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            token: token.into(),
            base_url: NOTION_API_URL.to_string(),
        }
    }

    /// Create from environment variable `NOTION_INTEGRATION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("NOTION_INTEGRATION_TOKEN")
            .map_err(|_| NotionError::Config("NOTION_INTEGRATION_TOKEN not set".into()))?;
        Ok(Self::new(token))
    }

    /// Set a custom base URL (for testing against a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn get(&self, endpoint: &str) -> Result<Value> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| NotionError::Network(e.to_string()))?;

        Self::into_json(response).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| NotionError::Network(e.to_string()))?;

        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or_default();
            let message = body["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            warn!(status = %status, message = %message, "Notion API error");
            return Err(NotionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| NotionError::Parse(e.to_string()))
    }

    /// List the child pages of a page (other block types are skipped).
    pub async fn get_child_pages(&self, page_id: &str) -> Result<Vec<ChildPage>> {
        let body = self.get(&format!("blocks/{}/children", page_id)).await?;

        let results = body["results"]
            .as_array()
            .ok_or_else(|| NotionError::Parse("missing results array".into()))?;

        let pages = results
            .iter()
            .filter(|child| child["type"] == "child_page")
            .filter_map(|child| {
                let id = child["id"].as_str()?;
                let title = child["child_page"]["title"].as_str().unwrap_or_default();
                Some(ChildPage {
                    id: id.to_string(),
                    title: title.to_string(),
                })
            })
            .collect();

        Ok(pages)
    }

    /// Create a page under a parent page. Blocks beyond
    /// [`MAX_BLOCKS_PER_REQUEST`] are dropped.
    pub async fn create_page(
        &self,
        parent_id: &str,
        title: &str,
        content_blocks: Vec<Value>,
    ) -> Result<CreatedPage> {
        let mut body = json!({
            "parent": { "page_id": parent_id },
            "properties": {
                "title": {
                    "title": [{ "text": { "content": title } }]
                }
            }
        });

        if !content_blocks.is_empty() {
            let capped: Vec<Value> = content_blocks
                .into_iter()
                .take(MAX_BLOCKS_PER_REQUEST)
                .collect();
            body["children"] = Value::Array(capped);
        }

        let response = self.post("pages", &body).await?;
        let id = response["id"]
            .as_str()
            .ok_or_else(|| NotionError::Parse("created page has no id".into()))?
            .to_string();

        debug!(page_id = %id, title = %title, "created Notion page");
        Ok(CreatedPage::from_id(id))
    }

    /// Find a child page by exact title, creating it if absent.
    pub async fn find_or_create_child(&self, parent_id: &str, title: &str) -> Result<String> {
        let children = self.get_child_pages(parent_id).await?;

        if let Some(existing) = children.iter().find(|c| c.title == title) {
            debug!(title = %title, "found existing child page");
            return Ok(existing.id.clone());
        }

        debug!(title = %title, "creating child page");
        let created = self.create_page(parent_id, title, Vec::new()).await?;
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_page_url() {
        let page = CreatedPage::from_id("9a1b-2c3d-4e5f".to_string());
        assert_eq!(page.url, "https://www.notion.so/9a1b2c3d4e5f");
    }

    #[test]
    fn test_client_builder() {
        let client = NotionClient::new("secret").with_base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
