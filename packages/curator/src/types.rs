//! Core data types for the curation pipeline.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

/// Source platform a post came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    X,
    Jike,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "X",
            Platform::Jike => "Jike",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Platform::X),
            "Jike" => Ok(Platform::Jike),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// The (platform, post id) pair identifying a post across all stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub platform: Platform,
    pub post_id: String,
}

impl Fingerprint {
    pub fn new(platform: Platform, post_id: impl Into<String>) -> Self {
        Self {
            platform,
            post_id: post_id.into(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.post_id)
    }
}

/// A unit of source content entering the pipeline.
#[derive(Debug, Clone)]
pub struct Post {
    pub platform: Platform,
    pub post_id: String,
    /// Raw content; may embed image markup like `![alt](url)`.
    pub content: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Vision-model reading of attached images, produced upstream.
    /// Consumed here, never generated.
    pub image_interpretation: Option<String>,
}

impl Post {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.platform, self.post_id.clone())
    }
}

/// A post that cleared the priority threshold, carried into the depth stage.
#[derive(Debug, Clone)]
pub struct ScoredPost {
    pub post: Post,
    pub score: u8,
    pub has_image: bool,
}

/// Content category assigned by the fast-tier classifier.
///
/// This is a closed set shared with the classification prompt: the prompt
/// offers exactly these choices, and the scoring tiers are keyed off them.
/// Changing the vocabulary means changing the prompt and the tier mapping
/// together (see `score::category_bonus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TechInsight,
    IndustryObservation,
    ProductReview,
    PersonalReflection,
    TutorialGuide,
    NewsFlash,
    LifeSharing,
    Other,
}

impl Category {
    /// Every category, in the order the prompt presents them.
    pub const ALL: [Category; 8] = [
        Category::TechInsight,
        Category::IndustryObservation,
        Category::ProductReview,
        Category::PersonalReflection,
        Category::TutorialGuide,
        Category::NewsFlash,
        Category::LifeSharing,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TechInsight => "tech_insight",
            Category::IndustryObservation => "industry_observation",
            Category::ProductReview => "product_review",
            Category::PersonalReflection => "personal_reflection",
            Category::TutorialGuide => "tutorial_guide",
            Category::NewsFlash => "news_flash",
            Category::LifeSharing => "life_sharing",
            Category::Other => "other",
        }
    }

    /// Parse a classifier-emitted slug. Anything unrecognized maps to
    /// `Other` rather than failing the post.
    pub fn from_slug(s: &str) -> Self {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four boolean signals the fast-tier classifier judges per post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub has_unique_insight: bool,
    #[serde(default)]
    pub is_inspirational: bool,
    #[serde(default)]
    pub is_well_written: bool,
    #[serde(default)]
    pub is_debatable: bool,
}

impl Attributes {
    /// Build from a JSON object where flags may be booleans or 0/1 numbers
    /// (the prompt asks for 0/1 but models do not always comply).
    pub fn from_json(map: &Map<String, Value>) -> Self {
        Self {
            has_unique_insight: json_flag(map.get("has_unique_insight")),
            is_inspirational: json_flag(map.get("is_inspirational")),
            is_well_written: json_flag(map.get("is_well_written")),
            is_debatable: json_flag(map.get("is_debatable")),
        }
    }
}

fn json_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

/// Output of fast-tier classification, persisted alongside the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityResult {
    pub category: Category,
    pub has_image: bool,
    pub attributes: Attributes,
}

impl PriorityResult {
    /// Build from an extracted classifier response. Missing or malformed
    /// fields default conservatively instead of failing the post.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let category = map
            .get("post_category")
            .and_then(|v| v.as_str())
            .map(Category::from_slug)
            .unwrap_or(Category::Other);

        let attributes = map
            .get("attributes")
            .and_then(|v| v.as_object())
            .map(Attributes::from_json)
            .unwrap_or_default();

        Self {
            category,
            has_image: json_flag(map.get("has_image")),
            attributes,
        }
    }
}

/// The three top-level facets a depth report must carry to be valid.
pub const REQUIRED_FACETS: [&str; 3] = [
    "deconstruction",
    "internalization_and_expression_techniques",
    "reconstruction_showcase",
];

/// A validated deep-analysis report.
///
/// The underlying shape is model-emitted JSON; construction guarantees the
/// three required facets are present, and accessors check everything else
/// before treating it as typed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthReport(Map<String, Value>);

impl DepthReport {
    /// Validate a parsed report. Returns the missing facet names on failure.
    pub fn from_json(map: Map<String, Value>) -> Result<Self, Vec<String>> {
        let missing: Vec<String> = REQUIRED_FACETS
            .iter()
            .filter(|f| !map.contains_key(**f))
            .map(|f| f.to_string())
            .collect();

        if missing.is_empty() {
            Ok(Self(map))
        } else {
            Err(missing)
        }
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.0
    }

    fn facet(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(|v| v.as_object())
    }

    pub fn core_thesis(&self) -> Option<&str> {
        self.facet("deconstruction")?
            .get("core_thesis")?
            .as_str()
    }

    pub fn post_type(&self) -> Option<&str> {
        self.facet("deconstruction")?.get("post_type")?.as_str()
    }

    pub fn underlying_assumption(&self) -> Option<&str> {
        self.facet("deconstruction")?
            .get("underlying_assumption")?
            .as_str()
    }

    pub fn primary_insight(&self) -> Option<&str> {
        self.facet("internalization_and_expression_techniques")?
            .get("primary_insight")?
            .as_str()
    }

    pub fn technique_analysis(&self) -> Option<&Vec<Value>> {
        self.facet("internalization_and_expression_techniques")?
            .get("technique_analysis")?
            .as_array()
    }

    pub fn reconstruction_showcase(&self) -> Option<&Vec<Value>> {
        self.0.get("reconstruction_showcase")?.as_array()
    }

    /// Optional model-supplied page title.
    pub fn page_title(&self) -> Option<&str> {
        self.0.get("page_title")?.as_str()
    }
}

/// The durable per-fingerprint row owned by the fingerprint store.
#[derive(Debug, Clone)]
pub struct ProcessingRecord {
    pub platform: Platform,
    pub post_id: String,
    pub content: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub priority_result: Option<PriorityResult>,
    pub score: i32,
    pub is_worth_processing: bool,
    pub depth_report: Option<Value>,
    pub model_used: Option<String>,
    pub published: bool,
    pub published_location: Option<String>,
}

impl ProcessingRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.platform, self.post_id.clone())
    }
}

/// Aggregate counts over the fingerprint store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_processed: u64,
    pub worth_processing: u64,
    pub depth_analyzed: u64,
    pub published: u64,
}

fn image_markup_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image pattern is valid"))
}

/// Remove embedded image markup (`![alt](url)`) from post content.
/// Used both for the clean-length richness metric and to keep image noise
/// out of analysis prompts.
pub fn strip_image_markup(content: &str) -> String {
    image_markup_pattern()
        .replace_all(content, "")
        .trim()
        .to_string()
}
