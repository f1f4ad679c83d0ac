//! Structured-response extraction from free-text model output.
//!
//! Models asked for pure JSON still wrap it in code fences, prepend prose,
//! or emit control characters. Recovery is an ordered chain of pure
//! strategies, each returning the parsed object or falling through to the
//! next. Exhaustion logs the truncated raw content and returns `None`;
//! this module never panics on model output.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::types::REQUIRED_FACETS;

/// Extract a JSON object from raw model output.
///
/// Strategies, in order:
/// 1. the whole text parses as-is
/// 2. a fenced ```json block encloses the object
/// 3. leading/trailing fence marker lines are stripped even when unpaired
/// 4. the span from the first `{` to the last `}` is the candidate
/// 5. control characters are removed, then (4) is retried
///
/// Every candidate must parse to a JSON *object*; anything else falls
/// through.
pub fn extract_json(content: &str) -> Option<Map<String, Value>> {
    let content = content.trim();
    if content.is_empty() {
        warn!("model output is empty, nothing to extract");
        return None;
    }

    let strategies: [fn(&str) -> Option<Map<String, Value>>; 5] = [
        parse_direct,
        parse_fenced_block,
        parse_stripped_fences,
        parse_brace_span,
        parse_control_stripped,
    ];

    for strategy in strategies {
        if let Some(object) = strategy(content) {
            return Some(object);
        }
    }

    // The output may contain the expected field names without being valid
    // JSON; note them so the failure is diagnosable.
    let fragments: Vec<&str> = REQUIRED_FACETS
        .iter()
        .copied()
        .filter(|f| content.contains(f))
        .collect();
    if !fragments.is_empty() {
        warn!(
            fragments = ?fragments,
            "output contains expected field names but no strategy parsed it"
        );
    }

    warn!(
        preview = %truncate(content, 200),
        "all JSON extraction strategies failed"
    );
    None
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_direct(content: &str) -> Option<Map<String, Value>> {
    parse_object(content)
}

fn fenced_block_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("fence pattern is valid")
    })
}

fn parse_fenced_block(content: &str) -> Option<Map<String, Value>> {
    let caps = fenced_block_pattern().captures(content)?;
    let inner = caps.get(1)?.as_str().trim();
    let parsed = parse_object(inner);
    if parsed.is_some() {
        debug!("extracted JSON from fenced block");
    }
    parsed
}

/// Strip fence marker lines even when they are not a matched pair, e.g. an
/// opening ```json with no closing fence.
fn parse_stripped_fences(content: &str) -> Option<Map<String, Value>> {
    if !content.starts_with("```") {
        return None;
    }

    let mut lines: Vec<&str> = content.lines().collect();
    if lines.first().is_some_and(|l| l.starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }

    parse_object(lines.join("\n").trim())
}

fn brace_span(content: &str) -> Option<&str> {
    let first = content.find('{')?;
    let last = content.rfind('}')?;
    if last > first {
        Some(&content[first..=last])
    } else {
        None
    }
}

fn parse_brace_span(content: &str) -> Option<Map<String, Value>> {
    parse_object(brace_span(content)?)
}

fn parse_control_stripped(content: &str) -> Option<Map<String, Value>> {
    let cleaned: String = content
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    parse_object(brace_span(&cleaned)?)
}

fn truncate(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}
