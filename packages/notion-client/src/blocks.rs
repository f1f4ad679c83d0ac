//! Notion block builders and rich-text conversion.
//!
//! Blocks are plain `serde_json::Value` payloads matching the Notion block
//! object schema. `rich_text` converts a markdown-ish string (inline links and
//! `**bold**` spans) into Notion rich-text segments.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

fn span_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // [text](http url) or **text**
        Regex::new(r"(\[([^\]]+)\]\((https?://[^)]+)\))|(\*\*([^*]+)\*\*)")
            .expect("span pattern is valid")
    })
}

/// Plain text segment.
fn text_segment(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content } })
}

/// Convert text with inline markdown links and bold spans into Notion
/// rich-text segments. Plain text passes through as a single segment.
pub fn rich_text(text: &str) -> Vec<Value> {
    if text.is_empty() {
        return vec![text_segment("")];
    }

    let mut segments = Vec::new();
    let mut last_end = 0;

    for caps in span_pattern().captures_iter(text) {
        let m = caps.get(0).expect("match group 0 always present");
        if m.start() > last_end {
            let before = &text[last_end..m.start()];
            if !before.is_empty() {
                segments.push(text_segment(before));
            }
        }

        if let (Some(label), Some(url)) = (caps.get(2), caps.get(3)) {
            segments.push(json!({
                "type": "text",
                "text": { "content": label.as_str(), "link": { "url": url.as_str() } }
            }));
        } else if let Some(bold) = caps.get(5) {
            segments.push(json!({
                "type": "text",
                "text": { "content": bold.as_str() },
                "annotations": { "bold": true }
            }));
        }

        last_end = m.end();
    }

    if last_end < text.len() {
        segments.push(text_segment(&text[last_end..]));
    }

    if segments.is_empty() {
        segments.push(text_segment(text));
    }

    segments
}

/// Paragraph block from rich-text segments.
pub fn paragraph(rich: Vec<Value>) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": { "rich_text": rich }
    })
}

/// Paragraph with a single bold label followed by plain text.
pub fn labeled_paragraph(label: &str, text: &str) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": {
            "rich_text": [
                { "type": "text", "text": { "content": label }, "annotations": { "bold": true } },
                { "type": "text", "text": { "content": text } }
            ]
        }
    })
}

/// Callout block with an emoji icon and background color.
pub fn callout(rich: Vec<Value>, emoji: &str, color: &str) -> Value {
    json!({
        "object": "block",
        "type": "callout",
        "callout": {
            "rich_text": rich,
            "icon": { "emoji": emoji },
            "color": color
        }
    })
}

/// Quote block with a background color.
pub fn quote(text: &str, color: &str) -> Value {
    json!({
        "object": "block",
        "type": "quote",
        "quote": {
            "rich_text": [text_segment(text)],
            "color": color
        }
    })
}

/// Toggle block with a bold title and child blocks.
pub fn toggle(title: &str, children: Vec<Value>) -> Value {
    json!({
        "object": "block",
        "type": "toggle",
        "toggle": {
            "rich_text": [
                { "type": "text", "text": { "content": title }, "annotations": { "bold": true } }
            ],
            "children": children,
            "color": "default"
        }
    })
}

/// Level-3 heading with a color.
pub fn heading_3(text: &str, color: &str) -> Value {
    json!({
        "object": "block",
        "type": "heading_3",
        "heading_3": {
            "rich_text": [text_segment(text)],
            "color": color
        }
    })
}

/// Divider block.
pub fn divider() -> Value {
    json!({ "object": "block", "type": "divider", "divider": {} })
}

/// Gray, italic annotation paragraph (e.g. a rationale under a showcase).
pub fn annotation(label: &str, text: &str) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": {
            "rich_text": [
                {
                    "type": "text",
                    "text": { "content": label },
                    "annotations": { "italic": true, "color": "gray" }
                },
                {
                    "type": "text",
                    "text": { "content": text },
                    "annotations": { "italic": true }
                }
            ]
        }
    })
}
