//! Prompt templates for the two analysis tiers.
//!
//! The priority prompt's category list is generated from [`Category::ALL`]
//! so the classifier's closed set and the scoring tiers cannot drift apart
//! silently (see `score::category_bonus`).

use crate::types::Category;

/// System prompt shared by both tiers.
pub const SYSTEM_PROMPT: &str =
    "You are a professional content analyst, skilled at summarizing and extracting key information.";

fn category_choices() -> String {
    Category::ALL
        .iter()
        .map(|c| format!("'{}'", c.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classification prompt for the fast tier: category, image flag, and four
/// boolean attributes as a single JSON object.
pub fn priority_prompt(post_content: &str) -> String {
    format!(
        r#"# Role
You are an efficient, precise content pre-processor. Your task is to analyze a social media post and output its metadata and attributes in strict JSON format.

# Task
I will provide a social media post. Complete the following three analyses:
1. **Classification**: choose the single best-fitting category from the given list.
2. **Image detection**: determine whether the post content contains image links (formatted like `![](URL)` or `![alt](URL)`).
3. **Attribute judgment**: determine whether the post has certain key qualities.

# Constraints
* For all boolean judgments, use `1` for true and `0` for false.

# Output format (follow this JSON structure strictly, with no extra explanation)
{{
  "post_category": "<one of {categories}>",
  "has_image": <1 or 0>,
  "attributes": {{
    "has_unique_insight": <1 or 0>,
    "is_inspirational": <1 or 0>,
    "is_well_written": <1 or 0>,
    "is_debatable": <1 or 0>
  }}
}}

The [post] follows:
```
{content}
```
"#,
        categories = category_choices(),
        content = post_content
    )
}

/// Deep-analysis prompt for the smart tier. Demands a pure JSON report with
/// the three required facets.
pub fn depth_prompt(analysis_content: &str) -> String {
    format!(
        r#"# 1. Role

You are a top-tier speech coach and content strategy consultant, skilled at reshaping complex or scattered information into content with strong impact and reach, through deep insight and precise language craft. Your core ability is transformation, not restatement.

# 2. Task

I will provide a [post] from social media. It may contain two parts:
1. **Original post content**: the text the user published
2. **Image visual interpretation** (optional): if the post contains images, a vision model's reading of them

Deeply analyze this post (combining text and image information) and output a structured internalization-and-recreation report that helps me improve my language organization, logic, and expression.

# 3. Constraints

* **Depth and increment**: your analysis and recreation must add value beyond the original; plain paraphrase or summary is forbidden.
* **Teaching orientation**: the report exists to teach, so the breakdown of process, method, and technique matters most.
* **Structured output**: follow the JSON output format below exactly, with nothing missing.
* **Text-image fusion**: when an image interpretation is provided, fold the visual information into the analysis.
* **CRITICAL**: return only JSON. No markdown formatting, headings, explanations, or any other content. The output must be a raw JSON object parseable by a standard JSON parser.

# 4. Output format

Complete your analysis and creation report strictly in this JSON structure:

{{
  "deconstruction": {{
    "post_type": "Which type the post belongs to. Candidates: {categories}.",
    "core_thesis": "One sentence precisely distilling the core argument or emotional core. Fold in visual information if present.",
    "underlying_assumption": "The unstated assumptions, values, or emotional motives behind the post."
  }},
  "internalization_and_expression_techniques": {{
    "primary_insight": "The most valuable point or most moving insight here. (So what?) If there are images, what key information do they carry?",
    "technique_analysis": [
      {{
        "technique_name": "Analogy/Metaphor",
        "application_suggestion": "Propose a brilliant analogy that makes an outsider get it instantly. If the post does not suit one, say why."
      }},
      {{
        "technique_name": "Storytelling",
        "application_suggestion": "How to package the post's point as a micro-story with a character, a conflict, and a resolution. Sketch a short story frame."
      }},
      {{
        "technique_name": "Data/Case Support",
        "application_suggestion": "If the post is opinion, what data or concrete cases would strengthen it? If it is factual, how to sharpen its key numbers for impact?"
      }},
      {{
        "technique_name": "Contrarian Thinking",
        "application_suggestion": "Where are the blind spots? Offer an opposing or higher-level angle on the same question."
      }}
    ]
  }},
  "reconstruction_showcase": [
    {{
      "style": "Sharp assertion (suited to X/Twitter)",
      "content": "Write a post under 140 characters opening with a forceful assertion and closing with an open question.",
      "rationale": "Explain why this style fits the topic and how it grabs attention."
    }},
    {{
      "style": "Gentle sharing (suited to a friends feed)",
      "content": "Write a post with breathing room, clear paragraphs, and 1-2 emoji for atmosphere, centered on personal feeling and inspiration.",
      "rationale": "Explain how this style builds emotional connection and warmth."
    }},
    {{
      "style": "Deep analysis (suited as talk or podcast material)",
      "content": "Expand the post into a ~300 character commentary structured as: background -> core point -> analogy or case -> elevated conclusion.",
      "rationale": "Explain how this structure carries depth and shows logical layering."
    }}
  ]
}}

**Important**:
1. Your response must be an exact realization of the JSON structure above, with no extra text, headings, preamble, or notes
2. Do not wrap it in markdown code fences (no ```json ... ```)
3. Output the raw JSON object directly
4. Every field must be filled in completely
5. Any non-JSON output is forbidden, including markdown headings, dividers, and explanatory text

The [post] follows:
```
{content}
```
"#,
        categories = category_choices(),
        content = analysis_content
    )
}

/// Compose the depth-stage analysis text: clean content, plus a labeled
/// interpretation section when a vision reading exists.
pub fn compose_analysis_content(clean_content: &str, interpretation: Option<&str>) -> String {
    match interpretation {
        Some(reading) if !reading.trim().is_empty() => format!(
            "[Original post content]\n{}\n\n[Image visual interpretation]\n{}\n",
            clean_content, reading
        ),
        _ => clean_content.to_string(),
    }
}
