//! Prompts and the answer schema for page-number reading.
//!
//! Every prompt sent by the page-range parser lives here so prompt changes
//! never touch retry or sampling logic.

use serde_json::{json, Value};

/// Usage attribution for every call made by the parser.
pub const PAGE_RANGE_COMPONENT: &str = "page-range-parser";
/// Phase of a single-call read of a small group.
pub const PHASE_SMALL_GROUP: &str = "small-group";
/// Phase of a sampling attempt on a large group.
pub const PHASE_PATTERN_SAMPLING: &str = "pattern-sampling";

/// System prompt for reading printed page numbers.
pub const PAGE_NUMBER_SYSTEM_PROMPT: &str = r#"You read printed page numbers from scanned document pages.

Rules:

1. Report only the page number PRINTED on the page (header, footer, or margin).
   Never report the position of the image in the request.
2. A scanned two-page spread shows two printed numbers. Report the left one as
   startPageNo and the right one as endPageNo.
3. A single page has startPageNo equal to endPageNo.
4. Roman numerals (i, ii, xiv) are not page numbers for this task; report null.
5. If no printed number is visible, report null for both fields.
6. Respond with JSON only, matching the provided schema. No commentary."#;

/// JSON schema of every page-number answer.
pub fn page_number_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "pages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "imageIndex": { "type": "integer" },
                        "startPageNo": { "type": ["integer", "null"] },
                        "endPageNo": { "type": ["integer", "null"] }
                    },
                    "required": ["imageIndex", "startPageNo", "endPageNo"]
                }
            }
        },
        "required": ["pages"]
    })
}

/// User prompt for `image_count` attached page images.
pub fn page_number_prompt(image_count: usize) -> String {
    format!(
        "{image_count} page image(s) are attached, in order, with imageIndex 0 to {}. \
         For each image return its imageIndex, startPageNo and endPageNo.",
        image_count.saturating_sub(1)
    )
}

/// Schema instruction appended to the system prompt by the LLM caller.
pub fn schema_instruction(schema: &Value) -> String {
    format!(
        "\n\nReturn a single JSON object that validates against this JSON schema:\n{}",
        schema
    )
}
