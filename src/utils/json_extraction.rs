//! JSON extraction from model output.
//!
//! Structured-output providers usually return a bare JSON object, but some
//! models still wrap it in markdown fences or prepend reasoning prose. The
//! extractor tries, in order:
//! 1. A ```json fenced block
//! 2. A generic ``` fenced block
//! 3. The whole trimmed text when it starts with '{'
//! 4. The last balanced `{...}` object in the text that parses
//!
//! Objects only: every pipeline contract is a JSON object.

use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed_braces} unclosed braces, {unclosed_brackets} unclosed brackets. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed_braces: usize,
        unclosed_brackets: usize,
    },
    #[error("No JSON object found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// Valid JSON object text.
    Success(String),
    /// An object was opened but never closed (usually a max_tokens cut).
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
        unclosed_brackets: usize,
    },
    /// Nothing JSON-like in the response.
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, JsonExtractionResult::Truncated { .. })
    }

    /// Converts into a `Result`, using `content` for the not-found preview.
    pub fn into_result_with_context(self, content: &str) -> Result<String, JsonExtractionError> {
        match self {
            JsonExtractionResult::Success(json) => Ok(json),
            JsonExtractionResult::Truncated {
                partial_json,
                unclosed_braces,
                unclosed_brackets,
            } => Err(JsonExtractionError::Truncated {
                partial_preview: char_prefix(&partial_json, 100),
                unclosed_braces,
                unclosed_brackets,
            }),
            JsonExtractionResult::NotFound => Err(JsonExtractionError::NotFound {
                content_preview: char_prefix(content.trim(), 50),
            }),
        }
    }
}

/// Brace/bracket balance of a text fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonStructureAnalysis {
    pub unclosed_braces: usize,
    pub unclosed_brackets: usize,
    pub in_string: bool,
    pub json_start: Option<usize>,
}

impl JsonStructureAnalysis {
    fn is_open(&self) -> bool {
        self.unclosed_braces > 0 || self.unclosed_brackets > 0 || self.in_string
    }
}

/// Scans `s` tracking nesting depth outside string literals.
pub fn analyze_json_structure(s: &str) -> JsonStructureAnalysis {
    let mut braces: isize = 0;
    let mut brackets: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut json_start = None;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                json_start.get_or_insert(i);
                braces += 1;
            }
            '}' if !in_string => braces -= 1,
            '[' if !in_string => {
                json_start.get_or_insert(i);
                brackets += 1;
            }
            ']' if !in_string => brackets -= 1,
            _ => {}
        }
    }

    JsonStructureAnalysis {
        unclosed_braces: braces.max(0) as usize,
        unclosed_brackets: brackets.max(0) as usize,
        in_string,
        json_start,
    }
}

/// Returns the byte index of the `}` closing the object that opens at index 0.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts a JSON object from an LLM response.
pub fn try_extract_json_from_response(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    for fenced in [fenced_block(trimmed, "```json"), fenced_block(trimmed, "```")]
        .into_iter()
        .flatten()
    {
        if parses(&fenced) {
            return JsonExtractionResult::Success(fenced);
        }
    }

    if trimmed.starts_with('{') {
        if let Some(end) = find_matching_brace(trimmed) {
            let candidate = &trimmed[..=end];
            if parses(candidate) {
                return JsonExtractionResult::Success(candidate.to_string());
            }
        }
    }

    if let Some(json) = last_valid_object(trimmed) {
        return JsonExtractionResult::Success(json);
    }

    let analysis = analyze_json_structure(trimmed);
    match analysis.json_start {
        Some(start) if analysis.is_open() => JsonExtractionResult::Truncated {
            partial_json: trimmed[start..].to_string(),
            unclosed_braces: analysis.unclosed_braces,
            unclosed_brackets: analysis.unclosed_brackets,
        },
        _ => JsonExtractionResult::NotFound,
    }
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate)
        .map(|v| v.is_object())
        .unwrap_or(false)
}

fn fenced_block(content: &str, opener: &str) -> Option<String> {
    let start = content.find(opener)? + opener.len();
    let rest = &content[start..];
    // Skip a language tag on the opening line of a generic fence.
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

fn last_valid_object(content: &str) -> Option<String> {
    let mut found = None;
    let mut search_from = 0;

    while let Some(offset) = content[search_from..].find('{') {
        let start = search_from + offset;
        match find_matching_brace(&content[start..]) {
            Some(end) => {
                let candidate = &content[start..=start + end];
                if parses(candidate) {
                    found = Some(candidate.to_string());
                    search_from = start + end + 1;
                    continue;
                }
                search_from = start + 1;
            }
            None => break,
        }
    }
    found
}

fn char_prefix(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
