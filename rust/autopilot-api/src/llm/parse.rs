//! Parsing model output into a [`GeneratedArticle`].
//!
//! The reply must be a JSON object with `title` and `content`. Models
//! sometimes wrap it in a markdown fence or add prose around it, so after the
//! strict parse fails there is exactly one fallback: extract the first
//! balanced JSON object and parse that.

use crate::domain::GeneratedArticle;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("model reply contains no JSON object")]
    NoJsonObject,
    #[error("model reply is not valid article JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("model reply has an empty '{0}' field")]
    EmptyField(&'static str),
}

/// Parse a model reply.
pub fn parse_generated_article(raw: &str) -> Result<GeneratedArticle, ParseError> {
    let article = match serde_json::from_str::<GeneratedArticle>(raw.trim()) {
        Ok(article) => article,
        Err(strict) => {
            let Some(object) = extract_json_object(raw) else {
                return Err(if raw.contains('{') {
                    ParseError::InvalidJson(strict)
                } else {
                    ParseError::NoJsonObject
                });
            };
            tracing::debug!("Strict parse failed, using extracted JSON object");
            serde_json::from_str::<GeneratedArticle>(object)?
        }
    };

    if article.title.trim().is_empty() {
        return Err(ParseError::EmptyField("title"));
    }
    if article.content.trim().is_empty() {
        return Err(ParseError::EmptyField("content"));
    }
    Ok(article)
}

/// First balanced `{...}` in `raw`, skipping braces inside string literals.
/// Markdown fences need no special handling: the scan starts at the first `{`.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
