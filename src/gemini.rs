//! Client for the Gemini `generateContent` REST endpoint, plus the
//! JSON-block extraction the letter and card pipelines share. The model
//! answers in free-form text; callers ask for a fenced JSON block and we
//! dig it out, falling back to the first brace-delimited object.

use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").unwrap());

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    /// Sends a prompt and returns the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Api {
                message: format!("Gemini returned HTTP {status}"),
            });
        }

        let payload: Value = response.json().await?;
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| AppError::MissingField("candidates[0].content.parts[0].text".into()))?;
        debug!("Gemini returned {} chars", text.len());
        Ok(text.to_string())
    }
}

/// Extracts the JSON payload out of free-form model text: a fenced
/// ```json block first, then the outermost brace-delimited object.
pub fn extract_json_block(text: &str) -> Option<String> {
    if let Some(captures) = JSON_FENCE.captures(text) {
        return Some(captures[1].to_string());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_wins() {
        let text = "Here you go:\n```json\n{\"intro\": \"hi\"}\n```\nEnjoy!";
        assert_eq!(extract_json_block(text).unwrap(), "{\"intro\": \"hi\"}");
    }

    #[test]
    fn bare_object_is_found_without_a_fence() {
        let text = "Sure thing. {\"intro\": \"hi\", \"outro\": \"bye\"} Anything else?";
        let block = extract_json_block(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&block).unwrap();
        assert_eq!(value["outro"], "bye");
    }

    #[test]
    fn garbage_yields_none() {
        assert!(extract_json_block("no json here at all").is_none());
        assert!(extract_json_block("} backwards {").is_none());
    }
}
