//! Gemini-compatible generateContent backend.
//!
//! The generateContent endpoint mixes snake_case (`system_instruction`) and
//! camelCase (`generationConfig`); everything this backend sends is in the
//! camelCase group.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Value, json};

use crate::{LlmError, ProviderBackend, QueryRequest, classify_api_error, read_capped_body};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend;

/// Build the generateContent request body. `json_mode` maps to
/// `responseMimeType: application/json`, Gemini's structured-output knob.
pub(crate) fn build_request_body(request: &QueryRequest) -> Value {
    let mut gen_config = json!({ "temperature": request.temperature });
    if request.json_mode {
        gen_config["responseMimeType"] = json!("application/json");
    }
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": gen_config,
    })
}

/// Concatenate every text part of the first candidate.
pub(crate) fn extract_reply_text(data: &Value) -> Option<String> {
    let parts = data["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() { None } else { Some(text) }
}

impl ProviderBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn query<'a>(
        &'a self,
        client: &'a reqwest::Client,
        api_key: &'a str,
        model: &'a str,
        request: &'a QueryRequest,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let body = build_request_body(request);
            let mut req = client
                .post(format!("{API_BASE}/models/{model}:generateContent"))
                .header("x-goog-api-key", api_key)
                .json(&body);
            if let Some(t) = timeout {
                req = req.timeout(t);
            }
            let resp = req.send().await?;

            let status = resp.status();
            if !status.is_success() {
                let body = read_capped_body(resp).await;
                return Err(classify_api_error("Gemini", status.as_u16(), body));
            }

            let data: Value = resp.json().await?;
            extract_reply_text(&data).ok_or_else(|| LlmError::MalformedReply {
                provider: "Gemini",
                detail: "candidates[0].content.parts had no text".into(),
            })
        })
    }

    fn list_models<'a>(
        &'a self,
        client: &'a reqwest::Client,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = client
                .get(format!("{API_BASE}/models"))
                .header("x-goog-api-key", api_key)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = read_capped_body(resp).await;
                return Err(classify_api_error("Gemini", status.as_u16(), body));
            }

            let data: Value = resp.json().await?;
            let models = data["models"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|m| m["name"].as_str())
                        .map(|name| name.strip_prefix("models/").unwrap_or(name).to_string())
                        .collect()
                })
                .unwrap_or_default();
            Ok(models)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json_mode: bool) -> QueryRequest {
        QueryRequest {
            prompt: "classify the citation style".into(),
            json_mode,
            temperature: 0.0,
        }
    }

    #[test]
    fn body_wraps_prompt_in_user_content() {
        let body = build_request_body(&request(false));
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "classify the citation style"
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn json_mode_sets_response_mime_type() {
        let body = build_request_body(&request(true));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn extracts_and_joins_candidate_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"start_page\"" }, { "text": ": 12}" }] }
            }]
        });
        assert_eq!(extract_reply_text(&data).unwrap(), "{\"start_page\": 12}");
    }

    #[test]
    fn empty_candidates_are_none() {
        assert!(extract_reply_text(&json!({})).is_none());
        let data = json!({ "candidates": [{ "content": { "parts": [] } }] });
        assert!(extract_reply_text(&data).is_none());
    }
}
