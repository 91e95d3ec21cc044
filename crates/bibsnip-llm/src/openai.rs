//! OpenAI-compatible chat-completions backend.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Value, json};

use crate::{LlmError, ProviderBackend, QueryRequest, classify_api_error, read_capped_body};

const API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend;

/// Build the chat-completions request body. `json_mode` maps to the
/// structured-output `response_format` the API supports natively.
pub(crate) fn build_request_body(model: &str, request: &QueryRequest) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": request.prompt }],
        "temperature": request.temperature,
    });
    if request.json_mode {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

pub(crate) fn extract_reply_text(data: &Value) -> Option<String> {
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

impl ProviderBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "OpenAI"
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
            let body = build_request_body(model, request);
            let mut req = client
                .post(format!("{API_BASE}/chat/completions"))
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&body);
            if let Some(t) = timeout {
                req = req.timeout(t);
            }
            let resp = req.send().await?;

            let status = resp.status();
            if !status.is_success() {
                let body = read_capped_body(resp).await;
                return Err(classify_api_error("OpenAI", status.as_u16(), body));
            }

            let data: Value = resp.json().await?;
            extract_reply_text(&data).ok_or_else(|| LlmError::MalformedReply {
                provider: "OpenAI",
                detail: "choices[0].message.content missing".into(),
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
                .header("Authorization", format!("Bearer {api_key}"))
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = read_capped_body(resp).await;
                return Err(classify_api_error("OpenAI", status.as_u16(), body));
            }

            let data: Value = resp.json().await?;
            let models = data["data"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|m| m["id"].as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            Ok(models)
        })
    }
}
