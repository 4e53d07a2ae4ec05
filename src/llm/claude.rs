use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{Completion, CompletionRequest, ProviderKind, TextProvider};
use crate::utils::http::{get_http_client, summarize_error_body, truncate_for_log};
use crate::utils::timing::log_llm_timing;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    api_key: String,
    base_url: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        ClaudeClient {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// `None` when no Anthropic key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.anthropic_api_key.trim().is_empty() {
            return None;
        }
        Some(ClaudeClient::new(
            config.anthropic_api_key.trim(),
            config.anthropic_base_url.as_str(),
            config.claude_model.as_str(),
        ))
    }

    fn build_payload(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        })
    }

    async fn call_messages_api(&self, payload: Value) -> Result<MessagesResponse> {
        let url = format!("{}/messages", self.base_url);
        let response = get_http_client()
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    "Claude request failed to send: {} (timeout={}, connect={})",
                    err,
                    err.is_timeout(),
                    err.is_connect()
                );
                anyhow!("Claude request failed: {err}")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Claude API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Claude request failed with status {}: {}",
                status,
                detail
            ));
        }

        let value = response.json::<MessagesResponse>().await?;
        Ok(value)
    }
}

fn extract_text(response: &MessagesResponse) -> String {
    response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl TextProvider for ClaudeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let payload = self.build_payload(request);
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                target: "llm.claude",
                model = %self.model,
                prompt = %truncate_for_log(&request.prompt, 2000)
            );
        }

        let metadata = json!({ "max_tokens": request.max_output_tokens });
        log_llm_timing(
            ProviderKind::Claude.as_str(),
            &self.model,
            request.operation,
            Some(metadata),
            || async {
                let response = self.call_messages_api(payload).await?;
                let text = extract_text(&response);
                if text.trim().is_empty() {
                    return Err(anyhow!("Claude returned an empty response"));
                }
                let tokens_used = response
                    .usage
                    .as_ref()
                    .map(|usage| usage.input_tokens + usage.output_tokens)
                    .unwrap_or(0);
                Ok(Completion { text, tokens_used })
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_a_single_user_message() {
        let client = ClaudeClient::new("key", "https://api.example.test/v1/", "claude-test");
        assert_eq!(client.base_url, "https://api.example.test/v1");

        let payload = client.build_payload(&CompletionRequest {
            prompt: "Write a tagline".to_string(),
            temperature: 0.7,
            max_output_tokens: 4000,
            top_p: Some(0.8),
            top_k: Some(40),
            operation: "generate_content",
        });
        assert_eq!(payload["model"], "claude-test");
        assert_eq!(payload["max_tokens"], 4000);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "Write a tagline");
        assert!(payload.get("top_k").is_none());
    }

    #[test]
    fn text_blocks_are_joined_and_usage_summed() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "Hello " },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "there" }
            ],
            "usage": { "input_tokens": 12, "output_tokens": 30 }
        }))
        .unwrap();
        assert_eq!(extract_text(&response), "Hello there");
        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens + usage.output_tokens, 42);
    }
}
