use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{Completion, CompletionRequest, ProviderKind, TextProvider};
use crate::utils::http::{get_http_client, summarize_error_body, truncate_for_log};
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    total_token_count: Option<u64>,
}

const GEMINI_MAX_RETRY_ATTEMPTS: usize = 2;
const GEMINI_RETRY_BASE_DELAY_MS: u64 = 900;

fn gemini_should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn gemini_should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn gemini_retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(GEMINI_RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn build_generation_config(request: &CompletionRequest) -> Value {
    let mut config = Map::new();
    config.insert("temperature".to_string(), json!(request.temperature));
    config.insert("maxOutputTokens".to_string(), json!(request.max_output_tokens));
    if let Some(top_p) = request.top_p {
        config.insert("topP".to_string(), json!(top_p));
    }
    if let Some(top_k) = request.top_k {
        config.insert("topK".to_string(), json!(top_k));
    }
    Value::Object(config)
}

fn extract_text_from_response(response: &GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.iter().flatten() {
        let parts = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_ref());
        for part in parts.into_iter().flatten() {
            if let Some(text) = part.text.as_deref() {
                if !text.trim().is_empty() {
                    text_parts.push(text);
                }
            }
        }
    }
    text_parts.join("\n")
}

/// Google Generative Language API client (`generateContent`).
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        GeminiClient {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// `None` when no Google key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.gemini_api_key.trim().is_empty() {
            return None;
        }
        Some(GeminiClient::new(
            config.gemini_api_key.trim(),
            config.gemini_base_url.as_str(),
            config.gemini_model.as_str(),
        ))
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn build_payload(&self, request: &CompletionRequest) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": build_generation_config(request),
        })
    }

    async fn call_gemini_api(&self, payload: Value) -> Result<GeminiResponse> {
        let client = get_http_client();
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match client.post(&url).json(&payload).send().await {
                Ok(response) => response,
                Err(err) => {
                    let err_text = self.redact_api_key(&err.to_string());
                    let should_retry =
                        gemini_should_retry_error(&err) && attempt < GEMINI_MAX_RETRY_ATTEMPTS;
                    warn!(
                        "Gemini request failed to send: {} (timeout={}, connect={}, retrying={})",
                        err_text,
                        err.is_timeout(),
                        err.is_connect(),
                        should_retry
                    );
                    if should_retry {
                        tokio::time::sleep(gemini_retry_delay(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Gemini request failed: {}", err_text));
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let (message, body_summary) = summarize_error_body(&body);
                let should_retry =
                    gemini_should_retry_status(status) && attempt < GEMINI_MAX_RETRY_ATTEMPTS;
                warn!(
                    "Gemini API error: status={}, body={}, retrying={}",
                    status,
                    self.redact_api_key(&body_summary),
                    should_retry
                );
                if should_retry {
                    tokio::time::sleep(gemini_retry_delay(attempt)).await;
                    continue;
                }
                let detail = self.redact_api_key(&message.unwrap_or(body_summary));
                return Err(anyhow!(
                    "Gemini request failed with status {}: {}",
                    status,
                    detail
                ));
            }

            let value = response.json::<GeminiResponse>().await.map_err(|err| {
                anyhow!("Gemini response could not be decoded: {}", self.redact_api_key(&err.to_string()))
            })?;
            return Ok(value);
        }
    }
}

#[async_trait]
impl TextProvider for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let payload = self.build_payload(request);
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                target: "llm.gemini",
                model = %self.model,
                prompt = %truncate_for_log(&request.prompt, 2000)
            );
        }

        let metadata = json!({ "max_output_tokens": request.max_output_tokens });
        log_llm_timing(
            ProviderKind::Gemini.as_str(),
            &self.model,
            request.operation,
            Some(metadata),
            || async {
                let response = self.call_gemini_api(payload).await?;
                let text = extract_text_from_response(&response);
                if text.trim().is_empty() {
                    return Err(anyhow!("Gemini returned an empty response"));
                }
                let tokens_used = response
                    .usage_metadata
                    .and_then(|usage| usage.total_token_count)
                    .unwrap_or(0);
                Ok(Completion { text, tokens_used })
            },
        )
        .await
    }
}
