use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

use crate::config::CONFIG;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(CONFIG.llm_timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("brand-content-studio/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls a human-readable message out of a provider error body.
///
/// Returns the `error.message` (or top-level `message`) when the body is JSON,
/// together with a truncated copy of the body for logging.
pub fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_prefers_nested_message() {
        let (message, summary) =
            summarize_error_body(r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#);
        assert_eq!(message.as_deref(), Some("Overloaded"));
        assert!(summary.contains("overloaded_error"));
    }

    #[test]
    fn error_body_handles_plain_text_and_empty() {
        let (message, summary) = summarize_error_body("  upstream exploded ");
        assert!(message.is_none());
        assert_eq!(summary, "upstream exploded");

        let (message, summary) = summarize_error_body("   ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        assert_eq!(truncate_for_log("héllo", 10), "héllo");
        assert_eq!(truncate_for_log("héllo", 2), "hé... (truncated)");
    }
}
