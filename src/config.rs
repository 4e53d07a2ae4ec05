use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub claude_model: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub llm_timeout_seconds: u64,
    pub allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub max_file_size_mb: u64,
    pub allowed_image_types: Vec<String>,
    pub allowed_document_types: Vec<String>,
    pub rate_limit_per_minute: u32,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn split_csv(value: &str, lowercase: bool) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if lowercase {
                entry.to_lowercase()
            } else {
                entry.to_string()
            }
        })
        .collect()
}

fn env_csv(name: &str, default: &str, lowercase: bool) -> Vec<String> {
    let parsed = split_csv(&env_string(name, default), lowercase);
    if parsed.is_empty() {
        return split_csv(default, lowercase);
    }
    parsed
}

fn normalize_database_url(value: String) -> String {
    let trimmed = value.trim();
    if let Some(rest) = trimmed.strip_prefix("sqlite+aiosqlite:///") {
        return format!("sqlite://{rest}");
    }
    if let Some(rest) = trimmed.strip_prefix("sqlite+aiosqlite://") {
        return format!("sqlite://{rest}");
    }
    if let Some(rest) = trimmed.strip_prefix("sqlite:///") {
        return format!("sqlite://{rest}");
    }
    trimmed.to_string()
}

fn first_non_empty_env(names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

impl Config {
    pub fn load() -> Result<Self> {
        let bind_raw = env_string("BIND_ADDR", "0.0.0.0:8000");
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|err| anyhow!("Invalid BIND_ADDR '{bind_raw}': {err}"))?;

        let anthropic_api_key = first_non_empty_env(&["ANTHROPIC_API_KEY"]);
        let gemini_api_key = first_non_empty_env(&["GOOGLE_API_KEY", "GEMINI_API_KEY"]);

        let max_file_size_mb = env_u64("MAX_FILE_SIZE_MB", 50).max(1);
        let rate_limit_per_minute = env_u32("RATE_LIMIT_PER_MINUTE", 60);

        let config = Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string("LOG_DIR", "logs")),
            bind_addr,
            database_url: normalize_database_url(env_string(
                "DATABASE_URL",
                "sqlite://brand_studio.db?mode=rwc",
            )),
            anthropic_api_key,
            anthropic_base_url: env_string("ANTHROPIC_BASE_URL", "https://api.anthropic.com/v1"),
            claude_model: env_string("CLAUDE_MODEL", "claude-3-5-sonnet-20241022"),
            gemini_api_key,
            gemini_base_url: env_string(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            gemini_model: env_string("GEMINI_MODEL", "gemini-1.5-pro"),
            llm_timeout_seconds: env_u64("LLM_TIMEOUT_SECONDS", 90).max(1),
            allowed_origins: env_csv(
                "ALLOWED_ORIGINS",
                "http://localhost:3000,http://localhost:5173",
                false,
            ),
            upload_dir: PathBuf::from(env_string("UPLOAD_DIR", "uploads")),
            max_file_size_mb,
            allowed_image_types: env_csv("ALLOWED_IMAGE_TYPES", "jpg,jpeg,png,gif,webp", true),
            allowed_document_types: env_csv("ALLOWED_DOCUMENT_TYPES", "pdf,docx,txt", true),
            rate_limit_per_minute,
        };

        Ok(config)
    }

    pub fn has_ai_provider(&self) -> bool {
        !self.anthropic_api_key.is_empty() || !self.gemini_api_key.is_empty()
    }

    /// Startup summary. `CONFIG` is first forced before the subscriber is
    /// installed, so loading stays silent and `main` calls this afterwards.
    pub fn log_summary(&self) {
        info!(
            "Configuration loaded: bind={}, database={}, upload_dir={}, max_file_size_mb={}",
            self.bind_addr,
            self.database_url,
            self.upload_dir.display(),
            self.max_file_size_mb
        );
        if !self.has_ai_provider() {
            warn!("No AI providers configured; set ANTHROPIC_API_KEY or GOOGLE_API_KEY to enable generation");
        }
    }
}

pub const CONTENT_CREATOR_PREAMBLE: &str = "You are an expert brand content creator and copywriter. Your task is to generate high-quality, brand-consistent content that perfectly aligns with the provided brand guidelines.";

pub const CONTENT_REQUIREMENTS: &[&str] = &[
    "- Ensure ALL content aligns perfectly with the brand voice and guidelines",
    "- Incorporate relevant brand values and messaging pillars naturally",
    "- Avoid any banned words or phrases",
    "- Use approved hashtags where appropriate",
    "- Consider the target audience in tone and messaging",
    "- Follow platform-specific best practices",
    "- Be creative while staying brand-consistent",
    "- Include specific calls-to-action when appropriate",
];

pub const IMAGE_PROMPT_INSTRUCTION: &str = "Generate a detailed, specific prompt for AI image generation that will create a visual that perfectly represents the brand and content. Include style, composition, colors, mood, and technical specifications.";

pub const CONSISTENCY_RESPONSE_SKELETON: &str = r#"{
    "overall_score": 85,
    "voice_alignment": 90,
    "values_alignment": 80,
    "guideline_compliance": 85,
    "strengths": ["Specific strength 1", "Specific strength 2"],
    "weaknesses": ["Specific weakness 1", "Specific weakness 2"],
    "suggestions": ["Specific improvement 1", "Specific improvement 2"],
    "brand_consistency": "high/medium/low"
}"#;

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    #[test]
    fn loading_is_silent_until_the_summary_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let config = tracing::subscriber::with_default(subscriber, || {
            let config = Config::load().unwrap();
            assert_eq!(captured.text(), "");
            config.log_summary();
            config
        });
        let logged = captured.text();
        assert!(logged.contains("Configuration loaded"), "{logged}");
        assert_eq!(
            logged.contains("No AI providers configured"),
            !config.has_ai_provider()
        );
    }

    #[test]
    fn normalizes_driver_prefixed_sqlite_urls() {
        assert_eq!(
            normalize_database_url("sqlite+aiosqlite:///studio.db".to_string()),
            "sqlite://studio.db"
        );
        assert_eq!(
            normalize_database_url("sqlite:///studio.db".to_string()),
            "sqlite://studio.db"
        );
        assert_eq!(
            normalize_database_url(" sqlite://studio.db?mode=rwc ".to_string()),
            "sqlite://studio.db?mode=rwc"
        );
    }

    #[test]
    fn csv_lists_are_trimmed_and_lowercased() {
        assert_eq!(
            split_csv(" JPG, png,,webp ", true),
            vec!["jpg".to_string(), "png".to_string(), "webp".to_string()]
        );
        assert_eq!(
            split_csv("http://A.test, http://b.test", false),
            vec!["http://A.test".to_string(), "http://b.test".to_string()]
        );
    }
}
