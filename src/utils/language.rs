use once_cell::sync::Lazy;
use regex::Regex;
use whatlang::{detect, Script};

const MIN_ALPHA_CHARS: usize = 12;
const LATIN_CONFIDENCE_THRESHOLD: f64 = 0.68;
const NON_LATIN_CONFIDENCE_THRESHOLD: f64 = 0.5;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid url regex"));
static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\s)#[\p{L}\p{N}_]+").expect("valid hashtag regex"));
static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\s)@[a-z0-9_.]{2,}").expect("valid mention regex"));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strips the parts of a marketing brief that carry no language signal
/// (links, hashtags, handles) before detection.
fn normalize_brief(text: &str) -> String {
    let without_urls = URL_RE.replace_all(text, " ");
    let without_hashtags = HASHTAG_RE.replace_all(&without_urls, " ");
    let without_mentions = MENTION_RE.replace_all(&without_hashtags, " ");
    WHITESPACE_RE
        .replace_all(&without_mentions, " ")
        .trim()
        .to_string()
}

pub fn detect_language_name(text: &str) -> Option<String> {
    let normalized = normalize_brief(text);
    if normalized.chars().filter(|ch| ch.is_alphabetic()).count() < MIN_ALPHA_CHARS {
        return None;
    }

    let info = detect(&normalized)?;
    let threshold = match info.script() {
        Script::Latin => LATIN_CONFIDENCE_THRESHOLD,
        _ => NON_LATIN_CONFIDENCE_THRESHOLD,
    };
    if info.is_reliable() || info.confidence() >= threshold {
        return Some(info.lang().eng_name().to_string());
    }

    None
}

/// Language the generated copy should be written in: an explicit request wins,
/// otherwise whatever the brief is confidently written in.
pub fn resolve_output_language(requested: Option<&str>, brief: &str) -> Option<String> {
    if let Some(language) = requested.map(str::trim).filter(|value| !value.is_empty()) {
        return Some(language.to_string());
    }
    detect_language_name(brief)
}
