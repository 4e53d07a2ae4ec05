use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::db::models::{ContentType, JsonMap};

// Greedy on purpose: first `{` through last `}`.
static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

/// A model reply, either a JSON object found in the text or the text itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Structured(JsonMap),
    Raw(String),
}

pub fn parse_reply(text: &str) -> ParsedReply {
    let Some(found) = JSON_OBJECT_RE.find(text) else {
        return ParsedReply::Raw(text.to_string());
    };
    match serde_json::from_str::<Value>(found.as_str()) {
        Ok(Value::Object(map)) => ParsedReply::Structured(map),
        _ => ParsedReply::Raw(text.to_string()),
    }
}

impl ParsedReply {
    pub fn is_structured(&self) -> bool {
        matches!(self, ParsedReply::Structured(_))
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        match self {
            ParsedReply::Structured(map) => map.get(key).and_then(Value::as_str),
            ParsedReply::Raw(_) => None,
        }
    }

    /// JSON view returned to clients; raw replies are wrapped with
    /// `parsed: false`.
    pub fn to_json(&self, content_type: ContentType) -> Value {
        match self {
            ParsedReply::Structured(map) => Value::Object(map.clone()),
            ParsedReply::Raw(text) => json!({
                "raw_content": text,
                "parsed": false,
                "content_type": content_type.as_str(),
            }),
        }
    }
}
