use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::models::{BrandRow, ContentStatus, ContentType, JsonMap, NewContentPiece};
use crate::generation::parse::{parse_reply, ParsedReply};
use crate::generation::prompt::{
    build_consistency_prompt, build_content_prompt, build_image_prompt, ContentBrief,
};
use crate::llm::{CompletionRequest, DispatchError, ProviderKind, ProviderRegistry};
use crate::utils::language::resolve_output_language;

const CONTENT_TEMPERATURE: f32 = 0.7;
const CONTENT_MAX_TOKENS: u32 = 4000;
// Sampling overrides only the Gemini client forwards.
const GEMINI_CONTENT_TOP_P: f32 = 0.8;
const GEMINI_CONTENT_TOP_K: u32 = 40;
const IMAGE_PROMPT_TEMPERATURE: f32 = 0.6;
const IMAGE_PROMPT_MAX_TOKENS: u32 = 500;
const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub brief: ContentBrief<'a>,
    /// Explicit output language; detected from the brief when absent.
    pub language: Option<&'a str>,
    pub preferred: Option<ProviderKind>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub content: ParsedReply,
    pub provider: ProviderKind,
    pub model_used: String,
    pub prompt_used: String,
    pub tokens_used: u64,
}

/// Where a generated piece is filed.
#[derive(Debug, Clone)]
pub struct PieceContext<'a> {
    pub brand_id: i64,
    pub brand_name: &'a str,
    pub campaign_id: Option<i64>,
    pub creator_id: i64,
    pub content_type: ContentType,
    pub platform: Option<String>,
    pub reference_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub overall_score: i64,
    pub voice_alignment: i64,
    pub values_alignment: i64,
    pub guideline_compliance: i64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub brand_consistency: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Brand consistency analysis returned no usable JSON")]
    Unparseable,
}

fn score(map: &JsonMap, key: &str) -> i64 {
    let raw = match map.get(key) {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    (raw.round() as i64).clamp(0, 100)
}

fn string_list(map: &JsonMap, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

impl ConsistencyReport {
    pub fn from_map(map: &JsonMap) -> Self {
        ConsistencyReport {
            overall_score: score(map, "overall_score"),
            voice_alignment: score(map, "voice_alignment"),
            values_alignment: score(map, "values_alignment"),
            guideline_compliance: score(map, "guideline_compliance"),
            strengths: string_list(map, "strengths"),
            weaknesses: string_list(map, "weaknesses"),
            suggestions: string_list(map, "suggestions"),
            brand_consistency: map
                .get("brand_consistency")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

impl GenerationOutcome {
    /// The text counts and HTML are derived from: `main_text` of a structured
    /// reply, or the raw reply.
    pub fn main_text(&self) -> Option<&str> {
        let text = match &self.content {
            ParsedReply::Structured(_) => self.content.field_str("main_text"),
            ParsedReply::Raw(text) => Some(text.as_str()),
        };
        text.filter(|text| !text.trim().is_empty())
    }

    pub fn into_content_piece(self, context: PieceContext<'_>) -> NewContentPiece {
        let main_text = self.main_text().map(str::to_string);
        let image_prompt = self.content.field_str("image_prompt").map(str::to_string);
        let video_script = self.content.field_str("script").map(str::to_string);
        let mut generation_parameters = JsonMap::new();
        generation_parameters.insert("provider".to_string(), json!(self.provider));
        generation_parameters.insert("tokens_used".to_string(), json!(self.tokens_used));

        let (generated_text, metadata) = match self.content {
            ParsedReply::Structured(map) => (None, Some(map)),
            ParsedReply::Raw(text) => (Some(text), None),
        };

        NewContentPiece {
            title: format!("{} - {}", context.content_type.label(), context.brand_name),
            content_type: context.content_type,
            brand_id: context.brand_id,
            campaign_id: context.campaign_id,
            creator_id: context.creator_id,
            generated_text,
            generated_html: main_text.as_deref().map(render_html),
            image_prompt,
            video_script,
            metadata,
            ai_model_used: self.model_used,
            generation_prompt: self.prompt_used,
            generation_parameters,
            reference_materials_used: context.reference_ids,
            platform: context.platform,
            word_count: main_text
                .as_deref()
                .map(|text| text.split_whitespace().count() as i64),
            character_count: main_text.as_deref().map(|text| text.chars().count() as i64),
            status: ContentStatus::Generated,
        }
    }
}

/// Brand-conditioned generation on top of the provider registry.
pub struct ContentGenerator {
    registry: ProviderRegistry,
}

impl ContentGenerator {
    pub fn new(registry: ProviderRegistry) -> Self {
        ContentGenerator { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn generate_content(
        &self,
        request: &GenerationRequest<'_>,
    ) -> Result<GenerationOutcome, DispatchError> {
        let language = resolve_output_language(request.language, request.brief.brief);
        let prompt = build_content_prompt(&request.brief, language.as_deref());

        let completion_request = CompletionRequest {
            prompt: prompt.clone(),
            temperature: CONTENT_TEMPERATURE,
            max_output_tokens: CONTENT_MAX_TOKENS,
            top_p: Some(GEMINI_CONTENT_TOP_P),
            top_k: Some(GEMINI_CONTENT_TOP_K),
            operation: "generate_content",
        };

        let dispatched = self
            .registry
            .complete_with_fallback(request.preferred, &completion_request)
            .await?;
        let content = parse_reply(&dispatched.completion.text);
        info!(
            "Generated {} for brand '{}' via {} (structured={}, tokens={})",
            request.brief.content_type,
            request.brief.brand.name,
            dispatched.provider,
            content.is_structured(),
            dispatched.completion.tokens_used
        );

        Ok(GenerationOutcome {
            content,
            provider: dispatched.provider,
            model_used: dispatched.model,
            prompt_used: prompt,
            tokens_used: dispatched.completion.tokens_used,
        })
    }

    /// Never fails: any provider problem yields a plain descriptive prompt.
    pub async fn generate_image_prompt(
        &self,
        brand: &BrandRow,
        content_description: &str,
        style_preferences: Option<&JsonMap>,
        preferred: Option<ProviderKind>,
    ) -> String {
        let fallback = format!(
            "Create an image for {} showing {}",
            brand.name, content_description
        );
        let request = CompletionRequest {
            prompt: build_image_prompt(brand, content_description, style_preferences),
            temperature: IMAGE_PROMPT_TEMPERATURE,
            max_output_tokens: IMAGE_PROMPT_MAX_TOKENS,
            top_p: None,
            top_k: None,
            operation: "generate_image_prompt",
        };

        match self.registry.complete_with_fallback(preferred, &request).await {
            Ok(dispatched) => {
                let text = dispatched.completion.text.trim();
                if text.is_empty() {
                    fallback
                } else {
                    text.to_string()
                }
            }
            Err(err) => {
                warn!("Image prompt generation failed: {}", err);
                fallback
            }
        }
    }

    pub async fn analyze_brand_consistency(
        &self,
        brand: &BrandRow,
        content: &str,
        content_type: ContentType,
        preferred: Option<ProviderKind>,
    ) -> Result<ConsistencyReport, AnalysisError> {
        let request = CompletionRequest {
            prompt: build_consistency_prompt(brand, content),
            temperature: ANALYSIS_TEMPERATURE,
            max_output_tokens: ANALYSIS_MAX_TOKENS,
            top_p: None,
            top_k: None,
            operation: "analyze_brand_consistency",
        };

        let dispatched = self
            .registry
            .complete_with_fallback(preferred, &request)
            .await?;
        match parse_reply(&dispatched.completion.text) {
            ParsedReply::Structured(map) => Ok(ConsistencyReport::from_map(&map)),
            ParsedReply::Raw(_) => {
                warn!(
                    "Consistency analysis of {} for brand '{}' returned unparseable output",
                    content_type, brand.name
                );
                Err(AnalysisError::Unparseable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::generation::prompt::fixtures::{bare_brand, map, rich_brand};
    use crate::llm::registry::testing::{registry_of, ScriptedProvider};

    fn brief(brand: &BrandRow) -> ContentBrief<'_> {
        ContentBrief {
            brand,
            content_type: ContentType::SocialPost,
            brief: "Launch our autumn blend",
            platform: Some("instagram"),
            target_audience: None,
            reference_materials: &[],
            additional_context: None,
        }
    }

    fn context(brand: &BrandRow) -> PieceContext<'_> {
        PieceContext {
            brand_id: brand.id,
            brand_name: &brand.name,
            campaign_id: None,
            creator_id: 9,
            content_type: ContentType::SocialPost,
            platform: Some("instagram".to_string()),
            reference_ids: vec![1],
        }
    }

    #[tokio::test]
    async fn structured_reply_lands_in_metadata_with_counts() {
        let reply = r##"Sure! {"main_text": "Fall is **here** at Acme", "hashtags": ["#brew"], "image_prompt": "A mug"}"##;
        let claude = Arc::new(ScriptedProvider::new(ProviderKind::Claude, vec![Ok(reply)]));
        let generator = ContentGenerator::new(registry_of(&[&claude]));
        let brand = rich_brand();

        let outcome = generator
            .generate_content(&GenerationRequest {
                brief: brief(&brand),
                language: Some("English"),
                preferred: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.provider, ProviderKind::Claude);
        assert!(outcome.prompt_used.contains("**Language:** English"));

        let sent = claude.requests.lock()[0].clone();
        assert_eq!(sent.max_output_tokens, 4000);
        assert_eq!(sent.temperature, 0.7);

        let piece = outcome.into_content_piece(context(&brand));
        assert_eq!(piece.title, "Social Post - Acme Coffee");
        assert!(piece.generated_text.is_none());
        assert_eq!(piece.metadata.as_ref().unwrap()["hashtags"], json!(["#brew"]));
        assert_eq!(piece.image_prompt.as_deref(), Some("A mug"));
        assert_eq!(piece.word_count, Some(5));
        assert_eq!(piece.character_count, Some(24));
        assert_eq!(
            piece.generated_html.as_deref(),
            Some("<p>Fall is <strong>here</strong> at Acme</p>\n")
        );
        assert_eq!(piece.generation_parameters["provider"], json!("claude"));
        assert_eq!(piece.status, ContentStatus::Generated);
    }

    #[tokio::test]
    async fn raw_reply_is_kept_as_text_after_fallback() {
        let claude = Arc::new(ScriptedProvider::new(ProviderKind::Claude, vec![Err("down")]));
        let gemini = Arc::new(ScriptedProvider::new(
            ProviderKind::Gemini,
            vec![Ok("Just a plain caption")],
        ));
        let generator = ContentGenerator::new(registry_of(&[&claude, &gemini]));
        let brand = bare_brand("Acme");

        let outcome = generator
            .generate_content(&GenerationRequest {
                brief: brief(&brand),
                language: None,
                preferred: Some(ProviderKind::Claude),
            })
            .await
            .unwrap();
        assert_eq!(outcome.provider, ProviderKind::Gemini);
        assert_eq!(outcome.model_used, "gemini-test-model");

        let sent = gemini.requests.lock()[0].clone();
        assert_eq!(sent.top_k, Some(40));

        let piece = outcome.into_content_piece(context(&brand));
        assert_eq!(piece.generated_text.as_deref(), Some("Just a plain caption"));
        assert!(piece.metadata.is_none());
        assert_eq!(piece.word_count, Some(4));
        assert_eq!(piece.generation_parameters["provider"], json!("gemini"));
    }

    #[tokio::test]
    async fn generation_without_providers_is_reported() {
        let generator = ContentGenerator::new(ProviderRegistry::default());
        let brand = bare_brand("Acme");
        let err = generator
            .generate_content(&GenerationRequest {
                brief: brief(&brand),
                language: None,
                preferred: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoProviders));
    }

    #[tokio::test]
    async fn image_prompt_is_trimmed_or_falls_back() {
        let claude = Arc::new(ScriptedProvider::new(
            ProviderKind::Claude,
            vec![Ok("  Golden-hour still life  \n")],
        ));
        let generator = ContentGenerator::new(registry_of(&[&claude]));
        let brand = bare_brand("Acme");
        let style = map(json!({"mood": "calm"}));

        assert_eq!(
            generator
                .generate_image_prompt(&brand, "a mug", Some(&style), None)
                .await,
            "Golden-hour still life"
        );
        assert_eq!(claude.requests.lock()[0].max_output_tokens, 500);
        assert_eq!(
            generator.generate_image_prompt(&brand, "a mug", None, None).await,
            "Create an image for Acme showing a mug"
        );
    }

    #[tokio::test]
    async fn consistency_scores_are_clamped_and_raw_replies_rejected() {
        let reply = r#"{"overall_score": 120, "voice_alignment": "88", "values_alignment": 70.6,
            "guideline_compliance": -5, "strengths": ["Tone"], "weaknesses": [],
            "suggestions": "Shorter CTA", "brand_consistency": "high"}"#;
        let gemini = Arc::new(ScriptedProvider::new(
            ProviderKind::Gemini,
            vec![Ok(reply), Ok("I cannot score this.")],
        ));
        let generator = ContentGenerator::new(registry_of(&[&gemini]));
        let brand = rich_brand();

        let report = generator
            .analyze_brand_consistency(&brand, "Buy now", ContentType::SocialPost, None)
            .await
            .unwrap();
        assert_eq!(
            report,
            ConsistencyReport {
                overall_score: 100,
                voice_alignment: 88,
                values_alignment: 71,
                guideline_compliance: 0,
                strengths: vec!["Tone".to_string()],
                weaknesses: vec![],
                suggestions: vec!["Shorter CTA".to_string()],
                brand_consistency: "high".to_string(),
            }
        );
        assert_eq!(gemini.requests.lock()[0].temperature, 0.3);

        let err = generator
            .analyze_brand_consistency(&brand, "Buy now", ContentType::SocialPost, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Unparseable));
    }
}
