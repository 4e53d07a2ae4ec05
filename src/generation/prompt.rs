//! Prompt assembly for content generation, image prompts and brand
//! consistency analysis.
//!
//! Every prompt is a list of lines joined with `\n`. Optional brand fields
//! only contribute a section when they hold something; an empty list or map
//! counts as absent.

use serde_json::Value;

use crate::config::{
    CONSISTENCY_RESPONSE_SKELETON, CONTENT_CREATOR_PREAMBLE, CONTENT_REQUIREMENTS,
    IMAGE_PROMPT_INSTRUCTION,
};
use crate::db::models::{BrandRow, ContentType, JsonMap, ReferenceMaterialRow};

const REFERENCE_EXCERPT_CHARS: usize = 500;

/// Everything the content prompt is assembled from.
#[derive(Debug, Clone, Copy)]
pub struct ContentBrief<'a> {
    pub brand: &'a BrandRow,
    pub content_type: ContentType,
    pub brief: &'a str,
    pub platform: Option<&'a str>,
    pub target_audience: Option<&'a JsonMap>,
    pub reference_materials: &'a [ReferenceMaterialRow],
    pub additional_context: Option<&'a JsonMap>,
}

/// Capitalizes the first letter of every word and lowercases the rest, where
/// anything that is not a letter starts a new word (`target_age` becomes
/// `Target_Age`).
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for ch in value.chars() {
        if previous_is_letter {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_is_letter = ch.is_alphabetic();
    }
    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn key_value_lines(map: &JsonMap) -> String {
    map.iter()
        .map(|(key, value)| format!("- **{}:** {}", title_case(key), render_value(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_pairs(map: &JsonMap) -> String {
    map.iter()
        .map(|(key, value)| format!("{}: {}", key, render_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_empty_list<T>(value: &Option<sqlx::types::Json<Vec<T>>>) -> Option<&[T]> {
    value
        .as_ref()
        .map(|json| json.0.as_slice())
        .filter(|items| !items.is_empty())
}

fn non_empty_map(value: &Option<sqlx::types::Json<JsonMap>>) -> Option<&JsonMap> {
    value.as_ref().map(|json| &json.0).filter(|map| !map.is_empty())
}

fn non_empty_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}

fn format_reference_materials(materials: &[ReferenceMaterialRow]) -> String {
    let mut lines = Vec::new();
    for material in materials {
        lines.push(format!(
            "- **{}:** {}",
            material.name,
            non_empty_text(&material.description).unwrap_or("No description")
        ));
        if let Some(text) = non_empty_text(&material.extracted_text) {
            let excerpt: String = text.chars().take(REFERENCE_EXCERPT_CHARS).collect();
            lines.push(format!("  Content: {excerpt}..."));
        }
        if !material.tags().is_empty() {
            lines.push(format!("  Tags: {}", material.tags().join(", ")));
        }
    }
    lines.join("\n")
}

fn guidelines_for(platform: &str, content_type: ContentType) -> Option<&'static str> {
    use ContentType::*;
    let text = match (platform, content_type) {
        ("instagram", SocialPost) => "- Optimal length: 125-150 characters\n- Use 3-5 relevant hashtags\n- Include engaging visual description\n- Encourage interaction",
        ("instagram", BannerAd) => "- Square format (1080x1080) or story format (1080x1920)\n- Clear, bold text\n- Strong visual hierarchy\n- Compelling CTA",
        ("facebook", SocialPost) => "- Optimal length: 40-80 characters for engagement\n- Use 1-2 hashtags maximum\n- Include question or call-to-action\n- Visual content performs better",
        ("facebook", BannerAd) => "- Multiple format options\n- Clear value proposition\n- Minimal text on image\n- Strong CTA button",
        ("twitter", SocialPost) => "- Maximum 280 characters\n- Use 1-2 hashtags\n- Include mentions when relevant\n- Encourage retweets and replies",
        ("twitter", BannerAd) => "- Concise messaging\n- Clear CTA\n- Mobile-optimized\n- Video performs well",
        ("linkedin", SocialPost) => "- Professional tone\n- 150-300 characters for best engagement\n- Industry-relevant hashtags\n- Thought leadership angle",
        ("linkedin", BannerAd) => "- Professional imagery\n- B2B focused messaging\n- Clear ROI or benefit\n- Professional CTA",
        ("tiktok", SocialPost) => "- Trending hashtags\n- Short, punchy captions\n- Encourage video creation\n- Fun, authentic tone",
        ("tiktok", VideoScript) => "- Hook in first 3 seconds\n- 15-60 seconds optimal\n- Vertical format\n- Trending sounds/effects",
        _ => return None,
    };
    Some(text)
}

/// Content types with dedicated guidance on each platform, in table order.
fn platform_content_types(platform: &str) -> Option<[ContentType; 2]> {
    use ContentType::*;
    match platform {
        "instagram" | "facebook" | "twitter" | "linkedin" => Some([SocialPost, BannerAd]),
        "tiktok" => Some([SocialPost, VideoScript]),
        _ => None,
    }
}

/// Platform advice for the content type. A known platform without advice for
/// this type gets all of its advice; an unknown platform gets a generic line.
pub fn platform_guidelines(platform: &str, content_type: ContentType) -> String {
    let key = platform.to_lowercase();
    if let Some(text) = guidelines_for(&key, content_type) {
        return text.to_string();
    }
    match platform_content_types(&key) {
        Some(types) => types
            .iter()
            .filter_map(|kind| guidelines_for(&key, *kind))
            .collect::<Vec<_>>()
            .join("\n"),
        None => format!("Create content optimized for {platform}"),
    }
}

pub fn output_format_instructions(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::SocialPost => r##"
Provide the output in JSON format:
{
    "main_text": "Primary post content",
    "hashtags": ["#hashtag1", "#hashtag2"],
    "call_to_action": "Specific CTA",
    "image_description": "Description for visual content",
    "alternative_versions": ["Alternative text 1", "Alternative text 2"]
}
"##,
        ContentType::BannerAd => r##"
Provide the output in JSON format:
{
    "headline": "Main headline",
    "subheading": "Supporting text",
    "body_text": "Main ad copy",
    "call_to_action": "CTA button text",
    "image_prompt": "Detailed description for image generation",
    "design_notes": "Visual design guidance"
}
"##,
        ContentType::VideoScript => r##"
Provide the output in JSON format:
{
    "title": "Video title",
    "hook": "Opening hook (first 3-5 seconds)",
    "script": "Full video script with timestamps",
    "key_messages": ["Message 1", "Message 2"],
    "call_to_action": "End CTA",
    "visual_notes": "Visual direction and style notes",
    "duration_estimate": "Estimated duration in seconds"
}
"##,
        ContentType::EmailCampaign => r##"
Provide the output in JSON format:
{
    "subject_line": "Email subject",
    "preview_text": "Preview/preheader text",
    "headline": "Main email headline",
    "body_text": "Full email content",
    "call_to_action": "Primary CTA",
    "alternative_subject_lines": ["Alt subject 1", "Alt subject 2"]
}
"##,
        ContentType::BlogPost => r##"
Provide the output in JSON format:
{
    "title": "Blog post title",
    "meta_description": "SEO meta description",
    "introduction": "Opening paragraph",
    "main_content": "Full blog post content",
    "conclusion": "Closing paragraph",
    "call_to_action": "End CTA",
    "suggested_images": ["Image 1 description", "Image 2 description"],
    "seo_keywords": ["keyword1", "keyword2"]
}
"##,
        ContentType::ProductDescription => r##"
Provide the output in JSON format:
{
    "title": "Product title",
    "short_description": "Brief product summary",
    "detailed_description": "Full product description",
    "key_features": ["Feature 1", "Feature 2"],
    "benefits": ["Benefit 1", "Benefit 2"],
    "call_to_action": "Purchase CTA",
    "seo_keywords": ["keyword1", "keyword2"]
}
"##,
    }
}

/// Builds the generation prompt. `language` adds an output-language
/// requirement after the brief.
pub fn build_content_prompt(request: &ContentBrief<'_>, language: Option<&str>) -> String {
    let brand = request.brand;
    let mut parts: Vec<String> = vec![
        CONTENT_CREATOR_PREAMBLE.to_string(),
        String::new(),
        "## BRAND INFORMATION".to_string(),
        format!("**Brand Name:** {}", brand.name),
        format!(
            "**Industry:** {}",
            non_empty_text(&brand.industry).unwrap_or("Not specified")
        ),
        format!(
            "**Description:** {}",
            non_empty_text(&brand.description).unwrap_or("Not provided")
        ),
        String::new(),
    ];

    let mut section = |title: &str, body: String| {
        parts.push(title.to_string());
        parts.push(body);
        parts.push(String::new());
    };

    if let Some(voice) = non_empty_text(&brand.brand_voice) {
        section("## BRAND VOICE & PERSONALITY", voice.to_string());
    }

    let audience = request
        .target_audience
        .filter(|map| !map.is_empty())
        .or_else(|| non_empty_map(&brand.target_audience));
    if let Some(audience) = audience {
        section("## TARGET AUDIENCE", key_value_lines(audience));
    }

    if let Some(values) = non_empty_list(&brand.brand_values) {
        section("## BRAND VALUES", bullet_list(values));
    }
    if let Some(pillars) = non_empty_list(&brand.messaging_pillars) {
        section("## KEY MESSAGING PILLARS", bullet_list(pillars));
    }
    if let Some(guidelines) = non_empty_map(&brand.content_guidelines) {
        section("## CONTENT GUIDELINES", key_value_lines(guidelines));
    }
    if let Some(hashtags) = non_empty_list(&brand.approved_hashtags) {
        section("## APPROVED HASHTAGS", hashtags.join(", "));
    }
    if let Some(banned) = non_empty_list(&brand.banned_words) {
        section("## WORDS TO AVOID", banned.join(", "));
    }
    if !request.reference_materials.is_empty() {
        section(
            "## REFERENCE MATERIALS",
            format_reference_materials(request.reference_materials),
        );
    }
    if let Some(platform) = request.platform.filter(|value| !value.is_empty()) {
        section(
            "## PLATFORM SPECIFICATIONS",
            platform_guidelines(platform, request.content_type),
        );
    }

    parts.push("## CONTENT REQUIREMENTS".to_string());
    parts.push(format!("**Content Type:** {}", request.content_type.label()));
    parts.push(format!("**Brief:** {}", request.brief));
    if let Some(language) = language {
        parts.push(format!("**Language:** {language}"));
    }
    parts.push(String::new());

    if let Some(context) = request.additional_context.filter(|map| !map.is_empty()) {
        parts.push("## ADDITIONAL CONTEXT".to_string());
        parts.push(key_value_lines(context));
        parts.push(String::new());
    }

    parts.push("## OUTPUT FORMAT".to_string());
    parts.push(output_format_instructions(request.content_type).to_string());
    parts.push(String::new());
    parts.push("## REQUIREMENTS".to_string());
    parts.extend(CONTENT_REQUIREMENTS.iter().map(|line| line.to_string()));
    parts.push(String::new());
    parts.push("Generate the content now:".to_string());

    parts.join("\n")
}

pub fn build_image_prompt(
    brand: &BrandRow,
    content_description: &str,
    style_preferences: Option<&JsonMap>,
) -> String {
    let mut parts = vec![
        "Create a detailed image generation prompt for the following brand and content:"
            .to_string(),
        format!("Brand: {}", brand.name),
        format!("Content: {content_description}"),
    ];
    if let Some(style) = non_empty_text(&brand.imagery_style) {
        parts.push(format!("Brand imagery style: {style}"));
    }
    if let Some(colors) = non_empty_map(&brand.color_palette) {
        parts.push(format!("Brand colors: {}", inline_pairs(colors)));
    }
    if let Some(preferences) = style_preferences.filter(|map| !map.is_empty()) {
        parts.push(format!("Style preferences: {}", inline_pairs(preferences)));
    }
    parts.push(String::new());
    parts.push(IMAGE_PROMPT_INSTRUCTION.to_string());
    parts.join("\n")
}

pub fn build_consistency_prompt(brand: &BrandRow, content: &str) -> String {
    let voice = non_empty_text(&brand.brand_voice).unwrap_or("Not specified");
    let values = non_empty_list(&brand.brand_values)
        .map(bullet_list)
        .unwrap_or_else(|| "Not specified".to_string());
    let guidelines = non_empty_map(&brand.content_guidelines)
        .map(key_value_lines)
        .unwrap_or_else(|| "Not specified".to_string());

    format!(
        "\nAnalyze the following content for brand consistency:\n\n\
         BRAND: {}\n\
         BRAND VOICE: {voice}\n\
         BRAND VALUES: {values}\n\
         CONTENT GUIDELINES: {guidelines}\n\n\
         CONTENT TO ANALYZE:\n\
         {content}\n\n\
         Provide a detailed analysis in JSON format:\n\
         {CONSISTENCY_RESPONSE_SKELETON}\n",
        brand.name
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use serde_json::json;
    use sqlx::types::Json;

    use crate::db::models::{BrandRow, JsonMap};

    pub fn map(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    pub fn bare_brand(name: &str) -> BrandRow {
        BrandRow {
            id: 1,
            owner_id: 1,
            name: name.to_string(),
            description: None,
            industry: None,
            website_url: None,
            brand_voice: None,
            color_palette: None,
            typography: None,
            logo_urls: None,
            imagery_style: None,
            messaging_pillars: None,
            target_audience: None,
            brand_values: None,
            competitors: None,
            content_guidelines: None,
            approved_hashtags: None,
            banned_words: None,
            style_guide_url: None,
            social_media_handles: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn rich_brand() -> BrandRow {
        BrandRow {
            industry: Some("Coffee".to_string()),
            description: Some("Small-batch roaster".to_string()),
            brand_voice: Some("Warm and witty".to_string()),
            brand_values: Some(Json(vec!["Craft".to_string(), "Community".to_string()])),
            messaging_pillars: Some(Json(vec!["Freshness".to_string()])),
            target_audience: Some(Json(map(json!({"age_range": "25-40"})))),
            content_guidelines: Some(Json(map(json!({"tone": "friendly"})))),
            approved_hashtags: Some(Json(vec!["#brew".to_string(), "#acme".to_string()])),
            banned_words: Some(Json(vec!["cheap".to_string()])),
            imagery_style: Some("Natural light".to_string()),
            color_palette: Some(Json(map(json!({"primary": "#112233"})))),
            ..bare_brand("Acme Coffee")
        }
    }
}
