use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;

pub type JsonMap = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    SocialPost,
    BannerAd,
    VideoScript,
    EmailCampaign,
    BlogPost,
    ProductDescription,
}

impl ContentType {
    pub const ALL: [ContentType; 6] = [
        ContentType::SocialPost,
        ContentType::BannerAd,
        ContentType::VideoScript,
        ContentType::EmailCampaign,
        ContentType::BlogPost,
        ContentType::ProductDescription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::SocialPost => "social_post",
            ContentType::BannerAd => "banner_ad",
            ContentType::VideoScript => "video_script",
            ContentType::EmailCampaign => "email_campaign",
            ContentType::BlogPost => "blog_post",
            ContentType::ProductDescription => "product_description",
        }
    }

    /// Human label, e.g. `Social Post`.
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::SocialPost => "Social Post",
            ContentType::BannerAd => "Banner Ad",
            ContentType::VideoScript => "Video Script",
            ContentType::EmailCampaign => "Email Campaign",
            ContentType::BlogPost => "Blog Post",
            ContentType::ProductDescription => "Product Description",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "content type",
                value: value.to_string(),
            })
    }
}

impl TryFrom<String> for ContentType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Generated,
    Reviewed,
    Approved,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Generated => "generated",
            ContentStatus::Reviewed => "reviewed",
            ContentStatus::Approved => "approved",
            ContentStatus::Published => "published",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(ContentStatus::Draft),
            "generated" => Ok(ContentStatus::Generated),
            "reviewed" => Ok(ContentStatus::Reviewed),
            "approved" => Ok(ContentStatus::Approved),
            "published" => Ok(ContentStatus::Published),
            other => Err(UnknownVariant {
                kind: "content status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ContentStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Editable brand guideline fields, shared by create, update and duplicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub brand_voice: Option<String>,
    #[serde(default)]
    pub color_palette: Option<JsonMap>,
    #[serde(default)]
    pub typography: Option<JsonMap>,
    #[serde(default)]
    pub logo_urls: Option<Vec<String>>,
    #[serde(default)]
    pub imagery_style: Option<String>,
    #[serde(default)]
    pub messaging_pillars: Option<Vec<String>>,
    #[serde(default)]
    pub target_audience: Option<JsonMap>,
    #[serde(default)]
    pub brand_values: Option<Vec<String>>,
    #[serde(default)]
    pub competitors: Option<Vec<String>>,
    #[serde(default)]
    pub content_guidelines: Option<JsonMap>,
    #[serde(default)]
    pub approved_hashtags: Option<Vec<String>>,
    #[serde(default)]
    pub banned_words: Option<Vec<String>>,
    #[serde(default)]
    pub style_guide_url: Option<String>,
    #[serde(default)]
    pub social_media_handles: Option<JsonMap>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BrandRow {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub website_url: Option<String>,
    pub brand_voice: Option<String>,
    pub color_palette: Option<Json<JsonMap>>,
    pub typography: Option<Json<JsonMap>>,
    pub logo_urls: Option<Json<Vec<String>>>,
    pub imagery_style: Option<String>,
    pub messaging_pillars: Option<Json<Vec<String>>>,
    pub target_audience: Option<Json<JsonMap>>,
    pub brand_values: Option<Json<Vec<String>>>,
    pub competitors: Option<Json<Vec<String>>>,
    pub content_guidelines: Option<Json<JsonMap>>,
    pub approved_hashtags: Option<Json<Vec<String>>>,
    pub banned_words: Option<Json<Vec<String>>>,
    pub style_guide_url: Option<String>,
    pub social_media_handles: Option<Json<JsonMap>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn unwrap_json<T: Clone>(value: &Option<Json<T>>) -> Option<T> {
    value.as_ref().map(|json| json.0.clone())
}

impl From<&BrandRow> for BrandFields {
    fn from(row: &BrandRow) -> Self {
        BrandFields {
            name: row.name.clone(),
            description: row.description.clone(),
            industry: row.industry.clone(),
            website_url: row.website_url.clone(),
            brand_voice: row.brand_voice.clone(),
            color_palette: unwrap_json(&row.color_palette),
            typography: unwrap_json(&row.typography),
            logo_urls: unwrap_json(&row.logo_urls),
            imagery_style: row.imagery_style.clone(),
            messaging_pillars: unwrap_json(&row.messaging_pillars),
            target_audience: unwrap_json(&row.target_audience),
            brand_values: unwrap_json(&row.brand_values),
            competitors: unwrap_json(&row.competitors),
            content_guidelines: unwrap_json(&row.content_guidelines),
            approved_hashtags: unwrap_json(&row.approved_hashtags),
            banned_words: unwrap_json(&row.banned_words),
            style_guide_url: row.style_guide_url.clone(),
            social_media_handles: unwrap_json(&row.social_media_handles),
        }
    }
}

/// Editable campaign fields, shared by create, update and duplicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub target_audience: Option<JsonMap>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
    #[serde(default)]
    pub content_types: Option<Vec<String>>,
    #[serde(default)]
    pub content_count: Option<JsonMap>,
    #[serde(default)]
    pub content_specs: Option<JsonMap>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CampaignRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub brand_id: i64,
    pub creator_id: i64,
    pub objective: Option<String>,
    pub target_audience: Option<Json<JsonMap>>,
    pub budget: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub platforms: Option<Json<Vec<String>>>,
    pub content_types: Option<Json<Vec<String>>>,
    pub content_count: Option<Json<JsonMap>>,
    pub content_specs: Option<Json<JsonMap>>,
    pub status: String,
    pub progress: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&CampaignRow> for CampaignFields {
    fn from(row: &CampaignRow) -> Self {
        CampaignFields {
            name: row.name.clone(),
            description: row.description.clone(),
            objective: row.objective.clone(),
            target_audience: unwrap_json(&row.target_audience),
            budget: row.budget,
            start_date: row.start_date,
            end_date: row.end_date,
            platforms: unwrap_json(&row.platforms),
            content_types: unwrap_json(&row.content_types),
            content_count: unwrap_json(&row.content_count),
            content_specs: unwrap_json(&row.content_specs),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentPieceRow {
    pub id: i64,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub content_type: ContentType,
    pub brand_id: i64,
    pub campaign_id: Option<i64>,
    pub creator_id: i64,
    pub generated_text: Option<String>,
    pub generated_html: Option<String>,
    pub image_prompt: Option<String>,
    pub image_urls: Option<Json<Vec<String>>>,
    pub video_script: Option<String>,
    pub metadata: Option<Json<JsonMap>>,
    pub ai_model_used: Option<String>,
    pub generation_prompt: Option<String>,
    pub generation_parameters: Option<Json<JsonMap>>,
    pub reference_materials_used: Option<Json<Vec<i64>>>,
    pub platform: Option<String>,
    pub dimensions: Option<String>,
    pub duration: Option<i64>,
    pub word_count: Option<i64>,
    pub character_count: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    pub approval_notes: Option<String>,
    pub revision_count: i64,
    pub is_active: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentPieceRow {
    /// Text used for consistency analysis: structured `main_text`, then the
    /// whole structured payload, then the raw generated text.
    pub fn analysis_text(&self) -> Option<String> {
        if let Some(Json(metadata)) = &self.metadata {
            let main_text = metadata
                .get("main_text")
                .and_then(|value| value.as_str())
                .unwrap_or("")
                .trim();
            if !main_text.is_empty() {
                return Some(main_text.to_string());
            }
            if !metadata.is_empty() {
                return Some(Value::Object(metadata.clone()).to_string());
            }
        }
        self.generated_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct NewContentPiece {
    pub title: String,
    pub content_type: ContentType,
    pub brand_id: i64,
    pub campaign_id: Option<i64>,
    pub creator_id: i64,
    pub generated_text: Option<String>,
    pub generated_html: Option<String>,
    pub image_prompt: Option<String>,
    pub video_script: Option<String>,
    pub metadata: Option<JsonMap>,
    pub ai_model_used: String,
    pub generation_prompt: String,
    pub generation_parameters: JsonMap,
    pub reference_materials_used: Vec<i64>,
    pub platform: Option<String>,
    pub word_count: Option<i64>,
    pub character_count: Option<i64>,
    pub status: ContentStatus,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReferenceMaterialRow {
    pub id: i64,
    pub brand_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub file_type: String,
    pub file_url: String,
    pub file_size: Option<i64>,
    pub original_filename: String,
    pub extracted_text: Option<String>,
    pub color_analysis: Option<Json<JsonMap>>,
    pub style_analysis: Option<Json<JsonMap>>,
    pub content_tags: Option<Json<Vec<String>>>,
    pub usage_count: i64,
    pub last_used: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReferenceMaterialRow {
    pub fn tags(&self) -> &[String] {
        self.content_tags
            .as_ref()
            .map(|json| json.0.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct NewReferenceMaterial {
    pub brand_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub file_type: String,
    pub file_url: String,
    pub file_size: i64,
    pub original_filename: String,
    pub extracted_text: Option<String>,
    pub color_analysis: Option<JsonMap>,
    pub style_analysis: Option<JsonMap>,
    pub content_tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub content_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct PlatformCount {
    pub platform: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandAnalytics {
    pub brand_id: i64,
    pub brand_name: String,
    pub total_content_pieces: i64,
    pub total_campaigns: i64,
    pub content_by_type: Vec<TypeCount>,
    pub content_by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignAnalytics {
    pub campaign_id: i64,
    pub campaign_name: String,
    pub campaign_status: String,
    pub campaign_progress: f64,
    pub total_content_pieces: i64,
    pub content_by_type: Vec<TypeCount>,
    pub content_by_status: Vec<StatusCount>,
    pub content_by_platform: Vec<PlatformCount>,
}
