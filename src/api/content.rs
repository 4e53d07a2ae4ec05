use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::api::access::CurrentUser;
use crate::api::brands::owned_brand;
use crate::api::error::{ApiError, ApiResult};
use crate::api::pagination;
use crate::db::content::ContentFilter;
use crate::db::models::{ContentPieceRow, ContentStatus, ContentType, JsonMap};
use crate::generation::{
    ConsistencyReport, ContentBrief, GenerationRequest, PieceContext,
};
use crate::llm::ProviderKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateContentBody {
    pub brand_id: i64,
    pub content_type: ContentType,
    pub brief: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<i64>,
    #[serde(default)]
    pub target_audience: Option<JsonMap>,
    #[serde(default)]
    pub additional_context: Option<JsonMap>,
    #[serde(default)]
    pub reference_material_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub preferred_ai_provider: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentListQuery {
    pub brand_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub content_type: Option<ContentType>,
    pub status: Option<ContentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub new_status: ContentStatus,
    pub approval_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub content_piece_id: i64,
    #[serde(default)]
    pub preferred_ai_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImagePromptBody {
    pub brand_id: i64,
    pub content_description: String,
    #[serde(default)]
    pub style_preferences: Option<JsonMap>,
    #[serde(default)]
    pub preferred_ai_provider: Option<String>,
}

/// Unknown provider names fall back to the default selection.
fn preferred_provider(raw: Option<&str>) -> Option<ProviderKind> {
    raw.and_then(|value| value.parse::<ProviderKind>().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A stored piece plus the parsed reply it came from; unparsed replies show
/// up as `{raw_content, parsed: false, content_type}`.
#[derive(Debug, Serialize)]
pub struct GeneratedContent {
    #[serde(flatten)]
    pub piece: ContentPieceRow,
    pub content: Value,
}

async fn owned_content(state: &AppState, content_id: i64, user_id: i64) -> ApiResult<ContentPieceRow> {
    state
        .db
        .find_owned_content(content_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Content piece not found".to_string()))
}

pub async fn generate_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<GenerateContentBody>,
) -> ApiResult<(StatusCode, Json<GeneratedContent>)> {
    let brief = body.brief.trim();
    if brief.is_empty() {
        return Err(ApiError::BadRequest("Brief is required".to_string()));
    }
    let brand = owned_brand(&state, body.brand_id, user.id).await?;

    if let Some(campaign_id) = body.campaign_id {
        state
            .db
            .find_campaign_for_brand(campaign_id, brand.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Campaign not found".to_string()))?;
    }

    let reference_ids = body.reference_material_ids.unwrap_or_default();
    let references = state
        .db
        .reference_materials_for_generation(&reference_ids, brand.id)
        .await?;
    let platform = non_empty(body.platform);
    let language = non_empty(body.language);

    let request = GenerationRequest {
        brief: ContentBrief {
            brand: &brand,
            content_type: body.content_type,
            brief,
            platform: platform.as_deref(),
            target_audience: body.target_audience.as_ref(),
            reference_materials: &references,
            additional_context: body.additional_context.as_ref(),
        },
        language: language.as_deref(),
        preferred: preferred_provider(body.preferred_ai_provider.as_deref()),
    };
    let outcome = state.generator.generate_content(&request).await?;
    let content = outcome.content.to_json(body.content_type);

    let piece = outcome.into_content_piece(PieceContext {
        brand_id: brand.id,
        brand_name: &brand.name,
        campaign_id: body.campaign_id,
        creator_id: user.id,
        content_type: body.content_type,
        platform,
        reference_ids: references.iter().map(|material| material.id).collect(),
    });
    let stored = state.db.insert_content_piece(&piece).await?;
    info!(
        "User {} generated content piece {} ({}) for brand {}",
        user.id, stored.id, stored.content_type, brand.id
    );
    Ok((
        StatusCode::CREATED,
        Json(GeneratedContent {
            piece: stored,
            content,
        }),
    ))
}

pub async fn list_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Json<Vec<ContentPieceRow>>> {
    if let Some(brand_id) = query.brand_id {
        owned_brand(&state, brand_id, user.id).await?;
    }
    let (offset, limit) = pagination::window(query.offset, query.limit);
    let filter = ContentFilter {
        brand_id: query.brand_id,
        campaign_id: query.campaign_id,
        content_type: query.content_type,
        status: query.status,
    };
    Ok(Json(
        state.db.list_content(user.id, &filter, offset, limit).await?,
    ))
}

pub async fn get_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<ContentPieceRow>> {
    Ok(Json(owned_content(&state, content_id, user.id).await?))
}

pub async fn delete_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    owned_content(&state, content_id, user.id).await?;
    state.db.delete_content_piece(content_id).await?;
    Ok(Json(json!({ "message": "Content piece deleted successfully" })))
}

pub async fn update_content_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(content_id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    owned_content(&state, content_id, user.id).await?;
    let notes = non_empty(query.approval_notes);
    let updated = state
        .db
        .update_content_status(content_id, query.new_status, notes.as_deref())
        .await?;
    Ok(Json(json!({
        "message": "Status updated successfully",
        "new_status": updated.status,
        "content": updated,
    })))
}

pub async fn analyze_consistency(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AnalyzeBody>,
) -> ApiResult<Json<ConsistencyReport>> {
    let piece = owned_content(&state, body.content_piece_id, user.id).await?;
    let brand = owned_brand(&state, piece.brand_id, user.id).await?;
    let text = piece.analysis_text().ok_or_else(|| {
        ApiError::BadRequest("No content text available for analysis".to_string())
    })?;

    let report = state
        .generator
        .analyze_brand_consistency(
            &brand,
            &text,
            piece.content_type,
            preferred_provider(body.preferred_ai_provider.as_deref()),
        )
        .await?;
    Ok(Json(report))
}

pub async fn generate_image_prompt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ImagePromptBody>,
) -> ApiResult<Json<Value>> {
    let description = body.content_description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest(
            "Content description is required".to_string(),
        ));
    }
    let brand = owned_brand(&state, body.brand_id, user.id).await?;
    let image_prompt = state
        .generator
        .generate_image_prompt(
            &brand,
            description,
            body.style_preferences.as_ref(),
            preferred_provider(body.preferred_ai_provider.as_deref()),
        )
        .await;
    Ok(Json(json!({
        "image_prompt": image_prompt,
        "brand_name": brand.name,
        "content_description": description,
    })))
}

pub async fn available_providers(State(state): State<AppState>) -> Json<Value> {
    let registry = state.generator.registry();
    Json(json!({
        "available_providers": registry.available(),
        "provider_details": {
            "claude": {
                "name": "Claude (Anthropic)",
                "available": registry.is_available(ProviderKind::Claude),
            },
            "gemini": {
                "name": "Google Gemini",
                "available": registry.is_available(ProviderKind::Gemini),
            },
        },
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/content", get(list_content))
        .route("/content/generate", post(generate_content))
        .route("/content/analyze-consistency", post(analyze_consistency))
        .route("/content/generate-image-prompt", post(generate_image_prompt))
        .route("/content/providers/available", get(available_providers))
        .route(
            "/content/{content_id}",
            get(get_content).delete(delete_content),
        )
        .route("/content/{content_id}/status", put(update_content_status))
}
