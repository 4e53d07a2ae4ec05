use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::access::CurrentUser;
use crate::api::brands::owned_brand;
use crate::api::error::{ApiError, ApiResult};
use crate::api::pagination;
use crate::api::patch::{nullable, overlay};
use crate::db::campaigns::CampaignFilter;
use crate::db::models::{CampaignAnalytics, CampaignFields, CampaignRow, JsonMap};
use crate::state::AppState;

const NAME_TAKEN: &str = "Campaign name already exists for this brand";

#[derive(Debug, Deserialize)]
pub struct CampaignCreate {
    pub brand_id: i64,
    #[serde(flatten)]
    pub fields: CampaignFields,
}

/// Partial update body; an explicit `null` clears an optional field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub objective: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub target_audience: Option<Option<JsonMap>>,
    #[serde(deserialize_with = "nullable")]
    pub budget: Option<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub platforms: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub content_types: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub content_count: Option<Option<JsonMap>>,
    #[serde(deserialize_with = "nullable")]
    pub content_specs: Option<Option<JsonMap>>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub is_active: Option<bool>,
}

impl CampaignUpdate {
    fn apply(&mut self, fields: &mut CampaignFields) {
        if let Some(name) = self.name.take() {
            fields.name = name;
        }
        overlay(&mut fields.description, self.description.take());
        overlay(&mut fields.objective, self.objective.take());
        overlay(&mut fields.target_audience, self.target_audience.take());
        overlay(&mut fields.budget, self.budget.take());
        overlay(&mut fields.start_date, self.start_date.take());
        overlay(&mut fields.end_date, self.end_date.take());
        overlay(&mut fields.platforms, self.platforms.take());
        overlay(&mut fields.content_types, self.content_types.take());
        overlay(&mut fields.content_count, self.content_count.take());
        overlay(&mut fields.content_specs, self.content_specs.take());
    }
}

#[derive(Debug, Deserialize)]
pub struct CampaignListQuery {
    pub brand_id: Option<i64>,
    pub status: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DuplicateQuery {
    pub new_name: String,
}

fn require_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Campaign name is required".to_string()));
    }
    Ok(name.to_string())
}

fn check_progress(progress: f64) -> ApiResult<f64> {
    if !(0.0..=100.0).contains(&progress) {
        return Err(ApiError::BadRequest(
            "Campaign progress must be between 0 and 100".to_string(),
        ));
    }
    Ok(progress)
}

async fn owned_campaign(state: &AppState, campaign_id: i64, user_id: i64) -> ApiResult<CampaignRow> {
    state
        .db
        .find_owned_campaign(campaign_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Campaign not found".to_string()))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CampaignCreate>,
) -> ApiResult<(StatusCode, Json<CampaignRow>)> {
    let brand = owned_brand(&state, body.brand_id, user.id).await?;
    let mut fields = body.fields;
    fields.name = require_name(&fields.name)?;
    if state
        .db
        .campaign_name_taken(brand.id, &fields.name, None)
        .await?
    {
        return Err(ApiError::Conflict(NAME_TAKEN.to_string()));
    }

    let campaign = state
        .db
        .insert_campaign(brand.id, user.id, &fields)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(NAME_TAKEN))?;
    info!(
        "User {} created campaign {} '{}' for brand {}",
        user.id, campaign.id, campaign.name, brand.id
    );
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CampaignListQuery>,
) -> ApiResult<Json<Vec<CampaignRow>>> {
    if let Some(brand_id) = query.brand_id {
        owned_brand(&state, brand_id, user.id).await?;
    }
    let (skip, limit) = pagination::window(query.skip, query.limit);
    let filter = CampaignFilter {
        brand_id: query.brand_id,
        status: query.status,
    };
    Ok(Json(
        state.db.list_campaigns(user.id, &filter, skip, limit).await?,
    ))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(campaign_id): Path<i64>,
) -> ApiResult<Json<CampaignRow>> {
    Ok(Json(owned_campaign(&state, campaign_id, user.id).await?))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(campaign_id): Path<i64>,
    Json(mut update): Json<CampaignUpdate>,
) -> ApiResult<Json<CampaignRow>> {
    let campaign = owned_campaign(&state, campaign_id, user.id).await?;
    let mut fields = CampaignFields::from(&campaign);
    update.apply(&mut fields);
    fields.name = require_name(&fields.name)?;
    let status = update.status.unwrap_or_else(|| campaign.status.clone());
    let progress = check_progress(update.progress.unwrap_or(campaign.progress))?;
    let is_active = update.is_active.unwrap_or(campaign.is_active);

    if fields.name != campaign.name
        && state
            .db
            .campaign_name_taken(campaign.brand_id, &fields.name, Some(campaign_id))
            .await?
    {
        return Err(ApiError::Conflict(NAME_TAKEN.to_string()));
    }

    let updated = state
        .db
        .update_campaign(campaign_id, &fields, &status, progress, is_active)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(NAME_TAKEN))?;
    Ok(Json(updated))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(campaign_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    owned_campaign(&state, campaign_id, user.id).await?;
    state.db.soft_delete_campaign(campaign_id).await?;
    Ok(Json(json!({ "message": "Campaign deleted successfully" })))
}

pub async fn campaign_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(campaign_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let campaign = owned_campaign(&state, campaign_id, user.id).await?;
    let (skip, limit) = pagination::window(query.skip, query.limit);
    let pieces = state.db.campaign_content(campaign_id, skip, limit).await?;
    let total_content = state.db.campaign_content_count(campaign_id).await?;
    Ok(Json(json!({
        "campaign_id": campaign.id,
        "campaign_name": campaign.name,
        "total_content": total_content,
        "content_pieces": pieces,
    })))
}

pub async fn campaign_analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(campaign_id): Path<i64>,
) -> ApiResult<Json<CampaignAnalytics>> {
    let campaign = owned_campaign(&state, campaign_id, user.id).await?;
    Ok(Json(state.db.campaign_analytics(&campaign).await?))
}

pub async fn duplicate_campaign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(campaign_id): Path<i64>,
    Query(query): Query<DuplicateQuery>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let original = owned_campaign(&state, campaign_id, user.id).await?;
    let new_name = require_name(&query.new_name)?;
    if state
        .db
        .campaign_name_taken(original.brand_id, &new_name, None)
        .await?
    {
        return Err(ApiError::Conflict(NAME_TAKEN.to_string()));
    }

    // A copy starts over: planning status with no schedule.
    let mut fields = CampaignFields::from(&original);
    fields.name = new_name;
    fields.start_date = None;
    fields.end_date = None;
    let copy = state
        .db
        .insert_campaign(original.brand_id, user.id, &fields)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(NAME_TAKEN))?;
    info!("Duplicated campaign {} into {} '{}'", original.id, copy.id, copy.name);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Campaign duplicated successfully", "new_campaign": copy })),
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/{campaign_id}",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/{campaign_id}/content", get(campaign_content))
        .route("/campaigns/{campaign_id}/analytics", get(campaign_analytics))
        .route("/campaigns/{campaign_id}/duplicate", post(duplicate_campaign))
}
