use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::access::CurrentUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::pagination;
use crate::api::patch::{nullable, overlay};
use crate::db::models::{BrandAnalytics, BrandFields, BrandRow, JsonMap};
use crate::state::AppState;

const NAME_TAKEN: &str = "Brand name already exists";

/// Partial update body. An absent key leaves the stored value untouched and an
/// explicit `null` clears it; `name` and `is_active` can only be replaced.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BrandUpdate {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub industry: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub website_url: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub brand_voice: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub color_palette: Option<Option<JsonMap>>,
    #[serde(deserialize_with = "nullable")]
    pub typography: Option<Option<JsonMap>>,
    #[serde(deserialize_with = "nullable")]
    pub logo_urls: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub imagery_style: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub messaging_pillars: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub target_audience: Option<Option<JsonMap>>,
    #[serde(deserialize_with = "nullable")]
    pub brand_values: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub competitors: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub content_guidelines: Option<Option<JsonMap>>,
    #[serde(deserialize_with = "nullable")]
    pub approved_hashtags: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub banned_words: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "nullable")]
    pub style_guide_url: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub social_media_handles: Option<Option<JsonMap>>,
    pub is_active: Option<bool>,
}

impl BrandUpdate {
    fn apply(self, fields: &mut BrandFields) {
        if let Some(name) = self.name {
            fields.name = name;
        }
        overlay(&mut fields.description, self.description);
        overlay(&mut fields.industry, self.industry);
        overlay(&mut fields.website_url, self.website_url);
        overlay(&mut fields.brand_voice, self.brand_voice);
        overlay(&mut fields.color_palette, self.color_palette);
        overlay(&mut fields.typography, self.typography);
        overlay(&mut fields.logo_urls, self.logo_urls);
        overlay(&mut fields.imagery_style, self.imagery_style);
        overlay(&mut fields.messaging_pillars, self.messaging_pillars);
        overlay(&mut fields.target_audience, self.target_audience);
        overlay(&mut fields.brand_values, self.brand_values);
        overlay(&mut fields.competitors, self.competitors);
        overlay(&mut fields.content_guidelines, self.content_guidelines);
        overlay(&mut fields.approved_hashtags, self.approved_hashtags);
        overlay(&mut fields.banned_words, self.banned_words);
        overlay(&mut fields.style_guide_url, self.style_guide_url);
        overlay(&mut fields.social_media_handles, self.social_media_handles);
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
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
        return Err(ApiError::BadRequest("Brand name is required".to_string()));
    }
    Ok(name.to_string())
}

/// Loads a brand owned by the caller. Foreign and missing ids look the same.
pub(super) async fn owned_brand(state: &AppState, brand_id: i64, user_id: i64) -> ApiResult<BrandRow> {
    state
        .db
        .find_owned_brand(brand_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Brand not found or access denied".to_string()))
}

pub async fn create_brand(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(mut fields): Json<BrandFields>,
) -> ApiResult<(StatusCode, Json<BrandRow>)> {
    fields.name = require_name(&fields.name)?;
    if state.db.brand_name_taken(user.id, &fields.name, None).await? {
        return Err(ApiError::Conflict(NAME_TAKEN.to_string()));
    }
    let brand = state
        .db
        .insert_brand(user.id, &fields)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(NAME_TAKEN))?;
    info!("User {} created brand {} '{}'", user.id, brand.id, brand.name);
    Ok((StatusCode::CREATED, Json(brand)))
}

pub async fn list_brands(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<BrandRow>>> {
    let (skip, limit) = pagination::window(query.skip, query.limit);
    Ok(Json(state.db.list_brands(user.id, skip, limit).await?))
}

pub async fn get_brand(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(brand_id): Path<i64>,
) -> ApiResult<Json<BrandRow>> {
    Ok(Json(owned_brand(&state, brand_id, user.id).await?))
}

pub async fn update_brand(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(brand_id): Path<i64>,
    Json(update): Json<BrandUpdate>,
) -> ApiResult<Json<BrandRow>> {
    let brand = owned_brand(&state, brand_id, user.id).await?;
    let is_active = update.is_active.unwrap_or(brand.is_active);
    let mut fields = BrandFields::from(&brand);
    update.apply(&mut fields);
    fields.name = require_name(&fields.name)?;

    if fields.name != brand.name
        && state
            .db
            .brand_name_taken(user.id, &fields.name, Some(brand_id))
            .await?
    {
        return Err(ApiError::Conflict(NAME_TAKEN.to_string()));
    }

    let updated = state
        .db
        .update_brand(brand_id, &fields, is_active)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(NAME_TAKEN))?;
    Ok(Json(updated))
}

pub async fn delete_brand(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(brand_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    owned_brand(&state, brand_id, user.id).await?;
    state.db.soft_delete_brand(brand_id).await?;
    Ok(Json(json!({ "message": "Brand deleted successfully" })))
}

pub async fn brand_analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(brand_id): Path<i64>,
) -> ApiResult<Json<BrandAnalytics>> {
    let brand = owned_brand(&state, brand_id, user.id).await?;
    Ok(Json(state.db.brand_analytics(&brand).await?))
}

pub async fn duplicate_brand(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(brand_id): Path<i64>,
    Query(query): Query<DuplicateQuery>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let original = owned_brand(&state, brand_id, user.id).await?;
    let new_name = require_name(&query.new_name)?;
    if state.db.brand_name_taken(user.id, &new_name, None).await? {
        return Err(ApiError::Conflict(NAME_TAKEN.to_string()));
    }

    let mut fields = BrandFields::from(&original);
    fields.name = new_name;
    let copy = state
        .db
        .insert_brand(user.id, &fields)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(NAME_TAKEN))?;
    info!("Duplicated brand {} into {} '{}'", original.id, copy.id, copy.name);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Brand duplicated successfully", "new_brand": copy })),
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/brands", get(list_brands).post(create_brand))
        .route(
            "/brands/{brand_id}",
            get(get_brand).put(update_brand).delete(delete_brand),
        )
        .route("/brands/{brand_id}/analytics", get(brand_analytics))
        .route("/brands/{brand_id}/duplicate", post(duplicate_brand))
}
