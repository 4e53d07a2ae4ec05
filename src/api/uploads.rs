use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::access::CurrentUser;
use crate::api::brands::owned_brand;
use crate::api::error::{ApiError, ApiResult};
use crate::api::pagination;
use crate::db::models::{NewReferenceMaterial, ReferenceMaterialRow};
use crate::media::storage::extract_text;
use crate::media::{analyze_image, FileKind, ImageAnalysis, UploadRejection};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReferenceUploadQuery {
    pub brand_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceListQuery {
    pub brand_id: i64,
    pub file_type: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LogoUploadQuery {
    pub brand_id: i64,
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Pulls the `file` part out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        if filename.is_empty() {
            break;
        }
        return Ok(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(UploadRejection::MissingFile.into())
}

async fn owned_material(
    state: &AppState,
    material_id: i64,
    user_id: i64,
) -> ApiResult<ReferenceMaterialRow> {
    let not_found = || ApiError::NotFound("Reference material not found".to_string());
    let material = state
        .db
        .find_reference_material(material_id)
        .await?
        .ok_or_else(not_found)?;
    state
        .db
        .find_owned_brand(material.brand_id, user_id)
        .await?
        .ok_or_else(not_found)?;
    Ok(material)
}

async fn analyze_in_background(bytes: Vec<u8>) -> ApiResult<ImageAnalysis> {
    tokio::task::spawn_blocking(move || analyze_image(&bytes))
        .await
        .map_err(|err| ApiError::Other(anyhow::anyhow!("image analysis task failed: {err}")))
}

pub async fn upload_reference_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReferenceUploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ReferenceMaterialRow>)> {
    let brand = owned_brand(&state, query.brand_id, user.id).await?;
    let name = query.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    let upload = read_file_field(&mut multipart).await?;
    let policy = &state.upload_policy;
    let ext = policy.check(&upload.filename, &upload.bytes, &policy.all_types())?;
    let kind = policy.file_kind(&upload.filename);

    let stored = state.uploads.save_reference(&ext, &upload.bytes).await?;
    let file_size = upload.bytes.len() as i64;
    let extracted_text = (ext == "txt").then(|| extract_text(&upload.bytes));
    let analysis = if kind == FileKind::Image {
        Some(analyze_in_background(upload.bytes).await?)
    } else {
        None
    };

    let material = NewReferenceMaterial {
        brand_id: brand.id,
        name,
        description: query.description.filter(|text| !text.trim().is_empty()),
        file_type: kind.as_str().to_string(),
        file_url: stored.url.clone(),
        file_size,
        original_filename: upload.filename,
        extracted_text,
        color_analysis: analysis.as_ref().map(|a| a.color_analysis.clone()),
        style_analysis: analysis.as_ref().map(|a| a.style_analysis.clone()),
        content_tags: analysis
            .map(|a| a.content_tags)
            .filter(|tags| !tags.is_empty()),
    };
    let row = match state.db.insert_reference_material(&material).await {
        Ok(row) => row,
        Err(err) => {
            state.uploads.remove_by_url(&stored.url).await;
            return Err(err.into());
        }
    };
    info!(
        "Stored reference material {} ({}, {} bytes) for brand {}",
        row.id, row.file_type, file_size, brand.id
    );
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_reference_materials(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReferenceListQuery>,
) -> ApiResult<Json<Vec<ReferenceMaterialRow>>> {
    let brand = owned_brand(&state, query.brand_id, user.id).await?;
    let (skip, limit) = pagination::window(query.skip, query.limit);
    let rows = state
        .db
        .list_reference_materials(brand.id, query.file_type.as_deref(), skip, limit)
        .await?;
    Ok(Json(rows))
}

/// Reading a material counts as a use.
pub async fn get_reference_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(material_id): Path<i64>,
) -> ApiResult<Json<ReferenceMaterialRow>> {
    owned_material(&state, material_id, user.id).await?;
    Ok(Json(state.db.touch_reference_material(material_id).await?))
}

pub async fn delete_reference_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(material_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let material = owned_material(&state, material_id, user.id).await?;
    if !state.uploads.remove_by_url(&material.file_url).await {
        warn!(
            "No stored file removed for reference material {} ({})",
            material.id, material.file_url
        );
    }
    state.db.soft_delete_reference_material(material_id).await?;
    Ok(Json(json!({ "message": "Reference material deleted successfully" })))
}

pub async fn upload_brand_logo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<LogoUploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let brand = owned_brand(&state, query.brand_id, user.id).await?;
    let upload = read_file_field(&mut multipart).await?;
    let policy = &state.upload_policy;
    let ext = match policy.check(&upload.filename, &upload.bytes, &policy.image_types) {
        Ok(ext) => ext,
        Err(UploadRejection::NotAllowed(allowed)) => {
            return Err(ApiError::BadRequest(format!(
                "Only image files are allowed. Allowed types: {allowed}"
            )));
        }
        Err(other) => return Err(other.into()),
    };

    let stored = state.uploads.save_logo(brand.id, &ext, &upload.bytes).await?;
    state.db.append_brand_logo(brand.id, &stored.url).await?;
    info!("Added logo {} to brand {}", stored.url, brand.id);
    Ok(Json(json!({
        "message": "Logo uploaded successfully",
        "logo_url": stored.url,
        "brand_id": brand.id,
    })))
}

pub async fn upload_info(State(state): State<AppState>) -> Json<Value> {
    let policy = &state.upload_policy;
    let limit = format!("{}MB", policy.max_file_size_mb);
    Json(json!({
        "max_file_size_mb": policy.max_file_size_mb,
        "allowed_image_types": policy.image_types,
        "allowed_document_types": policy.document_types,
        "upload_limits": {
            "images": limit,
            "documents": limit,
        },
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/uploads/reference-material", post(upload_reference_material))
        .route("/uploads/reference-materials", get(list_reference_materials))
        .route(
            "/uploads/reference-materials/{material_id}",
            get(get_reference_material).delete(delete_reference_material),
        )
        .route("/uploads/brand-logo", post(upload_brand_logo))
        .route("/uploads/file-info", get(upload_info))
}
