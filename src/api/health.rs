use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "AI Brand Content Studio API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .db
        .health_check()
        .await
        .map_err(|err| ApiError::Unavailable(format!("Database unavailable: {err}")))?;
    Ok(Json(json!({
        "status": "healthy",
        "providers": state.generator.registry().available(),
    })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
