use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::api::access::CurrentUser;
use crate::api::error::{ApiError, ApiResult};
use crate::db::models::UserRow;
use crate::state::AppState;

const ALREADY_REGISTERED: &str = "Username or email already registered";

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

fn new_api_token() -> String {
    format!("bcs_{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUser>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let username = body.username.trim();
    let email = body.email.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }
    if state.db.username_or_email_taken(username, email).await? {
        return Err(ApiError::Conflict(ALREADY_REGISTERED.to_string()));
    }

    let token = new_api_token();
    let full_name = body
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let user = state
        .db
        .create_user(username, email, full_name, &token)
        .await
        .map_err(|err| ApiError::from(err).conflict_as(ALREADY_REGISTERED))?;
    info!("Registered user {} ({})", user.id, user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "api_token": user.api_token })),
    ))
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserRow> {
    Json(user)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/me", get(current_user))
}
