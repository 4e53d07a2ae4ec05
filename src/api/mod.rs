//! HTTP surface: `/`, `/health`, the `/api/v1` resources and static
//! `/uploads`.

pub mod access;
pub mod brands;
pub mod campaigns;
pub mod content;
pub mod error;
pub mod health;
pub mod pagination;
pub mod patch;
pub mod uploads;
pub mod users;


use axum::extract::DefaultBodyLimit;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;
use crate::utils::timing::log_request_timing;

// Room for multipart boundaries and the other form fields.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
        .allow_credentials(true)
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let body_limit = state.upload_policy.max_file_size_bytes() as usize + MULTIPART_OVERHEAD_BYTES;

    let api = Router::new()
        .merge(users::routes())
        .merge(brands::routes())
        .merge(campaigns::routes())
        .merge(content::routes())
        .merge(uploads::routes());

    Router::new()
        .merge(health::routes())
        .nest("/api/v1", api)
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request_timing))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
