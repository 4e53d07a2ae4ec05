use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::generation::AnalysisError;
use crate::llm::DispatchError;
use crate::media::UploadRejection;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    TooManyRequests(String),

    /// No AI provider (or another dependency) is available at all.
    #[error("{0}")]
    Unavailable(String),

    /// An AI provider answered with an error or unusable output.
    #[error("{0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(db_err) = err.downcast_ref::<sqlx::Error>() {
            if is_unique_violation(db_err) {
                return ApiError::Conflict("Resource already exists".to_string());
            }
            return ApiError::Database(db_err.to_string());
        }
        ApiError::Other(err)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoProviders => ApiError::Unavailable(err.to_string()),
            DispatchError::AllFailed(_) => {
                ApiError::Upstream(format!("Content generation failed: {err}"))
            }
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Dispatch(DispatchError::NoProviders) => {
                ApiError::Unavailable(DispatchError::NoProviders.to_string())
            }
            other => ApiError::Upstream(format!("Analysis failed: {other}")),
        }
    }
}

impl From<UploadRejection> for ApiError {
    fn from(rejection: UploadRejection) -> Self {
        match rejection {
            UploadRejection::TooLarge(_) => ApiError::PayloadTooLarge(rejection.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl ApiError {
    /// Rewords a uniqueness conflict raised by the database; other errors
    /// pass through.
    pub fn conflict_as(self, message: &str) -> Self {
        match self {
            ApiError::Conflict(_) => ApiError::Conflict(message.to_string()),
            other => other,
        }
    }

    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = format!("{self:#}");
        if status.is_server_error() {
            error!("Request failed with {}: {}", status.as_u16(), message);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_map_to_gateway_statuses() {
        let unavailable: ApiError = DispatchError::NoProviders.into();
        assert_eq!(unavailable.parts().0, StatusCode::SERVICE_UNAVAILABLE);

        let failed: ApiError = DispatchError::AllFailed("timeout".into()).into();
        assert_eq!(failed.parts().0, StatusCode::BAD_GATEWAY);
        assert!(failed.to_string().contains("timeout"));

        let unparseable: ApiError = AnalysisError::Unparseable.into();
        assert_eq!(unparseable.parts().0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn upload_rejections_keep_their_message() {
        let too_large: ApiError = UploadRejection::TooLarge(50).into();
        assert_eq!(too_large.parts().0, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.to_string(), "File too large. Maximum size: 50MB");

        let not_allowed: ApiError = UploadRejection::NotAllowed("png".into()).into();
        assert_eq!(not_allowed.parts(), (StatusCode::BAD_REQUEST, "BAD_REQUEST"));
    }

    #[test]
    fn sqlx_errors_are_reported_as_database_errors() {
        let err: ApiError = anyhow::Error::new(sqlx::Error::RowNotFound).into();
        assert_eq!(err.parts().1, "DATABASE_ERROR");
        let other: ApiError = anyhow::anyhow!("boom").into();
        assert_eq!(other.parts().1, "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn unique_violations_become_conflicts() {
        use crate::db::database::memory_database;
        use crate::db::models::BrandFields;

        let db = memory_database().await;
        let user = db.create_user("u", "u@x.test", None, "t").await.unwrap();
        let fields = BrandFields { name: "Acme".into(), ..Default::default() };
        db.insert_brand(user.id, &fields).await.unwrap();

        let err: ApiError = db.insert_brand(user.id, &fields).await.unwrap_err().into();
        assert_eq!(err.parts(), (StatusCode::CONFLICT, "CONFLICT"));
        let reworded = err.conflict_as("Brand name already exists");
        assert_eq!(reworded.to_string(), "Brand name already exists");

        let missing: ApiError = anyhow::Error::new(sqlx::Error::RowNotFound).into();
        assert_eq!(missing.conflict_as("taken").parts().1, "DATABASE_ERROR");
    }
}
