use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::db::models::UserRow;
use crate::state::AppState;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window of request timestamps per user. A limit of zero
/// disables limiting.
pub struct RateLimiter {
    limit: usize,
    hits: Mutex<HashMap<i64, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        RateLimiter {
            limit: limit as usize,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_rate_limited(&self, user_id: i64) -> bool {
        self.is_rate_limited_at(user_id, Instant::now())
    }

    fn is_rate_limited_at(&self, user_id: i64, now: Instant) -> bool {
        if self.limit == 0 {
            return false;
        }
        let mut hits = self.hits.lock();
        let window = hits.entry(user_id).or_default();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() >= self.limit {
            return true;
        }
        window.push_back(now);
        false
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The authenticated caller of an `/api/v1` route.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            ApiError::Unauthorized("Missing or malformed bearer token".to_string())
        })?;
        let Some(user) = state.db.find_user_by_token(token).await? else {
            warn!("Rejected request with unknown or inactive API token");
            return Err(ApiError::Unauthorized(
                "Invalid or inactive API token".to_string(),
            ));
        };
        if state.rate_limiter.is_rate_limited(user.id) {
            info!("Rate limited user {} ({})", user.id, user.username);
            return Err(ApiError::TooManyRequests(
                "Rate limit exceeded. Please slow down.".to_string(),
            ));
        }
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[test]
    fn window_slides_after_a_minute() {
        let limiter = RateLimiter::per_minute(2);
        let start = Instant::now();
        assert!(!limiter.is_rate_limited_at(1, start));
        assert!(!limiter.is_rate_limited_at(1, start + Duration::from_secs(1)));
        assert!(limiter.is_rate_limited_at(1, start + Duration::from_secs(2)));
        assert!(!limiter.is_rate_limited_at(2, start + Duration::from_secs(2)));
        assert!(!limiter.is_rate_limited_at(1, start + Duration::from_secs(61)));
    }

    #[test]
    fn zero_limit_disables_limiting() {
        let limiter = RateLimiter::per_minute(0);
        let now = Instant::now();
        assert!((0..100).all(|_| !limiter.is_rate_limited_at(9, now)));
    }

    #[test]
    fn parses_bearer_header() {
        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "bearer  abc123 ")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("abc123"));

        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Basic abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }
}
