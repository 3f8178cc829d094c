//! User Lookup Routes
//!
//! Serves user rows through the cache-aside resolver. Both the query form
//! (`GET /user?id=N`) and the path form (`GET /users/:id`) share one
//! handler body. The `x-cache` header reports whether the row came from the
//! cache.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lookaside_core::{User, UserId};
use serde::Deserialize;

use crate::constants::X_CACHE_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics::{OUTCOME_ABSENT, OUTCOME_ERROR};

// ============================================================================
// TYPES
// ============================================================================

/// Query parameters for `GET /user`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// User id; must be a positive integer
    pub id: Option<String>,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// Look up a user by query parameter.
#[utoipa::path(
    get,
    path = "/user",
    tag = "Users",
    params(UserQuery),
    responses(
        (status = 200, description = "User found", body = User,
            headers(("x-cache" = String, description = "hit or miss"))),
        (status = 400, description = "Missing or invalid id", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Store failure or cancelled request", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError),
        (status = 504, description = "Lookup deadline exceeded", body = ApiError),
    ),
)]
pub async fn get_user_by_query(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Response> {
    let id = parse_user_id(query.id.as_deref())?;
    serve_user(&state, id).await
}

/// Look up a user by path segment.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = User,
            headers(("x-cache" = String, description = "hit or miss"))),
        (status = 400, description = "Invalid id", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Store failure or cancelled request", body = ApiError),
        (status = 503, description = "Store unavailable", body = ApiError),
        (status = 504, description = "Lookup deadline exceeded", body = ApiError),
    ),
)]
pub async fn get_user_by_path(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_user_id(Some(&raw_id))?;
    serve_user(&state, id).await
}

async fn serve_user(state: &AppState, id: UserId) -> ApiResult<Response> {
    let ctx = state.request_context();

    match state.resolver.lookup(id, &ctx).await {
        Ok(Some(read)) => {
            state.metrics.record_lookup(read.source().as_str());
            for fault in read.faults() {
                state.metrics.record_cache_fault(fault.kind());
            }

            let cache_status = if read.was_cache_hit() { "hit" } else { "miss" };
            Ok(([(X_CACHE_HEADER, cache_status)], Json(read.into_value())).into_response())
        }
        Ok(None) => {
            state.metrics.record_lookup(OUTCOME_ABSENT);
            Err(ApiError::user_not_found(id))
        }
        Err(e) => {
            state.metrics.record_lookup(OUTCOME_ERROR);
            tracing::warn!(user_id = %id, error = %e, "user lookup failed");
            Err(e.into())
        }
    }
}

/// Validate a raw id parameter.
///
/// Missing or blank is `MISSING_FIELD`, non-integer is `INVALID_FORMAT`,
/// and zero or negative is `INVALID_RANGE`.
pub fn parse_user_id(raw: Option<&str>) -> ApiResult<UserId> {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(ApiError::missing_field("id")),
    };

    let id: UserId = raw
        .parse()
        .map_err(|_| ApiError::invalid_format("id", "an integer"))?;

    if !id.is_positive() {
        return Err(ApiError::invalid_range("id", 1, i64::MAX));
    }

    Ok(id)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/user", get(get_user_by_query))
        .route("/users/:id", get(get_user_by_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_user_id_valid() {
        assert_eq!(parse_user_id(Some("1")).unwrap(), UserId::new(1));
        assert_eq!(parse_user_id(Some(" 42 ")).unwrap(), UserId::new(42));
    }

    #[test]
    fn test_parse_user_id_missing() {
        assert_eq!(parse_user_id(None).unwrap_err().code, ErrorCode::MissingField);
        assert_eq!(parse_user_id(Some("  ")).unwrap_err().code, ErrorCode::MissingField);
    }

    #[test]
    fn test_parse_user_id_not_an_integer() {
        for raw in ["abc", "1.5", "1e3", "0x10", "99999999999999999999"] {
            assert_eq!(
                parse_user_id(Some(raw)).unwrap_err().code,
                ErrorCode::InvalidFormat,
                "{raw}"
            );
        }
    }

    #[test]
    fn test_parse_user_id_out_of_range() {
        assert_eq!(parse_user_id(Some("0")).unwrap_err().code, ErrorCode::InvalidRange);
        assert_eq!(parse_user_id(Some("-7")).unwrap_err().code, ErrorCode::InvalidRange);
    }
}
