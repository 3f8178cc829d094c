//! OpenAPI Specification for the Lookaside API
//!
//! Generated with utoipa from route annotations and schema derives, and
//! served at `/openapi.json`.

use lookaside_core::User;
use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{health, user};
use crate::telemetry::metrics;

/// OpenAPI document for the Lookaside API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lookaside API",
        version = "0.1.0",
        description = "Read-through user lookups over PostgreSQL with a short-lived Redis cache",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Users", description = "User lookups served cache-aside"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        user::get_user_by_query,
        user::get_user_by_path,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        User,
        ApiError,
        ErrorCode,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        ComponentHealth,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEV_SERVER_URL;

    #[test]
    fn test_openapi_lists_user_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/user"));
        assert!(doc.paths.paths.contains_key("/users/{id}"));
        assert!(doc.paths.paths.contains_key("/health/ready"));
    }

    #[test]
    fn test_openapi_points_at_dev_server() {
        let doc = ApiDoc::openapi();
        let servers = doc.servers.unwrap_or_default();
        assert!(servers.iter().any(|s| s.url == DEV_SERVER_URL));
    }

    #[test]
    fn test_openapi_serializes() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("USER_NOT_FOUND"));
    }
}
