//! OpenAPI documentation and schema generation
//!
//! The media-dl REST API is described with utoipa at compile time.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// Served at `/api/v1/openapi.json` and, when enabled, through Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "REST API for starting, monitoring, cancelling, retrying and deleting media download jobs",
        contact(
            name = "media-dl",
            url = "https://github.com/jvz-devx/media-dl"
        ),
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::list_jobs,
        crate::api::routes::start_job,
        crate::api::routes::get_job,
        crate::api::routes::get_job_progress,
        crate::api::routes::list_progress,
        crate::api::routes::cancel_job,
        crate::api::routes::retry_job,
        crate::api::routes::delete_job,

        // Probe
        crate::api::routes::probe_media,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::JobState,
        crate::types::ExtractionMode,
        crate::types::MediaFormat,
        crate::types::JobSpec,
        crate::types::Job,
        crate::types::ProgressSnapshot,
        crate::types::FormatKind,
        crate::types::ProbedFormat,
        crate::types::MediaInfo,
        crate::types::Event,
        crate::types::WebhookPayload,

        crate::config::FileCollisionAction,
        crate::config::StaleJobPolicy,
        crate::config::WebhookEvent,

        crate::api::routes::JobsQuery,
        crate::api::routes::JobCreated,
        crate::api::routes::ProbeRequest,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Download jobs - Start, list, cancel, retry, delete and watch progress"),
        (name = "probe", description = "Metadata probe - Title, uploader, duration and available formats of a URL"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_has_every_route() {
        let spec = ApiDoc::openapi();

        for path in [
            "/api/v1/jobs",
            "/api/v1/jobs/{id}",
            "/api/v1/jobs/{id}/progress",
            "/api/v1/jobs/{id}/cancel",
            "/api/v1/jobs/{id}/retry",
            "/api/v1/progress",
            "/api/v1/probe",
            "/api/v1/health",
            "/api/v1/events",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path {}", path);
        }
    }

    #[test]
    fn test_openapi_spec_has_schemas() {
        let components = ApiDoc::openapi().components.unwrap();

        for schema in ["Job", "JobSpec", "JobState", "MediaInfo", "ApiError"] {
            assert!(
                components.schemas.contains_key(schema),
                "missing schema {}",
                schema
            );
        }
    }

    #[test]
    fn test_openapi_spec_tags_and_info() {
        let spec = ApiDoc::openapi();

        assert_eq!(spec.info.title, "media-dl REST API");
        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["jobs", "probe", "system"]);
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = serde_json::to_value(ApiDoc::openapi()).expect("Should serialize to JSON");
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."), "Should use OpenAPI 3.x version");
    }
}
