//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job lifecycle and live progress
//! - [`probe`] - Metadata probing
//! - [`system`] - Health, events, OpenAPI

use crate::types::{JobId, JobState};
use serde::{Deserialize, Serialize};

mod jobs;
mod probe;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use jobs::*;
pub use probe::*;
pub use system::*;

/// Query parameters for GET /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Query)]
pub struct JobsQuery {
    /// Only list jobs in this state
    pub state: Option<JobState>,
}

/// Response for POST /jobs
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct JobCreated {
    /// Identifier of the new job
    pub id: JobId,
}

/// Request body for POST /probe
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProbeRequest {
    /// Page or media URL to probe
    pub url: String,
}
