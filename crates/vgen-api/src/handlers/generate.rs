//! Callable endpoint for starting a video generation job.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use vgen_models::GenerateVideoRequest;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Callable protocol request body: `{"data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct CallableRequest<T> {
    #[serde(default)]
    pub data: Option<T>,
}

/// Callable protocol success body: `{"result": {...}}`.
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResult {
    pub job_id: String,
}

/// Debit one credit, create the job and return its id. Generation runs in
/// the background; callers poll the job record for the outcome.
pub async fn generate_video(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<CallableRequest<GenerateVideoRequest>>, JsonRejection>,
) -> ApiResult<Json<CallableResponse<GenerateVideoResult>>> {
    let Json(body) =
        body.map_err(|e| ApiError::invalid_argument(format!("Malformed request: {}", e.body_text())))?;
    let request = body.data.unwrap_or_default();

    let job_id = state.orchestrator.begin_job(&user.uid, request).await?;

    info!(user_id = %user.uid, job_id = %job_id, "Video generation job accepted");

    Ok(Json(CallableResponse {
        result: GenerateVideoResult {
            job_id: job_id.to_string(),
        },
    }))
}
