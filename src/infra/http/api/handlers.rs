use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use render_routing_api_types::{DeclinedResponse, HealthResponse, RenderRequest, RenderResponse};

use crate::application::render::{RenderCommand, RenderOutcome};

use super::error::ApiError;
use super::state::AppState;

const SERVICE_NAME: &str = "render-routing";

/// `POST /api/render/generate`
pub async fn generate_document(
    State(state): State<AppState>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let command = RenderCommand::try_from(request)?;

    match state.orchestrator.render(command).await? {
        RenderOutcome::Rendered(artifact) => {
            Ok((StatusCode::OK, Json(RenderResponse::from(artifact))).into_response())
        }
        RenderOutcome::Declined(declined) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(DeclinedResponse::from(declined)),
        )
            .into_response()),
    }
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}
