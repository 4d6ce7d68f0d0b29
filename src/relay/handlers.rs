use crate::analysis::{AnalyzeRequest, AnalyzeResponse, ErrorResponse};
use crate::error::RelayError;
use crate::events::StereocamEvent;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, info};

use super::server::ServerState;

const MISSING_FIELDS: &str = "Image data and query are required";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Message returned to the caller for an upstream failure
fn upstream_message(err: &RelayError) -> String {
    match err {
        RelayError::Upstream { details } => details.clone(),
        other => other.to_string(),
    }
}

/// Handler for `POST /api/analyze-image`
pub async fn analyze_image_handler(
    State(state): State<ServerState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text());
        }
        Err(rejection) => {
            debug!("Rejected analysis request body: {}", rejection);
            return error_response(StatusCode::BAD_REQUEST, MISSING_FIELDS);
        }
    };

    if request.image_data_url.is_empty() || request.query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    }

    info!(
        "Analyzing {} byte image: \"{}\"",
        request.image_data_url.len(),
        request.query
    );

    match state
        .model
        .describe(&request.image_data_url, &request.query)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(AnalyzeResponse { result })).into_response(),
        Err(e) => {
            error!("Error analyzing image: {}", e);
            state.event_bus.publish(StereocamEvent::SystemError {
                component: "relay".to_string(),
                error: e.to_string(),
            });
            error_response(StatusCode::INTERNAL_SERVER_ERROR, upstream_message(&e))
        }
    }
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let health_info = serde_json::json!({
        "status": "healthy",
        "model": state.model.model_name(),
        "server_info": {
            "subscribers": state.event_bus.subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}
