use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::compute::ComputeError;
use crate::coordinator::{SubmitError, SubmitOutcome};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

fn json_error(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorBody {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

fn compute_error_status(e: &ComputeError) -> StatusCode {
    match e {
        ComputeError::Unavailable(_) | ComputeError::Remote(_) => StatusCode::BAD_GATEWAY,
        ComputeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ComputeError::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /analyze`: multipart upload with a required `file` part and an
/// optional `metadata` part (opaque JSON string, stored but never interpreted).
pub async fn analyze(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut user_metadata: Option<serde_json::Value> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    format!("malformed multipart body: {e}"),
                );
            }
        };

        match field.name() {
            Some("file") => {
                let name = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => {
                        filename = name;
                        file_bytes = Some(bytes.to_vec());
                    }
                    Err(e) => {
                        return json_error(
                            StatusCode::BAD_REQUEST,
                            format!("failed to read upload: {e}"),
                        );
                    }
                }
            }
            Some("metadata") => match field.text().await {
                Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                    Ok(value) => user_metadata = Some(value),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unparseable metadata field");
                    }
                },
                Err(e) => {
                    return json_error(
                        StatusCode::BAD_REQUEST,
                        format!("failed to read metadata field: {e}"),
                    );
                }
            },
            _ => {}
        }
    }

    let Some(bytes) = file_bytes else {
        return json_error(StatusCode::BAD_REQUEST, "missing file field");
    };
    let Some(filename) = filename.filter(|f| !f.is_empty()) else {
        return json_error(StatusCode::BAD_REQUEST, "no filename provided");
    };

    tracing::info!(%filename, size = bytes.len(), "received upload");

    match state.coordinator.submit(&bytes, &filename, user_metadata).await {
        Ok(SubmitOutcome::Cached { job_id, result }) => Json(json!({
            "status": "success",
            "cached": true,
            "job_id": job_id,
            "data": result,
        }))
        .into_response(),
        Ok(SubmitOutcome::InProgress { job_id }) => Json(json!({
            "status": "processing",
            "job_id": job_id,
            "message": "Analysis in progress. Please check back later.",
        }))
        .into_response(),
        Ok(SubmitOutcome::Fresh { job_id, result }) => {
            let mut body = json!({
                "status": "success",
                "cached": false,
                "data": result,
            });
            // job_id is absent (not null) when persistence was unavailable.
            if let (Some(obj), Some(job_id)) = (body.as_object_mut(), job_id) {
                obj.insert("job_id".to_string(), json!(job_id));
            }
            Json(body).into_response()
        }
        Err(SubmitError::UnsupportedType) => {
            json_error(StatusCode::BAD_REQUEST, SubmitError::UnsupportedType.to_string())
        }
        Err(SubmitError::Compute(e)) => {
            tracing::error!(%filename, error = %e, "analysis failed");
            json_error(compute_error_status(&e), format!("analysis failed: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_errors_map_to_gateway_statuses() {
        assert_eq!(
            compute_error_status(&ComputeError::Unavailable("refused".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            compute_error_status(&ComputeError::Timeout(300)),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            compute_error_status(&ComputeError::Remote("bad envelope".into())),
            StatusCode::BAD_GATEWAY
        );
    }
}
