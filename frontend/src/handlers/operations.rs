use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hcprp_common::RequestContextExtractor;
use hcprp_common::error::RpError;
use hcprp_types::operation::{Operation, OperationError, OperationStatus};
use hcprp_types::versions;
use serde_json::Value;

use super::{operation_url, store_error};
use crate::errors::ApiError;
use crate::state::AppState;

fn operation_status_body(op: &Operation) -> Value {
    let status_str = match op.status {
        OperationStatus::NotStarted => "NotStarted",
        OperationStatus::InProgress => "InProgress",
        OperationStatus::Succeeded => "Succeeded",
        OperationStatus::Failed => "Failed",
        OperationStatus::Canceled => "Canceled",
    };
    let mut body = serde_json::json!({
        "id": op.id,
        "name": op.id,
        "status": status_str,
        "startTime": op.started_at,
    });
    if op.status.is_terminal() {
        body["endTime"] = serde_json::json!(op.last_transition);
    }
    if let Some(err) = &op.error {
        body["error"] = serde_json::json!({
            "code": err.code,
            "message": err.message,
            "target": err.target,
        });
    }
    body
}

fn status_for_code(code: &str) -> StatusCode {
    match code {
        "InvalidParameter" | "InvalidResourceType" | "MultipleErrorsOccurred" => StatusCode::BAD_REQUEST,
        "ResourceNotFound" => StatusCode::NOT_FOUND,
        "Conflict" | "RequestNotAllowed" => StatusCode::CONFLICT,
        "ServiceUnavailable" | "LockContention" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST .../operationStatuses/{opId}`: always returns the operation's
/// current status, regardless of whether it has reached a terminal state.
pub async fn get_operation_status(
    State(state): State<AppState>,
    Path((subscription_id, _location, operation_id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let op = state
        .store
        .operations()
        .get(&subscription_id, &operation_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::from(RpError::NotFound(operation_id.clone())))?;

    Ok(Json(operation_status_body(&op.value)).into_response())
}

/// `POST .../operationResults/{opId}`: 202 with a `Location` pointer while
/// in flight; on success, the final resource representation; on failure,
/// the CS-supplied error re-shaped as an ARM error body (§4.4).
pub async fn get_operation_result(
    State(state): State<AppState>,
    Path((subscription_id, location, operation_id)): Path<(String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let op = state
        .store
        .operations()
        .get(&subscription_id, &operation_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::from(RpError::NotFound(operation_id.clone())))?;

    if !op.value.status.is_terminal() {
        let op_url = operation_url(&subscription_id, &location, op.value.id, &api_version);
        let mut response = StatusCode::ACCEPTED.into_response();
        response
            .headers_mut()
            .insert("location", op_url.parse().expect("valid header value"));
        return Ok(response);
    }

    if op.value.status == OperationStatus::Failed {
        let err = op.value.error.clone().unwrap_or_else(|| OperationError {
            code: "InternalServerError".into(),
            message: "operation failed".into(),
            target: None,
        });
        let status = status_for_code(&err.code);
        let body = hcprp_common::error::ArmErrorBody {
            code: err.code,
            message: err.message,
            target: err.target,
            details: None,
        };
        return Ok((status, Json(body)).into_response());
    }

    let is_node_pool = op.value.resource_id.contains("/nodePools/");
    if is_node_pool {
        let codec = versions::node_pool_codec(&api_version).expect("validated upstream");
        let doc = state
            .store
            .node_pools()
            .get(&subscription_id, &op.value.resource_id)
            .await
            .map_err(store_error)?;
        Ok(match doc {
            Some(doc) => Json(codec.project(&doc.value)).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        })
    } else {
        let codec = versions::cluster_codec(&api_version).expect("validated upstream");
        let doc = state
            .store
            .clusters()
            .get(&subscription_id, &op.value.resource_id)
            .await
            .map_err(store_error)?;
        Ok(match doc {
            Some(doc) => Json(codec.project(&doc.value)).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        })
    }
}
