use axum::Json;
use axum::response::{IntoResponse, Response};
use hcprp_common::error::{ArmErrorCode, RpError};

/// Wraps [`RpError`] so handlers can `?`-propagate it and have axum render
/// the ARM error body shape (§4.1, §7). `Retry-After` is attached for the
/// two codes ARM expects it on (429 upstream of us, 503 here).
pub struct ApiError(pub RpError);

impl From<RpError> for ApiError {
    fn from(e: RpError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(RpError::Internal(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();
        let retry_after = matches!(
            &self.0,
            RpError::LockContention | RpError::ServiceUnavailable(_)
        );
        let (status, body) = self.0.into_body();
        let mut response = (status, Json(body)).into_response();
        if retry_after {
            response
                .headers_mut()
                .insert("retry-after", "1".parse().unwrap());
        }
        response
    }
}

pub fn invalid_api_version(resource_type: &str) -> ApiError {
    ApiError(RpError::InvalidResourceType(resource_type.to_string()))
}

pub fn subscription_not_allowed(subscription_id: &str) -> ApiError {
    ApiError(RpError::RequestNotAllowed(subscription_id.to_string()))
}

/// Used by middleware that can't propagate `?` through `axum::middleware::from_fn`
/// and must build the response directly.
pub fn error_response(code: ArmErrorCode, message: impl Into<String>, target: Option<&str>) -> Response {
    let mut body = hcprp_common::error::ArmErrorBody::new(code, message);
    if let Some(target) = target {
        body = body.with_target(target);
    }
    (code.status(), Json(body)).into_response()
}
