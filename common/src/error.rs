//! ARM error taxonomy shared by the frontend and backend.
//!
//! Every non-2xx response from the frontend, and every terminal `Operation`
//! error recorded by the backend, is shaped as an [`ArmErrorBody`] carrying
//! one of these codes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ArmErrorCode {
    InvalidParameter,
    InvalidResourceType,
    ResourceNotFound,
    Conflict,
    RequestNotAllowed,
    MultipleErrorsOccurred,
    ServiceUnavailable,
    LockContention,
    InternalServerError,
}

impl ArmErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmErrorCode::InvalidParameter => "InvalidParameter",
            ArmErrorCode::InvalidResourceType => "InvalidResourceType",
            ArmErrorCode::ResourceNotFound => "ResourceNotFound",
            ArmErrorCode::Conflict => "Conflict",
            ArmErrorCode::RequestNotAllowed => "RequestNotAllowed",
            ArmErrorCode::MultipleErrorsOccurred => "MultipleErrorsOccurred",
            ArmErrorCode::ServiceUnavailable => "ServiceUnavailable",
            ArmErrorCode::LockContention => "LockContention",
            ArmErrorCode::InternalServerError => "InternalServerError",
        }
    }

    /// The HTTP status ARM expects for this code.
    pub fn status(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            ArmErrorCode::InvalidParameter => StatusCode::BAD_REQUEST,
            ArmErrorCode::InvalidResourceType => StatusCode::BAD_REQUEST,
            ArmErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ArmErrorCode::Conflict => StatusCode::CONFLICT,
            ArmErrorCode::RequestNotAllowed => StatusCode::CONFLICT,
            ArmErrorCode::MultipleErrorsOccurred => StatusCode::BAD_REQUEST,
            ArmErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ArmErrorCode::LockContention => StatusCode::SERVICE_UNAVAILABLE,
            ArmErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One violation, either standalone or nested under `details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// The ARM error body shape, returned on every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ArmErrorDetail>>,
}

impl ArmErrorBody {
    pub fn new(code: ArmErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            target: None,
            details: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Collapse a set of violations per §4.3: a single violation is
    /// promoted to the top level; multiple use `MultipleErrorsOccurred`
    /// with each violation nested in `details`.
    pub fn from_violations(mut violations: Vec<ArmErrorDetail>) -> Self {
        if violations.len() == 1 {
            let v = violations.remove(0);
            return Self {
                code: v.code,
                message: v.message,
                target: v.target,
                details: None,
            };
        }
        Self {
            code: ArmErrorCode::MultipleErrorsOccurred.as_str().to_string(),
            message: "Multiple validation errors occurred.".to_string(),
            target: None,
            details: Some(violations),
        }
    }
}

/// Typed error used throughout the frontend and backend; classified into
/// (log level, HTTP status, ARM body) by a single top-level adapter per §7.
#[derive(Debug, thiserror::Error)]
pub enum RpError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown resource type: {0}")]
    InvalidResourceType(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request not allowed: {0}")]
    RequestNotAllowed(String),

    #[error("validation failed")]
    Validation(Vec<ArmErrorDetail>),

    #[error("downstream service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("could not acquire subscription lock")]
    LockContention,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RpError {
    pub fn into_body(self) -> (http::StatusCode, ArmErrorBody) {
        match self {
            RpError::InvalidParameter(msg) => (
                ArmErrorCode::InvalidParameter.status(),
                ArmErrorBody::new(ArmErrorCode::InvalidParameter, msg),
            ),
            RpError::InvalidResourceType(target) => (
                ArmErrorCode::InvalidResourceType.status(),
                ArmErrorBody::new(
                    ArmErrorCode::InvalidResourceType,
                    format!("resource type '{target}' is not supported"),
                )
                .with_target(target),
            ),
            RpError::NotFound(target) => (
                ArmErrorCode::ResourceNotFound.status(),
                ArmErrorBody::new(ArmErrorCode::ResourceNotFound, "resource not found")
                    .with_target(target),
            ),
            RpError::Conflict(target) => (
                ArmErrorCode::Conflict.status(),
                ArmErrorBody::new(ArmErrorCode::Conflict, "resource already exists")
                    .with_target(target),
            ),
            RpError::RequestNotAllowed(target) => (
                ArmErrorCode::RequestNotAllowed.status(),
                ArmErrorBody::new(
                    ArmErrorCode::RequestNotAllowed,
                    "request not allowed in the subscription's current state",
                )
                .with_target(target),
            ),
            RpError::Validation(violations) => (
                http::StatusCode::BAD_REQUEST,
                ArmErrorBody::from_violations(violations),
            ),
            RpError::ServiceUnavailable(msg) => (
                ArmErrorCode::ServiceUnavailable.status(),
                ArmErrorBody::new(ArmErrorCode::ServiceUnavailable, msg),
            ),
            RpError::LockContention => (
                ArmErrorCode::LockContention.status(),
                ArmErrorBody::new(
                    ArmErrorCode::LockContention,
                    "another request is mutating this subscription",
                ),
            ),
            RpError::Internal(e) => {
                tracing::error!("{:?}", e);
                (
                    ArmErrorCode::InternalServerError.status(),
                    ArmErrorBody::new(ArmErrorCode::InternalServerError, "an internal error occurred"),
                )
            }
        }
    }

    pub fn log(&self) {
        match self {
            RpError::Internal(e) => tracing::error!(error = ?e, "internal error"),
            other => tracing::info!(%other, "request rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_violation_is_promoted() {
        let body = ArmErrorBody::from_violations(vec![ArmErrorDetail {
            code: "InvalidParameter".into(),
            message: "bad field".into(),
            target: Some("properties.network.cidr".into()),
        }]);
        assert_eq!(body.code, "InvalidParameter");
        assert!(body.details.is_none());
    }

    #[test]
    fn multiple_violations_collapse_to_multiple_errors_occurred() {
        let body = ArmErrorBody::from_violations(vec![
            ArmErrorDetail {
                code: "InvalidParameter".into(),
                message: "bad field a".into(),
                target: Some("a".into()),
            },
            ArmErrorDetail {
                code: "InvalidParameter".into(),
                message: "bad field b".into(),
                target: Some("b".into()),
            },
        ]);
        assert_eq!(body.code, "MultipleErrorsOccurred");
        assert_eq!(body.details.unwrap().len(), 2);
    }
}
