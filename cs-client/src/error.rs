use crate::models::CsErrorBody;
use thiserror::Error;

/// Classification of a CS failure (§6.2, §7). `Transient` callers retry
/// with backoff; `Permanent` marks the originating Operation `Failed`.
#[derive(Debug, Error)]
pub enum CsError {
    #[error("resource not found upstream")]
    NotFound,

    #[error("resource already exists upstream: {target:?}")]
    Conflict { target: Option<String> },

    #[error("CS returned a transient error (status {status}): {message}")]
    Transient { status: u16, message: String },

    #[error("CS rejected the request: {code} {message}")]
    Permanent {
        code: String,
        message: String,
        target: Option<String>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CsError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CsError::Transient { .. } | CsError::Other(_))
    }

    pub fn classify(status: reqwest::StatusCode, body: CsErrorBody) -> Self {
        if body.reason == "VersionNotFound" {
            return CsError::NotFound;
        }
        if status == reqwest::StatusCode::CONFLICT {
            return CsError::Conflict { target: body.target };
        }
        if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            return CsError::Transient {
                status: status.as_u16(),
                message: body.message,
            };
        }
        CsError::Permanent {
            code: body.code,
            message: body.message,
            target: body.target,
        }
    }
}
