use thiserror::Error;

/// Errors raised by a [`crate::container::Container`]. Handlers translate
/// [`StoreError::EtagMismatch`] into an ARM `Conflict` response (I5).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,

    #[error("etag mismatch: the document was modified since it was read")]
    EtagMismatch,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
