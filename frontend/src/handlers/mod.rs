pub mod clusters;
pub mod node_pools;
pub mod operations;
pub mod subscriptions;

use hcprp_common::error::RpError;
use hcprp_cs_client::CsError;
use hcprp_store::StoreError;

pub(crate) fn store_error(e: StoreError) -> RpError {
    match e {
        StoreError::NotFound => RpError::NotFound("resource not found".into()),
        StoreError::EtagMismatch => RpError::Conflict("resource was modified concurrently".into()),
        StoreError::Backend(e) => RpError::Internal(e),
    }
}

pub(crate) fn cs_error(e: CsError) -> RpError {
    match e {
        CsError::NotFound => RpError::NotFound("resource not found upstream".into()),
        CsError::Conflict { target } => RpError::Conflict(target.unwrap_or_else(|| "resource".into())),
        CsError::Transient { message, .. } => RpError::ServiceUnavailable(message),
        CsError::Permanent { message, target, .. } => {
            RpError::InvalidParameter(match target {
                Some(t) => format!("{message} ({t})"),
                None => message,
            })
        }
        CsError::Other(e) => RpError::Internal(e),
    }
}

pub(crate) fn operation_url(
    subscription_id: &str,
    location: &str,
    operation_id: uuid::Uuid,
    api_version: &str,
) -> String {
    format!(
        "/subscriptions/{subscription_id}/providers/Microsoft.RedHatOpenShift/locations/{location}/operationStatuses/{operation_id}?api-version={api_version}"
    )
}
