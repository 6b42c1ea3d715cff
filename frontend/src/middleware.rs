//! Per-request middleware beyond the correlation layer in `hcprp-common`
//! (§4.1 steps 4-7): system-data parsing, api-version validation, the
//! subscription state gate, and subscription-lock acquisition around
//! mutating requests.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use hcprp_common::error::ArmErrorCode;
use hcprp_common::{IdentityType, SystemData};
use std::collections::HashMap;

use crate::errors::error_response;
use crate::state::AppState;

/// Parsed from `X-Ms-Arm-Resource-System-Data` and attached to the
/// request so handlers can stamp it onto the resource without
/// re-parsing the header.
#[derive(Clone, Debug, Default)]
pub struct IncomingSystemData(pub Option<SystemData>);

pub async fn system_data(mut req: Request<Body>, next: Next) -> Response {
    let parsed = req
        .headers()
        .get("x-ms-arm-resource-system-data")
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| match serde_json::from_str::<RawSystemData>(raw) {
            Ok(raw) => Some(raw.into()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse x-ms-arm-resource-system-data, ignoring");
                None
            }
        });
    req.extensions_mut().insert(IncomingSystemData(parsed));
    next.run(req).await
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSystemData {
    created_by: Option<String>,
    created_by_type: Option<IdentityType>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    last_modified_by: Option<String>,
    last_modified_by_type: Option<IdentityType>,
    last_modified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<RawSystemData> for SystemData {
    fn from(raw: RawSystemData) -> Self {
        SystemData {
            created_by: raw.created_by,
            created_by_type: raw.created_by_type,
            created_at: raw.created_at,
            last_modified_by: raw.last_modified_by,
            last_modified_by_type: raw.last_modified_by_type,
            last_modified_at: raw.last_modified_at,
        }
    }
}

/// Extracts the ARM resource type segment from a request path, e.g.
/// `.../providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/foo` ->
/// `hcpOpenShiftClusters`. Falls back to `"subscriptions"` for paths with
/// no `providers` segment (the subscription lifecycle route).
fn resource_type_from_path(path: &str) -> &str {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments
        .iter()
        .position(|s| s.eq_ignore_ascii_case("providers"))
        .and_then(|idx| segments.get(idx + 2))
        .copied()
        .unwrap_or("subscriptions")
}

/// Extracts `api-version` (already resolved into `RequestContext` by the
/// correlation layer) and rejects missing/unknown values before any
/// handler or state lookup runs.
pub async fn api_version_validation(req: Request<Body>, next: Next) -> Response {
    let api_version = req
        .extensions()
        .get::<hcprp_common::RequestContext>()
        .and_then(|c| c.api_version.clone());

    let Some(api_version) = api_version else {
        return error_response(
            ArmErrorCode::InvalidParameter,
            "the api-version query parameter is required",
            Some("api-version"),
        );
    };
    if !hcprp_types::versions::is_supported(&api_version) {
        let resource_type = resource_type_from_path(req.uri().path()).to_string();
        return error_response(
            ArmErrorCode::InvalidResourceType,
            format!("api-version '{api_version}' is not supported"),
            Some(&resource_type),
        );
    }
    next.run(req).await
}

/// Loads the subscription doc and rejects requests its state doesn't
/// permit (§4.7). A missing doc is treated as `Unregistered`, which
/// permits neither reads nor writes. Exempts the subscription lifecycle
/// PUT itself, which must be reachable in any state.
pub async fn subscription_state_gate(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(subscription_id) = params.get("subscriptionId") else {
        return next.run(req).await;
    };

    // The subscription lifecycle route is the only one with a single path
    // param; every resource route carries at least a resource group or
    // location alongside the subscription id.
    let is_lifecycle_put = req.method() == Method::PUT && params.len() == 1;
    if is_lifecycle_put {
        return next.run(req).await;
    }

    let sub_state = match state.store.subscriptions().get(subscription_id, subscription_id).await {
        Ok(Some(doc)) => doc.value.state,
        Ok(None) => hcprp_types::SubscriptionState::Unregistered,
        Err(e) => {
            tracing::error!(error = %e, "failed to load subscription doc");
            return error_response(
                ArmErrorCode::ServiceUnavailable,
                "could not verify subscription state",
                None,
            );
        }
    };

    let is_mutating = matches!(req.method(), &Method::PUT | &Method::DELETE | &Method::PATCH);
    let allowed = if is_mutating {
        sub_state.allows_mutation()
    } else {
        sub_state.allows_read()
    };

    if !allowed {
        return error_response(
            ArmErrorCode::RequestNotAllowed,
            format!("subscription is in state {sub_state:?}, which does not permit this request"),
            Some(subscription_id),
        );
    }

    next.run(req).await
}

/// Acquires the per-subscription lock for the duration of a mutating
/// request (§4.8). Installed with `route_layer` so it only wraps
/// PUT/DELETE routes, never GET/LIST.
pub async fn subscription_lock(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(subscription_id) = params.get("subscriptionId") else {
        return next.run(req).await;
    };

    let guard = match state.lock.acquire(subscription_id).await {
        Ok(guard) => guard,
        Err(e) => {
            tracing::warn!(error = %e, subscription_id, "failed to acquire subscription lock");
            let mut response = error_response(
                ArmErrorCode::LockContention,
                "another request is mutating this subscription",
                None,
            );
            response
                .headers_mut()
                .insert("retry-after", "1".parse().expect("static header value"));
            return response;
        }
    };

    let response = next.run(req).await;
    if let Err(e) = guard.release().await {
        tracing::warn!(error = %e, subscription_id, "subscription lock release failed, TTL will reclaim it");
    }
    response
}
