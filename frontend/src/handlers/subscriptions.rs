use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use hcprp_common::error::RpError;
use hcprp_types::subscription::{Subscription, SubscriptionState};
use serde::Deserialize;
use uuid::Uuid;

use super::store_error;
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionRequest {
    state: SubscriptionState,
    registration_date: Option<DateTime<Utc>>,
    properties: Option<SubscriptionProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionProperties {
    tenant_id: Option<Uuid>,
}

/// `PUT /subscriptions/{subscriptionId}` (§4.7). Accepted from any state;
/// the state-gate middleware exempts this route so ARM can always deliver
/// lifecycle notifications, including `Deleted`.
pub async fn put_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Json(body): Json<SubscriptionRequest>,
) -> Result<Response, ApiError> {
    let subscription_uuid = Uuid::parse_str(&subscription_id)
        .map_err(|_| RpError::InvalidParameter("subscriptionId must be a UUID".into()))?;

    let existing = state
        .store
        .subscriptions()
        .get(&subscription_id, &subscription_id)
        .await
        .map_err(store_error)?;

    let mut sub = match &existing {
        Some(doc) => doc.value.clone(),
        None => Subscription::new_unregistered(subscription_uuid),
    };

    if sub.state != body.state && !sub.state.can_transition_to(body.state) {
        return Err(RpError::RequestNotAllowed(format!(
            "{:?} -> {:?} is not a legal subscription state transition",
            sub.state, body.state
        ))
        .into());
    }

    sub.state = body.state;
    if let Some(tenant_id) = body.properties.and_then(|p| p.tenant_id) {
        sub.tenant_id = Some(tenant_id);
    }
    if let Some(registration_date) = body.registration_date {
        sub.registration_date = registration_date;
    }
    sub.last_updated = Utc::now();

    let expected_etag = existing.as_ref().map(|d| d.etag);
    let stored = if let Some(etag) = expected_etag {
        state
            .store
            .subscriptions()
            .upsert_checked(&subscription_id, &subscription_id, &sub, Some(etag))
            .await
    } else {
        state
            .store
            .subscriptions()
            .upsert(&subscription_id, &subscription_id, &sub)
            .await
    }
    .map_err(store_error)?;

    let mut result = stored.value;
    result.etag = stored.etag;
    Ok(Json(result).into_response())
}
