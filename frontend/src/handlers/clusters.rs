use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hcprp_common::{RequestContextExtractor, SystemData};
use hcprp_common::error::RpError;
use hcprp_cs_client::{CsClusterPatch, CsClusterSpec};
use hcprp_store::Container;
use hcprp_types::Billing;
use hcprp_types::hub::{Cluster, NodePool, ProvisioningState};
use hcprp_types::operation::{Operation, OperationType};
use hcprp_types::versions;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::{cs_error, operation_url, store_error};
use crate::errors::ApiError;
use crate::middleware::IncomingSystemData;
use crate::state::AppState;
use crate::validation;

fn resource_id(subscription_id: &str, resource_group: &str, cluster_name: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{cluster_name}"
    )
}

fn cs_spec_of(spec: &hcprp_types::hub::ClusterSpec) -> Result<CsClusterSpec, ApiError> {
    Ok(CsClusterSpec {
        network: serde_json::to_value(&spec.network).map_err(anyhow::Error::from)?,
        platform: serde_json::to_value(&spec.platform).map_err(anyhow::Error::from)?,
        version: serde_json::to_value(&spec.version).map_err(anyhow::Error::from)?,
        ingress: serde_json::to_value(&spec.ingress).map_err(anyhow::Error::from)?,
        external_auth: spec
            .external_auth
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(anyhow::Error::from)?,
    })
}

pub async fn put_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name)): Path<(String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
    axum::Extension(incoming_system_data): axum::Extension<IncomingSystemData>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::cluster_codec(&api_version).expect("validated upstream");

    let spec = codec
        .normalize(&body)
        .map_err(|e| RpError::InvalidParameter(e.to_string()))?;

    let rid = resource_id(&subscription_id, &resource_group, &cluster_name);
    let existing = state
        .store
        .clusters()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?;

    if let Some(doc) = &existing {
        validation::validate_cluster_update(&doc.value.spec, &spec)?;
    } else {
        validation::validate_cluster_create(&spec)?;
    }

    let cs_spec = cs_spec_of(&spec)?;

    let (internal_cs_id, provisioning_state, op_type, status) = if let Some(doc) = &existing {
        let internal_id = doc.value.internal_cs_id.clone().ok_or_else(|| {
            ApiError::from(RpError::Internal(anyhow::anyhow!(
                "existing cluster is missing internalCSId"
            )))
        })?;
        let patch = CsClusterPatch {
            version: Some(cs_spec.version.clone()),
            ingress: Some(cs_spec.ingress.clone()),
            external_auth: cs_spec.external_auth.clone(),
        };
        state
            .cs
            .update_cluster(&internal_id, &patch)
            .await
            .map_err(cs_error)?;
        (internal_id, ProvisioningState::Updating, OperationType::Update, StatusCode::OK)
    } else {
        let created = state.cs.post_cluster(&cs_spec).await.map_err(cs_error)?;
        (
            created.internal_id,
            ProvisioningState::Provisioning,
            OperationType::Create,
            StatusCode::CREATED,
        )
    };

    let principal = incoming_system_data
        .0
        .as_ref()
        .and_then(|s| s.last_modified_by.clone().or_else(|| s.created_by.clone()));
    let system_data = match &existing {
        Some(doc) => doc.value.system_data.clone().stamp_updated(principal),
        None => SystemData::stamp_created(principal),
    };

    let cluster = Cluster {
        resource_id: rid.clone(),
        subscription_id: subscription_id.clone(),
        internal_cs_id: Some(internal_cs_id.clone()),
        provisioning_state,
        spec,
        system_data,
        etag: uuid::Uuid::new_v4(),
    };

    let expected_etag = existing.as_ref().map(|d| d.etag);
    let stored = if let Some(etag) = expected_etag {
        state
            .store
            .clusters()
            .upsert_checked(&subscription_id, &rid, &cluster, Some(etag))
            .await
    } else {
        state.store.clusters().upsert(&subscription_id, &rid, &cluster).await
    }
    .map_err(store_error)?;

    let operation = Operation::new_in_progress(
        subscription_id.clone(),
        rid.clone(),
        op_type,
        Some(internal_cs_id),
    );
    state
        .store
        .operations()
        .upsert(&subscription_id, &operation.id.to_string(), &operation)
        .await
        .map_err(store_error)?;

    if existing.is_none() {
        let billing = Billing::start(rid.clone(), subscription_id.clone());
        state
            .store
            .billing()
            .upsert(&subscription_id, &rid, &billing)
            .await
            .map_err(store_error)?;
    }

    let op_url = operation_url(&subscription_id, &stored.value.spec.location, operation.id, &api_version);
    let body = codec.project(&stored.value);
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("azure-asyncoperation", op_url.parse().expect("valid header value"));
    if status == StatusCode::CREATED {
        response
            .headers_mut()
            .insert("location", op_url.parse().expect("valid header value"));
    }
    Ok(response)
}

pub async fn get_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name)): Path<(String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::cluster_codec(&api_version).expect("validated upstream");

    let rid = resource_id(&subscription_id, &resource_group, &cluster_name);
    let doc = state
        .store
        .clusters()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::from(RpError::NotFound(rid.clone())))?;

    Ok(Json(codec.project(&doc.value)).into_response())
}

pub async fn delete_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name)): Path<(String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");

    let rid = resource_id(&subscription_id, &resource_group, &cluster_name);
    let Some(mut doc) = state
        .store
        .clusters()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?
    else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    doc.value.provisioning_state = ProvisioningState::Deleting;
    state
        .store
        .clusters()
        .upsert_checked(&subscription_id, &rid, &doc.value, Some(doc.etag))
        .await
        .map_err(store_error)?;

    if let Some(internal_id) = &doc.value.internal_cs_id {
        state.cs.delete_cluster(internal_id).await.map_err(cs_error)?;
    }

    cascade_delete_node_pools(&state, &subscription_id, &rid).await?;

    if let Some(mut billing) = state
        .store
        .billing()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?
    {
        billing.value.end();
        state
            .store
            .billing()
            .upsert_checked(&subscription_id, &rid, &billing.value, Some(billing.etag))
            .await
            .map_err(store_error)?;
    }

    let operation = Operation::new_in_progress(
        subscription_id.clone(),
        rid.clone(),
        OperationType::Delete,
        doc.value.internal_cs_id.clone(),
    );
    state
        .store
        .operations()
        .upsert(&subscription_id, &operation.id.to_string(), &operation)
        .await
        .map_err(store_error)?;

    let op_url = operation_url(&subscription_id, &doc.value.spec.location, operation.id, &api_version);
    let mut response = StatusCode::ACCEPTED.into_response();
    response
        .headers_mut()
        .insert("azure-asyncoperation", op_url.parse().expect("valid header value"));
    response
        .headers_mut()
        .insert("location", op_url.parse().expect("valid header value"));
    Ok(response)
}

/// Deletes every NodePool doc under `cluster_rid`, plus the Operation docs
/// that target them — the store enforces no foreign keys, so the cascade
/// named in §3 ("deletion of a Cluster implies deletion of its NodePools
/// and their Operations") is the handler's job.
async fn cascade_delete_node_pools(
    state: &AppState,
    subscription_id: &str,
    cluster_rid: &str,
) -> Result<(), ApiError> {
    let prefix = format!("{cluster_rid}/nodePools/").to_lowercase();
    let node_pool_rids = collect_matching_keys(
        &state.store.node_pools(),
        subscription_id,
        |np: &NodePool| np.resource_id.to_lowercase().starts_with(&prefix),
        |np: &NodePool| np.resource_id.clone(),
    )
    .await
    .map_err(store_error)?;

    for node_pool_rid in &node_pool_rids {
        let operation_ids = collect_matching_keys(
            &state.store.operations(),
            subscription_id,
            |op: &Operation| &op.resource_id == node_pool_rid,
            |op: &Operation| op.id.to_string(),
        )
        .await
        .map_err(store_error)?;

        for operation_id in &operation_ids {
            state
                .store
                .operations()
                .delete(subscription_id, operation_id)
                .await
                .map_err(store_error)?;
        }

        state
            .store
            .node_pools()
            .delete(subscription_id, node_pool_rid)
            .await
            .map_err(store_error)?;
    }

    Ok(())
}

/// Pages through `container`'s partition, collecting the key of every
/// document matching `matches`.
async fn collect_matching_keys<T>(
    container: &Container<T>,
    partition_key: &str,
    matches: impl Fn(&T) -> bool,
    key_of: impl Fn(&T) -> String,
) -> Result<Vec<String>, hcprp_store::StoreError>
where
    T: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
{
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = container.query(partition_key, token.as_deref(), 200).await?;
        for doc in &page.items {
            if matches(&doc.value) {
                keys.push(key_of(&doc.value));
            }
        }
        match page.continuation_token {
            Some(t) => token = Some(t),
            None => break,
        }
    }
    Ok(keys)
}

#[derive(serde::Deserialize, Default)]
pub struct TagsPatchBody {
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// `PATCH .../hcpOpenShiftClusters/{name}`: server-merges `tags` onto the
/// existing doc; a `""` value deletes the key (§4.4 tie-breaks). Tags are
/// ARM-level metadata only and are never sent to CS, so this is a
/// synchronous store write with no Operation doc.
pub async fn patch_cluster(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name)): Path<(String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
    Json(body): Json<TagsPatchBody>,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::cluster_codec(&api_version).expect("validated upstream");

    let rid = resource_id(&subscription_id, &resource_group, &cluster_name);
    let mut doc = state
        .store
        .clusters()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::from(RpError::NotFound(rid.clone())))?;

    for (key, value) in body.tags {
        if value.is_empty() {
            doc.value.spec.tags.remove(&key);
        } else {
            doc.value.spec.tags.insert(key, value);
        }
    }

    let stored = state
        .store
        .clusters()
        .upsert_checked(&subscription_id, &rid, &doc.value, Some(doc.etag))
        .await
        .map_err(store_error)?;

    Ok(Json(codec.project(&stored.value)).into_response())
}

#[derive(serde::Deserialize)]
pub struct ListParams {
    #[serde(rename = "$top")]
    top: Option<i64>,
    #[serde(rename = "continuationToken")]
    continuation_token: Option<String>,
}

impl ListParams {
    pub(crate) fn top(&self) -> Option<i64> {
        self.top
    }

    pub(crate) fn continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }
}

const DEFAULT_PAGE_SIZE: i64 = 100;

pub async fn list_by_resource_group(
    State(state): State<AppState>,
    Path((subscription_id, resource_group)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    list_clusters(state, ctx, subscription_id, Some(resource_group), params).await
}

pub async fn list_by_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Query(params): Query<ListParams>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    list_clusters(state, ctx, subscription_id, None, params).await
}

async fn list_clusters(
    state: AppState,
    ctx: hcprp_common::RequestContext,
    subscription_id: String,
    resource_group: Option<String>,
    params: ListParams,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::cluster_codec(&api_version).expect("validated upstream");

    let page = state
        .store
        .clusters()
        .query(
            &subscription_id,
            params.continuation_token(),
            params.top().unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await
        .map_err(store_error)?;

    let prefix = resource_group.map(|rg| {
        format!("/subscriptions/{subscription_id}/resourceGroups/{rg}/").to_lowercase()
    });
    let items: Vec<Value> = page
        .items
        .iter()
        .filter(|doc| {
            prefix
                .as_ref()
                .is_none_or(|p| doc.value.resource_id.to_lowercase().starts_with(p))
        })
        .map(|doc| codec.project(&doc.value))
        .collect();

    let mut out = HashMap::new();
    out.insert("value", Value::Array(items));
    if let Some(token) = page.continuation_token {
        out.insert("nextLink", Value::String(token));
    }
    Ok(Json(out).into_response())
}
