use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hcprp_common::{RequestContextExtractor, SystemData};
use hcprp_common::error::RpError;
use hcprp_cs_client::{CsNodePoolPatch, CsNodePoolSpec};
use hcprp_types::hub::{NodePool, ProvisioningState};
use hcprp_types::operation::{Operation, OperationType};
use hcprp_types::versions;
use serde_json::Value;
use std::collections::HashMap;

use super::clusters::ListParams;
use super::{cs_error, operation_url, store_error};
use crate::errors::ApiError;
use crate::middleware::IncomingSystemData;
use crate::state::AppState;
use crate::validation;

const DEFAULT_PAGE_SIZE: i64 = 100;

fn cluster_resource_id(subscription_id: &str, resource_group: &str, cluster_name: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{cluster_name}"
    )
}

fn node_pool_resource_id(cluster_rid: &str, node_pool_name: &str) -> String {
    format!("{cluster_rid}/nodePools/{node_pool_name}")
}

fn cs_spec_of(spec: &hcprp_types::hub::NodePoolSpec) -> Result<CsNodePoolSpec, ApiError> {
    Ok(CsNodePoolSpec {
        vm_size: spec.vm_size.clone(),
        replicas: spec.replicas,
        autoscaling: spec
            .autoscaling
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(anyhow::Error::from)?,
        taints: serde_json::to_value(&spec.taints).map_err(anyhow::Error::from)?,
        labels: serde_json::to_value(&spec.labels).map_err(anyhow::Error::from)?,
    })
}

pub async fn put_node_pool(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name, node_pool_name)): Path<(String, String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
    axum::Extension(incoming_system_data): axum::Extension<IncomingSystemData>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::node_pool_codec(&api_version).expect("validated upstream");

    let cluster_rid = cluster_resource_id(&subscription_id, &resource_group, &cluster_name);
    let cluster = state
        .store
        .clusters()
        .get(&subscription_id, &cluster_rid)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::from(RpError::NotFound(cluster_rid.clone())))?;
    let cluster_internal_id = cluster.value.internal_cs_id.clone().ok_or_else(|| {
        ApiError::from(RpError::Conflict(
            "parent cluster has not finished provisioning".into(),
        ))
    })?;

    let spec = codec
        .normalize(&body)
        .map_err(|e| RpError::InvalidParameter(e.to_string()))?;

    let rid = node_pool_resource_id(&cluster_rid, &node_pool_name);
    let existing = state
        .store
        .node_pools()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?;

    if let Some(doc) = &existing {
        validation::validate_node_pool_update(&doc.value.spec, &spec)?;
    } else {
        validation::validate_node_pool_create(&spec)?;
    }

    let cs_spec = cs_spec_of(&spec)?;

    let (internal_cs_id, provisioning_state, op_type, status) = if let Some(doc) = &existing {
        let internal_id = doc.value.internal_cs_id.clone().ok_or_else(|| {
            ApiError::from(RpError::Internal(anyhow::anyhow!(
                "existing node pool is missing internalCSId"
            )))
        })?;
        let patch = CsNodePoolPatch {
            replicas: Some(spec.replicas),
            autoscaling: cs_spec.autoscaling.clone(),
        };
        state
            .cs
            .update_node_pool(&internal_id, &patch)
            .await
            .map_err(cs_error)?;
        (internal_id, ProvisioningState::Updating, OperationType::Update, StatusCode::OK)
    } else {
        let created = state
            .cs
            .post_node_pool(&cluster_internal_id, &cs_spec)
            .await
            .map_err(cs_error)?;
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

    let node_pool = NodePool {
        resource_id: rid.clone(),
        parent_cluster_id: cluster_rid.clone(),
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
            .node_pools()
            .upsert_checked(&subscription_id, &rid, &node_pool, Some(etag))
            .await
    } else {
        state.store.node_pools().upsert(&subscription_id, &rid, &node_pool).await
    }
    .map_err(store_error)?;

    let operation =
        Operation::new_in_progress(subscription_id.clone(), rid.clone(), op_type, Some(internal_cs_id));
    state
        .store
        .operations()
        .upsert(&subscription_id, &operation.id.to_string(), &operation)
        .await
        .map_err(store_error)?;

    let op_url = operation_url(&subscription_id, &cluster.value.spec.location, operation.id, &api_version);
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

pub async fn get_node_pool(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name, node_pool_name)): Path<(String, String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::node_pool_codec(&api_version).expect("validated upstream");

    let cluster_rid = cluster_resource_id(&subscription_id, &resource_group, &cluster_name);
    let rid = node_pool_resource_id(&cluster_rid, &node_pool_name);
    let doc = state
        .store
        .node_pools()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::from(RpError::NotFound(rid.clone())))?;

    Ok(Json(codec.project(&doc.value)).into_response())
}

pub async fn delete_node_pool(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name, node_pool_name)): Path<(String, String, String, String)>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let cluster_rid = cluster_resource_id(&subscription_id, &resource_group, &cluster_name);
    let rid = node_pool_resource_id(&cluster_rid, &node_pool_name);

    let Some(mut doc) = state
        .store
        .node_pools()
        .get(&subscription_id, &rid)
        .await
        .map_err(store_error)?
    else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    doc.value.provisioning_state = ProvisioningState::Deleting;
    state
        .store
        .node_pools()
        .upsert_checked(&subscription_id, &rid, &doc.value, Some(doc.etag))
        .await
        .map_err(store_error)?;

    if let Some(internal_id) = &doc.value.internal_cs_id {
        state.cs.delete_node_pool(internal_id).await.map_err(cs_error)?;
    }

    let location = state
        .store
        .clusters()
        .get(&subscription_id, &cluster_rid)
        .await
        .map_err(store_error)?
        .map(|c| c.value.spec.location)
        .unwrap_or_default();

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

    let op_url = operation_url(&subscription_id, &location, operation.id, &api_version);
    let mut response = StatusCode::ACCEPTED.into_response();
    response
        .headers_mut()
        .insert("azure-asyncoperation", op_url.parse().expect("valid header value"));
    response
        .headers_mut()
        .insert("location", op_url.parse().expect("valid header value"));
    Ok(response)
}

pub async fn list_node_pools(
    State(state): State<AppState>,
    Path((subscription_id, resource_group, cluster_name)): Path<(String, String, String)>,
    Query(params): Query<ListParams>,
    RequestContextExtractor(ctx): RequestContextExtractor,
) -> Result<Response, ApiError> {
    let api_version = ctx.api_version.clone().expect("validated upstream");
    let codec = versions::node_pool_codec(&api_version).expect("validated upstream");
    let cluster_rid = cluster_resource_id(&subscription_id, &resource_group, &cluster_name);

    let page = state
        .store
        .node_pools()
        .query(
            &subscription_id,
            params.continuation_token(),
            params.top().unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await
        .map_err(store_error)?;

    let prefix = format!("{cluster_rid}/nodePools/").to_lowercase();
    let items: Vec<Value> = page
        .items
        .iter()
        .filter(|doc| doc.value.resource_id.to_lowercase().starts_with(&prefix))
        .map(|doc| codec.project(&doc.value))
        .collect();

    let mut out = HashMap::new();
    out.insert("value", Value::Array(items));
    if let Some(token) = page.continuation_token {
        out.insert("nextLink", Value::String(token));
    }
    Ok(Json(out).into_response())
}
