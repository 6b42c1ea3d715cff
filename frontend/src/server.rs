use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, put};
use hcprp_common::shutdown::shutdown_signal;
use hcprp_cs_client::CsClient;
use hcprp_store::DocumentStore;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;

use crate::args::ServerArgs;
use crate::handlers::{clusters, node_pools, operations, subscriptions};
use crate::middleware;
use crate::state::AppState;

const CLUSTER_PATH: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroup}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{clusterName}";
const CLUSTERS_RG_PATH: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroup}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters";
const CLUSTERS_SUB_PATH: &str = "/subscriptions/{subscriptionId}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters";
const NODE_POOL_PATH: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroup}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{clusterName}/nodePools/{nodePoolName}";
const NODE_POOLS_PATH: &str = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroup}/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/{clusterName}/nodePools";
const OPERATION_RESULT_PATH: &str = "/subscriptions/{subscriptionId}/providers/Microsoft.RedHatOpenShift/locations/{location}/operationResults/{operationId}";
const OPERATION_STATUS_PATH: &str = "/subscriptions/{subscriptionId}/providers/Microsoft.RedHatOpenShift/locations/{location}/operationStatuses/{operationId}";
const SUBSCRIPTION_PATH: &str = "/subscriptions/{subscriptionId}";

async fn healthz() -> &'static str {
    "ok"
}

/// Assembles the router and its middleware stack (§4.1). Layers are
/// listed innermost-first below; axum applies the last `.layer()` call
/// outermost, so reading top to bottom here is reading the request path
/// outside-in.
pub fn build_router(state: AppState, allowed_origins: Vec<String>) -> Router {
    let mutating = Router::new()
        .route(
            CLUSTER_PATH,
            put(clusters::put_cluster)
                .patch(clusters::patch_cluster)
                .delete(clusters::delete_cluster),
        )
        .route(NODE_POOL_PATH, put(node_pools::put_node_pool).delete(node_pools::delete_node_pool))
        .route(SUBSCRIPTION_PATH, put(subscriptions::put_subscription))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::subscription_lock,
        ));

    let reads = Router::new()
        .route(CLUSTER_PATH, get(clusters::get_cluster))
        .route(CLUSTERS_RG_PATH, get(clusters::list_by_resource_group))
        .route(CLUSTERS_SUB_PATH, get(clusters::list_by_subscription))
        .route(NODE_POOL_PATH, get(node_pools::get_node_pool))
        .route(NODE_POOLS_PATH, get(node_pools::list_node_pools))
        .route(OPERATION_RESULT_PATH, get(operations::get_operation_result))
        .route(OPERATION_STATUS_PATH, get(operations::get_operation_status));

    let health = Router::new().route("/healthz", get(healthz)).route("/readyz", get(healthz));

    let cors = if allowed_origins.is_empty() {
        hcprp_common::cors::dev()
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(String::as_str).collect();
        hcprp_common::cors::prod(&origins)
    };

    Router::new()
        .merge(mutating)
        .merge(reads)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::subscription_state_gate,
        ))
        .layer(axum::middleware::from_fn(middleware::api_version_validation))
        .layer(axum::middleware::from_fn(middleware::system_data))
        .layer(axum::middleware::from_fn(
            hcprp_common::middleware::request_context,
        ))
        .layer(axum::middleware::from_fn(hcprp_common::access_log::request))
        .merge(health)
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(args: ServerArgs) -> Result<()> {
    let postgres_pool = hcprp_common::postgres::create_pool(args.postgres).await;
    let store = DocumentStore::new(postgres_pool);
    store
        .init_schema()
        .await
        .context("failed to initialize document store schema")?;

    let redis_pool = hcprp_common::redis::init_redis(&args.redis).await;
    let lock = hcprp_common::lock::SubscriptionLock::new(
        redis_pool,
        args.lock.lock_ttl_ms,
        args.lock.lock_renew_interval_ms,
        args.lock.lock_acquire_timeout_ms,
    );

    let cs = CsClient::new(
        args.cs.cs_base_url.clone(),
        Duration::from_secs(args.cs.cs_request_timeout_secs),
    );

    let state = AppState { store, cs, lock };
    let router = build_router(state, args.allowed_origins);

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!(%addr, "starting hcprp frontend");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    hcprp_common::signal_ready();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    tracing::info!("server stopped gracefully");
    Ok(())
}
