//! Entrypoint and scheduler for the async operation engine (§4.5, §5): a
//! single process-wide poll loop, structured the way the reference
//! storage operator structures its controller `run()` — shared context,
//! graceful-shutdown wiring via a `CancellationToken`, `signal_ready()`
//! once the loop is live — generalized from "watch a CRD" to "scan a
//! document store partition".

use anyhow::{Context, Result};
use hcprp_common::lock::SubscriptionLock;
use hcprp_common::shutdown::shutdown_signal;
use hcprp_cs_client::CsClient;
use hcprp_store::{DocumentStore, StoredDocument};
use hcprp_types::Operation;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::args::BackendArgs;
use crate::reconcile;

pub async fn run(args: BackendArgs) -> Result<()> {
    let postgres_pool = hcprp_common::postgres::create_pool(args.postgres).await;
    let store = DocumentStore::new(postgres_pool);
    store
        .init_schema()
        .await
        .context("failed to initialize document store schema")?;

    let redis_pool = hcprp_common::redis::init_redis(&args.redis).await;
    let lock = SubscriptionLock::new(
        redis_pool,
        args.lock.lock_ttl_ms,
        args.lock.lock_renew_interval_ms,
        args.lock.lock_acquire_timeout_ms,
    );

    let cs = CsClient::new(
        args.cs.cs_base_url.clone(),
        Duration::from_secs(args.cs.cs_request_timeout_secs),
    );

    let shutdown = CancellationToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_for_signal.cancel();
    });

    println!("{}", "⚙️ Starting hcprp async operation engine...".green());
    hcprp_common::signal_ready();

    let grace = chrono::Duration::milliseconds(args.grace_interval_ms);
    let stuck_deadline = Duration::from_secs(args.stuck_deadline_secs);
    let mut tick = tokio::time::interval(Duration::from_millis(args.poll_interval_ms));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                println!("{}", "🛑 Engine shutting down.".red());
                return Ok(());
            }
            _ = tick.tick() => {}
        }

        if let Err(e) = run_tick(&store, &cs, &lock, grace, args.scan_limit, stuck_deadline).await {
            tracing::error!(error = %e, "engine tick failed");
        }
    }
}

/// One poll cycle (§4.5): scan, group by subscription, and reconcile each
/// subscription's pending operations behind that subscription's lock so
/// writes never race the frontend's mutating handlers.
async fn run_tick(
    store: &DocumentStore,
    cs: &CsClient,
    lock: &SubscriptionLock,
    grace: chrono::Duration,
    scan_limit: i64,
    stuck_deadline: Duration,
) -> Result<()> {
    let pending = store.scan_pending_operations(grace, scan_limit).await?;
    if pending.is_empty() {
        return Ok(());
    }

    let mut by_subscription: BTreeMap<String, Vec<StoredDocument<Operation>>> = BTreeMap::new();
    for doc in pending {
        by_subscription
            .entry(doc.value.subscription_id.clone())
            .or_default()
            .push(doc);
    }

    let mut handles = Vec::with_capacity(by_subscription.len());
    for (subscription_id, ops) in by_subscription {
        let store = store.clone();
        let cs = cs.clone();
        let lock = lock.clone();
        handles.push(tokio::spawn(async move {
            reconcile_subscription(&store, &cs, &lock, &subscription_id, ops, stuck_deadline).await;
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Processes every pending operation for one subscription, holding that
/// subscription's lock for the duration (§5: "within one subscription,
/// mutating work is serialised by the subscription lock"). If the lease
/// is held elsewhere, this subscription is skipped and retried next tick.
async fn reconcile_subscription(
    store: &DocumentStore,
    cs: &CsClient,
    lock: &SubscriptionLock,
    subscription_id: &str,
    ops: Vec<StoredDocument<Operation>>,
    stuck_deadline: Duration,
) {
    let guard = match lock.acquire(subscription_id).await {
        Ok(guard) => guard,
        Err(e) => {
            tracing::debug!(error = %e, subscription_id, "subscription lock held elsewhere, deferring to next tick");
            return;
        }
    };

    // Oldest first within a subscription (§4.5 ordering requirement);
    // `scan_pending_operations` already returns rows ordered by `rid`.
    for doc in ops {
        reconcile::reconcile_one(store, cs, &doc.value, doc.etag, stuck_deadline).await;
    }

    if let Err(e) = guard.release().await {
        tracing::warn!(error = %e, subscription_id, "subscription lock release failed, TTL will reclaim it");
    }
}
