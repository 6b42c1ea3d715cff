//! Read phase (`determine_action`) and write phase (`take_action`) of one
//! operation's reconciliation, structured the way the reference operator
//! splits its `determine_action`/action-enum/write-phase reconcile shape,
//! generalized from "one Kubernetes resource" to "one Operation document
//! plus the CS resource it tracks" (§4.5, §4.6).

use chrono::Utc;
use hcprp_cs_client::{CsClient, CsError};
use hcprp_store::{Container, DocumentStore, StoreError};
use hcprp_types::hub::{Cluster, NodePool, ProvisioningState};
use hcprp_types::operation::{Operation, OperationError, OperationStatus, OperationType};
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Cluster,
    NodePool,
}

impl ResourceKind {
    pub fn of(resource_id: &str) -> Self {
        if resource_id.contains("/nodePools/") {
            ResourceKind::NodePool
        } else {
            ResourceKind::Cluster
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::NodePool => "nodePool",
        }
    }
}

/// Decision produced by the read phase; the write phase performs exactly
/// one of these per tick per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationAction {
    /// CS reports a non-terminal state; persist it and keep polling.
    Waiting { provisioning_state: ProvisioningState },
    /// CS state is unrecognized; preserve the resource's current state,
    /// warn, and keep polling (§4.6 "unknown" row).
    UnknownCsState { raw: String },
    /// CS call failed transiently and the operation isn't stuck yet;
    /// leave everything as-is for the next tick.
    Retry,
    /// CS reports a terminal success.
    Succeeded,
    /// The delete target is confirmed gone upstream.
    Gone,
    /// CS reports a terminal failure, or a permanent request error.
    Failed { code: String, message: String, target: Option<String> },
    /// No progress for longer than the stuck deadline.
    TimedOut,
}

impl OperationAction {
    pub fn label(&self) -> &'static str {
        match self {
            OperationAction::Waiting { .. } => "Waiting",
            OperationAction::UnknownCsState { .. } => "UnknownCsState",
            OperationAction::Retry => "Retry",
            OperationAction::Succeeded => "Succeeded",
            OperationAction::Gone => "Gone",
            OperationAction::Failed { .. } => "Failed",
            OperationAction::TimedOut => "TimedOut",
        }
    }
}

/// Maps a CS provisioning state to the internal alphabet (§4.6 table).
/// Returns `None` for an unrecognized state, signalling "preserve
/// previous, raise warning" to the caller.
fn map_cs_state(cs_state: &hcprp_cs_client::CsProvisioningState) -> Option<ProvisioningState> {
    use hcprp_cs_client::CsProvisioningState as Cs;
    match cs_state {
        Cs::Ready | Cs::Active => Some(ProvisioningState::Succeeded),
        Cs::Installing | Cs::Pending | Cs::Validating => Some(ProvisioningState::Provisioning),
        Cs::Updating => Some(ProvisioningState::Updating),
        Cs::Error => Some(ProvisioningState::Failed),
        Cs::Uninstalling => Some(ProvisioningState::Deleting),
        Cs::Unknown(_) => None,
    }
}

async fn lookup_cs_state(
    cs: &CsClient,
    kind: ResourceKind,
    internal_id: &str,
) -> Result<hcprp_cs_client::CsProvisioningState, CsError> {
    match kind {
        ResourceKind::Cluster => cs.get_cluster(internal_id).await.map(|c| c.state),
        ResourceKind::NodePool => cs.get_node_pool(internal_id).await.map(|n| n.state),
    }
}

fn is_stuck(op: &Operation, stuck_deadline: Duration) -> bool {
    Utc::now()
        .signed_duration_since(op.last_transition)
        .to_std()
        .map(|elapsed| elapsed > stuck_deadline)
        .unwrap_or(false)
}

/// Read phase: decide what to do about one operation, given CS's current
/// view of the resource it targets (or the error calling CS produced).
pub fn determine_action(
    op: &Operation,
    cs_lookup: Result<hcprp_cs_client::CsProvisioningState, CsError>,
    stuck_deadline: Duration,
) -> OperationAction {
    let stuck = is_stuck(op, stuck_deadline);

    match cs_lookup {
        Ok(cs_state) => match map_cs_state(&cs_state) {
            Some(ProvisioningState::Succeeded) => OperationAction::Succeeded,
            Some(ProvisioningState::Failed) => OperationAction::Failed {
                code: "ResourceProvisioningFailed".into(),
                message: format!("upstream reported an error state ({})", cs_state.as_str()),
                target: Some(op.resource_id.clone()),
            },
            Some(state) => {
                if stuck {
                    OperationAction::TimedOut
                } else {
                    OperationAction::Waiting { provisioning_state: state }
                }
            }
            None => OperationAction::UnknownCsState { raw: cs_state.as_str().to_string() },
        },
        Err(CsError::NotFound) => {
            if op.operation_type == OperationType::Delete {
                OperationAction::Gone
            } else {
                OperationAction::Failed {
                    code: "ResourceNotFound".into(),
                    message: "resource disappeared upstream before provisioning completed".into(),
                    target: Some(op.resource_id.clone()),
                }
            }
        }
        Err(CsError::Conflict { target }) => OperationAction::Failed {
            code: "Conflict".into(),
            message: "upstream reports a conflicting resource state".into(),
            target,
        },
        Err(CsError::Permanent { code, message, target }) => {
            OperationAction::Failed { code, message, target }
        }
        Err(e) if e.is_transient() => {
            if stuck {
                OperationAction::TimedOut
            } else {
                OperationAction::Retry
            }
        }
        Err(e) => OperationAction::Failed {
            code: "InternalServerError".into(),
            message: e.to_string(),
            target: None,
        },
    }
}

/// Reconciles one operation end to end: looks up CS state, decides an
/// action, and performs it. Errors are logged and leave the operation
/// untouched for the next tick rather than propagating, since one bad
/// operation must not stop the scan from processing the rest.
pub async fn reconcile_one(store: &DocumentStore, cs: &CsClient, op: &Operation, op_etag: uuid::Uuid, stuck_deadline: Duration) {
    let kind = ResourceKind::of(&op.resource_id);

    #[cfg(feature = "metrics")]
    metrics::reconcile_started(kind.label());
    #[cfg(feature = "metrics")]
    let timer = metrics::ReconcileTimer::start(kind.label());

    let cs_lookup = match &op.internal_cs_id {
        Some(internal_id) => lookup_cs_state(cs, kind, internal_id).await,
        None if op.operation_type == OperationType::Delete => Err(CsError::NotFound),
        None => {
            tracing::warn!(operation_id = %op.id, "operation has no internalCSId yet, skipping this tick");
            return;
        }
    };

    #[cfg(feature = "metrics")]
    let timer = timer.observe_read();

    let action = determine_action(op, cs_lookup, stuck_deadline);

    #[cfg(feature = "metrics")]
    metrics::action_taken(kind.label(), &action);

    if let Err(e) = take_action(store, op.clone(), op_etag, kind, action).await {
        tracing::error!(error = %e, operation_id = %op.id, "failed to persist reconciliation result");
    }

    #[cfg(feature = "metrics")]
    timer.observe_write();
}

async fn take_action(
    store: &DocumentStore,
    mut op: Operation,
    op_etag: uuid::Uuid,
    kind: ResourceKind,
    action: OperationAction,
) -> anyhow::Result<()> {
    match action {
        OperationAction::Retry => return Ok(()),
        OperationAction::Waiting { provisioning_state } => {
            set_resource_state(store, &op, kind, provisioning_state).await?;
            op.transition(OperationStatus::InProgress);
        }
        OperationAction::UnknownCsState { raw } => {
            tracing::warn!(resource_id = %op.resource_id, cs_state = %raw, "unrecognized CS provisioning state, preserving current state");
            op.transition(OperationStatus::InProgress);
        }
        OperationAction::TimedOut => {
            set_resource_state(store, &op, kind, ProvisioningState::Failed).await?;
            op.fail(OperationError {
                code: "Timeout".into(),
                message: "no provisioning progress before the stuck deadline".into(),
                target: Some(op.resource_id.clone()),
            });
        }
        OperationAction::Failed { code, message, target } => {
            set_resource_state(store, &op, kind, ProvisioningState::Failed).await?;
            op.fail(OperationError { code, message, target });
        }
        OperationAction::Succeeded => {
            set_resource_state(store, &op, kind, ProvisioningState::Succeeded).await?;
            op.transition(OperationStatus::Succeeded);
        }
        OperationAction::Gone => {
            remove_resource(store, &op, kind).await?;
            op.transition(OperationStatus::Succeeded);
        }
    }

    persist_operation(store, &op, op_etag).await
}

async fn set_resource_state(
    store: &DocumentStore,
    op: &Operation,
    kind: ResourceKind,
    state: ProvisioningState,
) -> anyhow::Result<()> {
    match kind {
        ResourceKind::Cluster => set_state(store.clusters(), &op.subscription_id, &op.resource_id, state, |c: &mut Cluster| &mut c.provisioning_state).await,
        ResourceKind::NodePool => set_state(store.node_pools(), &op.subscription_id, &op.resource_id, state, |n: &mut NodePool| &mut n.provisioning_state).await,
    }
}

async fn set_state<T: Clone + serde::Serialize + serde::de::DeserializeOwned + Send + Sync>(
    container: Container<T>,
    subscription_id: &str,
    resource_id: &str,
    state: ProvisioningState,
    field: impl Fn(&mut T) -> &mut ProvisioningState,
) -> anyhow::Result<()> {
    let Some(doc) = container.get(subscription_id, resource_id).await? else {
        // The resource doc was already removed (e.g. a concurrent Delete
        // finalized it); nothing left to stamp.
        return Ok(());
    };
    let mut value = doc.value;
    *field(&mut value) = state;
    match container.upsert_checked(subscription_id, resource_id, &value, Some(doc.etag)).await {
        Ok(_) => Ok(()),
        Err(StoreError::EtagMismatch) => {
            tracing::warn!(resource_id, "resource doc changed concurrently, retrying next tick");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn remove_resource(store: &DocumentStore, op: &Operation, kind: ResourceKind) -> anyhow::Result<()> {
    match kind {
        ResourceKind::Cluster => {
            store.clusters().delete(&op.subscription_id, &op.resource_id).await?;
        }
        ResourceKind::NodePool => {
            store.node_pools().delete(&op.subscription_id, &op.resource_id).await?;
        }
    }
    Ok(())
}

async fn persist_operation(store: &DocumentStore, op: &Operation, op_etag: uuid::Uuid) -> anyhow::Result<()> {
    match store
        .operations()
        .upsert_checked(&op.subscription_id, &op.id.to_string(), op, Some(op_etag))
        .await
    {
        Ok(_) => Ok(()),
        Err(StoreError::EtagMismatch) => {
            tracing::warn!(operation_id = %op.id, "operation doc changed concurrently, retrying next tick");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcprp_cs_client::CsProvisioningState;

    fn sample_op(op_type: OperationType) -> Operation {
        Operation::new_in_progress("sub-1", "rid-1", op_type, Some("cs-1".into()))
    }

    #[test]
    fn ready_maps_to_succeeded() {
        let op = sample_op(OperationType::Create);
        let action = determine_action(&op, Ok(CsProvisioningState::Ready), Duration::from_secs(3600));
        assert_eq!(action, OperationAction::Succeeded);
    }

    #[test]
    fn installing_is_waiting_provisioning() {
        let op = sample_op(OperationType::Create);
        let action = determine_action(&op, Ok(CsProvisioningState::Installing), Duration::from_secs(3600));
        assert_eq!(action, OperationAction::Waiting { provisioning_state: ProvisioningState::Provisioning });
    }

    #[test]
    fn error_state_fails_the_operation() {
        let op = sample_op(OperationType::Update);
        let action = determine_action(&op, Ok(CsProvisioningState::Error), Duration::from_secs(3600));
        assert!(matches!(action, OperationAction::Failed { code, .. } if code == "ResourceProvisioningFailed"));
    }

    #[test]
    fn not_found_on_delete_is_gone() {
        let op = sample_op(OperationType::Delete);
        let action = determine_action(&op, Err(CsError::NotFound), Duration::from_secs(3600));
        assert_eq!(action, OperationAction::Gone);
    }

    #[test]
    fn not_found_on_create_is_failed() {
        let op = sample_op(OperationType::Create);
        let action = determine_action(&op, Err(CsError::NotFound), Duration::from_secs(3600));
        assert!(matches!(action, OperationAction::Failed { code, .. } if code == "ResourceNotFound"));
    }

    #[test]
    fn transient_error_retries_until_stuck() {
        let op = sample_op(OperationType::Create);
        let err = || CsError::Transient { status: 503, message: "unavailable".into() };
        assert_eq!(determine_action(&op, Err(err()), Duration::from_secs(3600)), OperationAction::Retry);
        assert_eq!(determine_action(&op, Err(err()), Duration::from_secs(0)), OperationAction::TimedOut);
    }

    #[test]
    fn unknown_cs_state_preserves_and_warns() {
        let op = sample_op(OperationType::Create);
        let action = determine_action(
            &op,
            Ok(CsProvisioningState::Unknown("migrating".into())),
            Duration::from_secs(3600),
        );
        assert_eq!(action, OperationAction::UnknownCsState { raw: "migrating".into() });
    }
}
