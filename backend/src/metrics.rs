//! Reconcile/action counters for the async operation engine, gated behind
//! the `metrics` feature exactly as the reference storage operator gates
//! its `ControllerMetrics` behind the same feature name (there backed by
//! `prometheus`, here by the `metrics` facade the rest of this workspace
//! already uses).

use crate::reconcile::OperationAction;
use std::time::Instant;

pub fn reconcile_started(resource_kind: &str) {
    metrics::counter!("engine_reconcile_total", "resource" => resource_kind.to_string()).increment(1);
}

pub fn action_taken(resource_kind: &str, action: &OperationAction) {
    metrics::counter!(
        "engine_action_total",
        "resource" => resource_kind.to_string(),
        "action" => action.label(),
    )
    .increment(1);
}

pub struct ReconcileTimer {
    start: Instant,
    resource_kind: &'static str,
}

impl ReconcileTimer {
    pub fn start(resource_kind: &'static str) -> Self {
        Self {
            start: Instant::now(),
            resource_kind,
        }
    }

    pub fn observe_read(self) -> Self {
        metrics::histogram!("engine_read_duration_seconds", "resource" => self.resource_kind)
            .record(self.start.elapsed().as_secs_f64());
        Self {
            start: Instant::now(),
            resource_kind: self.resource_kind,
        }
    }

    pub fn observe_write(self) {
        metrics::histogram!("engine_write_duration_seconds", "resource" => self.resource_kind)
            .record(self.start.elapsed().as_secs_f64());
    }
}
