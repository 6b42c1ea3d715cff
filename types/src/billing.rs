use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entitlement record derived from a cluster id (§3, Billing entity).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Billing {
    pub cluster_resource_id: String,
    pub subscription_id: String,
    pub marketplace_resource_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Billing {
    pub fn start(cluster_resource_id: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            cluster_resource_id: cluster_resource_id.into(),
            subscription_id: subscription_id.into(),
            marketplace_resource_id: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }
}
