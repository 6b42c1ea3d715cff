use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed | OperationStatus::Canceled
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationError {
    pub code: String,
    pub message: String,
    pub target: Option<String>,
}

/// The persisted record tracking one long-running operation from
/// acceptance to terminal state (§3, Operation entity).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub subscription_id: String,
    pub resource_id: String,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub internal_cs_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_transition: DateTime<Utc>,
    pub error: Option<OperationError>,
    pub notification_uri: Option<String>,
}

impl Operation {
    pub fn new_in_progress(
        subscription_id: impl Into<String>,
        resource_id: impl Into<String>,
        operation_type: OperationType,
        internal_cs_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subscription_id: subscription_id.into(),
            resource_id: resource_id.into(),
            operation_type,
            status: OperationStatus::InProgress,
            internal_cs_id,
            started_at: now,
            last_transition: now,
            error: None,
            notification_uri: None,
        }
    }

    pub fn transition(&mut self, status: OperationStatus) {
        self.status = status;
        self.last_transition = Utc::now();
    }

    pub fn fail(&mut self, error: OperationError) {
        self.error = Some(error);
        self.transition(OperationStatus::Failed);
    }
}
