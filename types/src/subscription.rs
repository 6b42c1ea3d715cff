use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription lifecycle state (§4.7). Transitions are enforced by the
/// frontend's state-gate middleware, not by this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Unregistered,
    Registered,
    Warned,
    Suspended,
    Deleted,
}

impl SubscriptionState {
    /// Whether a mutating request (PUT/PATCH/DELETE on a managed resource)
    /// is allowed while the subscription is in this state.
    pub fn allows_mutation(&self) -> bool {
        matches!(self, SubscriptionState::Registered)
    }

    /// Whether a read (GET/LIST) is allowed while the subscription is in
    /// this state.
    pub fn allows_read(&self) -> bool {
        !matches!(self, SubscriptionState::Deleted)
    }

    /// Whether `next` is a legal transition from `self`, per §4.7.
    pub fn can_transition_to(&self, next: SubscriptionState) -> bool {
        use SubscriptionState::*;
        if next == Deleted {
            return true;
        }
        matches!(
            (self, next),
            (Unregistered, Registered)
                | (Registered, Warned)
                | (Warned, Registered)
                | (Registered, Suspended)
                | (Warned, Suspended)
                | (Suspended, Registered)
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub state: SubscriptionState,
    pub tenant_id: Option<Uuid>,
    pub registration_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub etag: Uuid,
}

impl Subscription {
    pub fn new_unregistered(subscription_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            subscription_id,
            state: SubscriptionState::Unregistered,
            tenant_id: None,
            registration_date: now,
            last_updated: now,
            etag: Uuid::new_v4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_allows_mutation_suspended_does_not() {
        assert!(SubscriptionState::Registered.allows_mutation());
        assert!(!SubscriptionState::Suspended.allows_mutation());
        assert!(!SubscriptionState::Warned.allows_mutation());
    }

    #[test]
    fn deleted_blocks_reads() {
        assert!(!SubscriptionState::Deleted.allows_read());
        assert!(SubscriptionState::Suspended.allows_read());
    }

    #[test]
    fn any_state_can_transition_to_deleted() {
        assert!(SubscriptionState::Registered.can_transition_to(SubscriptionState::Deleted));
        assert!(SubscriptionState::Suspended.can_transition_to(SubscriptionState::Deleted));
    }

    #[test]
    fn unregistered_cannot_jump_to_suspended() {
        assert!(!SubscriptionState::Unregistered.can_transition_to(SubscriptionState::Suspended));
    }
}
