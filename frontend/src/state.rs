use hcprp_common::lock::SubscriptionLock;
use hcprp_cs_client::CsClient;
use hcprp_store::DocumentStore;

/// Shared application state, held once and cloned per request (§5: "the
/// process holds one DS pool and one CS client; both are Clone + Send +
/// Sync").
#[derive(Clone)]
pub struct AppState {
    pub store: DocumentStore,
    pub cs: CsClient,
    pub lock: SubscriptionLock,
}
