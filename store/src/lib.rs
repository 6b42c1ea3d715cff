pub mod container;
pub mod error;
pub mod operations;
pub mod schema;

pub use container::{Container, Page, StoredDocument};
pub use error::StoreError;

use deadpool_postgres::Pool;
use hcprp_types::{Billing, Cluster, NodePool, Operation, Subscription};

/// The document store: one pool shared by every container (§2 item 1,
/// §6.3).
#[derive(Clone)]
pub struct DocumentStore {
    pool: Pool,
}

impl DocumentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn init_schema(&self) -> anyhow::Result<()> {
        schema::init_schema(&self.pool).await
    }

    pub fn subscriptions(&self) -> Container<Subscription> {
        Container::new(self.pool.clone(), "subscriptions")
    }

    pub fn clusters(&self) -> Container<Cluster> {
        Container::new(self.pool.clone(), "clusters")
    }

    pub fn node_pools(&self) -> Container<NodePool> {
        Container::new(self.pool.clone(), "node_pools")
    }

    pub fn operations(&self) -> Container<Operation> {
        Container::new(self.pool.clone(), "async_operations")
    }

    pub fn billing(&self) -> Container<Billing> {
        Container::new(self.pool.clone(), "billing")
    }

    pub async fn scan_pending_operations(
        &self,
        grace: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<StoredDocument<Operation>>, StoreError> {
        operations::scan_pending(&self.pool, grace, limit).await
    }
}
