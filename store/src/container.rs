//! Generic per-container document access (§6.3/§6.4): `Get`, `Upsert`,
//! `Delete`, `Query`, all keyed by `(partition_key, key)` with optimistic
//! concurrency on `etag`. One [`Container<T>`] is instantiated per logical
//! container (Subscriptions, Clusters, NodePools, AsyncOperations, Billing)
//! over the same generic table shape.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use uuid::Uuid;

/// A document as read back from the store, carrying the store-assigned
/// bookkeeping columns alongside the typed payload.
#[derive(Debug, Clone)]
pub struct StoredDocument<T> {
    pub value: T,
    pub etag: Uuid,
    pub rid: i64,
    pub ts: DateTime<Utc>,
}

/// One page of a partition-scoped query, with an opaque continuation
/// token for the next page (§4.4 LIST handler contract).
pub struct Page<T> {
    pub items: Vec<StoredDocument<T>>,
    pub continuation_token: Option<String>,
}

#[derive(Clone)]
pub struct Container<T> {
    pool: Pool,
    table: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Container<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone,
{
    pub fn new(pool: Pool, table: &'static str) -> Self {
        Self {
            pool,
            table,
            _marker: PhantomData,
        }
    }

    pub async fn get(
        &self,
        partition_key: &str,
        key: &str,
    ) -> Result<Option<StoredDocument<T>>, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT payload, etag, rid, ts FROM {} WHERE partition_key = $1 AND key = $2",
                    self.table
                ),
                &[&partition_key, &key],
            )
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        let Some(row) = row else { return Ok(None) };
        let payload: serde_json::Value = row.get("payload");
        let value: T = serde_json::from_value(payload).map_err(|e| StoreError::Backend(e.into()))?;
        Ok(Some(StoredDocument {
            value,
            etag: row.get("etag"),
            rid: row.get("rid"),
            ts: row.get("ts"),
        }))
    }

    /// Creates or replaces the document at `(partition_key, key)`.
    ///
    /// `expected_etag = None` means "this must not already exist" (a
    /// create); `Some(etag)` means "replace only if still at this etag"
    /// (I5). Returns [`StoreError::EtagMismatch`] when the precondition
    /// fails, which callers map to ARM `Conflict`.
    pub async fn upsert(
        &self,
        partition_key: &str,
        key: &str,
        value: &T,
    ) -> Result<StoredDocument<T>, StoreError> {
        self.upsert_checked(partition_key, key, value, None).await
    }

    pub async fn upsert_checked(
        &self,
        partition_key: &str,
        key: &str,
        value: &T,
        expected_etag: Option<Uuid>,
    ) -> Result<StoredDocument<T>, StoreError> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let txn = client
            .transaction()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        let current = txn
            .query_opt(
                &format!(
                    "SELECT etag FROM {} WHERE partition_key = $1 AND key = $2 FOR UPDATE",
                    self.table
                ),
                &[&partition_key, &key],
            )
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        match (&current, expected_etag) {
            (Some(row), Some(expected)) => {
                let actual: Uuid = row.get("etag");
                if actual != expected {
                    return Err(StoreError::EtagMismatch);
                }
            }
            (Some(_), None) => return Err(StoreError::EtagMismatch),
            (None, Some(_)) => return Err(StoreError::NotFound),
            (None, None) => {}
        }

        let new_etag = Uuid::new_v4();
        let payload = serde_json::to_value(value).map_err(|e| StoreError::Backend(e.into()))?;

        let row = txn
            .query_one(
                &format!(
                    r#"
                    INSERT INTO {table} (id, key, partition_key, payload, etag)
                    VALUES (gen_random_uuid(), $1, $2, $3, $4)
                    ON CONFLICT (partition_key, key) DO UPDATE
                    SET payload = EXCLUDED.payload, etag = EXCLUDED.etag, ts = now()
                    RETURNING etag, rid, ts
                    "#,
                    table = self.table
                ),
                &[&key, &partition_key, &payload, &new_etag],
            )
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        txn.commit().await.map_err(|e| StoreError::Backend(e.into()))?;

        Ok(StoredDocument {
            value: value.clone(),
            etag: row.get("etag"),
            rid: row.get("rid"),
            ts: row.get("ts"),
        })
    }

    pub async fn delete(&self, partition_key: &str, key: &str) -> Result<bool, StoreError> {
        self.delete_checked(partition_key, key, None).await
    }

    pub async fn delete_checked(
        &self,
        partition_key: &str,
        key: &str,
        expected_etag: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let rows = if let Some(etag) = expected_etag {
            client
                .execute(
                    &format!(
                        "DELETE FROM {} WHERE partition_key = $1 AND key = $2 AND etag = $3",
                        self.table
                    ),
                    &[&partition_key, &key, &etag],
                )
                .await
        } else {
            client
                .execute(
                    &format!(
                        "DELETE FROM {} WHERE partition_key = $1 AND key = $2",
                        self.table
                    ),
                    &[&partition_key, &key],
                )
                .await
        }
        .map_err(|e| StoreError::Backend(e.into()))?;
        Ok(rows > 0)
    }

    /// Partition-scoped listing, ordered by insertion (`rid`), with an
    /// opaque continuation token holding the last-seen `rid`.
    pub async fn query(
        &self,
        partition_key: &str,
        continuation_token: Option<&str>,
        limit: i64,
    ) -> Result<Page<T>, StoreError> {
        let after_rid: i64 = continuation_token
            .map(|t| t.parse().unwrap_or(0))
            .unwrap_or(0);
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let rows = client
            .query(
                &format!(
                    "SELECT payload, etag, rid, ts FROM {} WHERE partition_key = $1 AND rid > $2 ORDER BY rid ASC LIMIT $3",
                    self.table
                ),
                &[&partition_key, &after_rid, &(limit + 1)],
            )
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        let mut items = Vec::with_capacity(rows.len().min(limit as usize));
        let mut next_token = None;
        for (i, row) in rows.iter().enumerate() {
            if i as i64 == limit {
                let rid: i64 = row.get("rid");
                next_token = Some((rid - 1).to_string());
                break;
            }
            let payload: serde_json::Value = row.get("payload");
            let value: T =
                serde_json::from_value(payload).map_err(|e| StoreError::Backend(e.into()))?;
            items.push(StoredDocument {
                value,
                etag: row.get("etag"),
                rid: row.get("rid"),
                ts: row.get("ts"),
            });
        }

        Ok(Page {
            items,
            continuation_token: next_token,
        })
    }
}
