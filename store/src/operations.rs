//! Cross-partition scan used by the async operation engine (§4.5). The
//! generic [`crate::container::Container`] is partition-scoped by design;
//! the engine instead needs "every non-terminal operation across every
//! subscription", so this is a dedicated query against the
//! `async_operations` table rather than a `Container` method, the same
//! way the reference stack writes one hand-tuned query per access pattern
//! instead of forcing every read through one generic function.

use crate::container::StoredDocument;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use hcprp_types::Operation;

/// Operations in `NotStarted` or `InProgress` whose `startedAt` is at
/// least `grace` in the past, oldest first (§4.5 ordering requirement).
pub async fn scan_pending(
    pool: &Pool,
    grace: chrono::Duration,
    limit: i64,
) -> Result<Vec<StoredDocument<Operation>>, StoreError> {
    let cutoff: DateTime<Utc> = Utc::now() - grace;
    let client = pool.get().await.map_err(|e| StoreError::Backend(e.into()))?;
    let rows = client
        .query(
            r#"
            SELECT payload, etag, rid, ts
            FROM async_operations
            WHERE payload->>'status' IN ('NotStarted', 'InProgress')
              AND (payload->>'started_at')::timestamptz <= $1
            ORDER BY rid ASC
            LIMIT $2
            "#,
            &[&cutoff, &limit],
        )
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

    rows.into_iter()
        .map(|row| {
            let payload: serde_json::Value = row.get("payload");
            let value: Operation =
                serde_json::from_value(payload).map_err(|e| StoreError::Backend(e.into()))?;
            Ok(StoredDocument {
                value,
                etag: row.get("etag"),
                rid: row.get("rid"),
                ts: row.get("ts"),
            })
        })
        .collect()
}
