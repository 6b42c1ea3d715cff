use anyhow::{Context, Result};
use deadpool_postgres::Pool;

const TABLES: &[&str] = &["subscriptions", "clusters", "node_pools", "async_operations", "billing"];

/// Creates the generic document-envelope table (§3 expansion note, §6.4)
/// for each container if it doesn't already exist.
pub async fn init_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await.context("failed to get db connection")?;

    for table in TABLES {
        client
            .execute(
                &format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS {table} (
                        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                        key TEXT NOT NULL,
                        partition_key TEXT NOT NULL,
                        payload JSONB NOT NULL,
                        etag UUID NOT NULL,
                        rid BIGSERIAL,
                        ts TIMESTAMPTZ NOT NULL DEFAULT now(),
                        UNIQUE (partition_key, key)
                    )
                    "#
                ),
                &[],
            )
            .await
            .with_context(|| format!("failed to create {table} table"))?;

        client
            .execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_partition_rid ON {table} (partition_key, rid)"
                ),
                &[],
            )
            .await
            .with_context(|| format!("failed to create partition index on {table}"))?;
    }

    tracing::info!("document store schema initialized");
    Ok(())
}
