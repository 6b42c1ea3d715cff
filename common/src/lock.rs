//! Subscription-scoped distributed lock.
//!
//! One subscription may have at most one in-flight mutating request at a
//! time; the frontend acquires this lock before handling PUT/PATCH/DELETE
//! on any resource under a subscription, and the backend acquires it before
//! reconciling that subscription's operations. Built directly on
//! `deadpool-redis` plus a compare-and-delete Lua script, the same shape as
//! [`crate::rate_limit`]'s sliding-window script.

use anyhow::{Context, Result, bail};
use deadpool_redis::{Pool, redis::Script};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const RENEW_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct SubscriptionLock {
    pool: Pool,
    ttl_ms: u64,
    renew_interval: Duration,
    acquire_timeout: Duration,
    key_prefix: String,
}

impl SubscriptionLock {
    pub fn new(pool: Pool, ttl_ms: u64, renew_interval_ms: u64, acquire_timeout_ms: u64) -> Self {
        Self {
            pool,
            ttl_ms,
            renew_interval: Duration::from_millis(renew_interval_ms),
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            key_prefix: "sublock:".to_string(),
        }
    }

    fn key(&self, subscription_id: &str) -> String {
        format!("{}{}", self.key_prefix, subscription_id.to_lowercase())
    }

    /// Attempts to acquire the lock for `subscription_id`, retrying with a
    /// short fixed backoff until `acquire_timeout` elapses. Returns a guard
    /// that renews the lease in the background until dropped or released.
    pub async fn acquire(&self, subscription_id: &str) -> Result<LockGuard> {
        let key = self.key(subscription_id);
        let token = Uuid::new_v4().to_string();
        let deadline = tokio::time::Instant::now() + self.acquire_timeout;

        loop {
            let mut conn = self
                .pool
                .get()
                .await
                .context("failed to get Redis connection for lock acquire")?;

            let acquired: bool = deadpool_redis::redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(self.ttl_ms)
                .query_async::<Option<String>>(&mut conn)
                .await
                .context("SET NX PX failed")?
                .is_some();

            if acquired {
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                bail!("timed out acquiring subscription lock for {subscription_id}");
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let cancel = CancellationToken::new();
        let renew_task = spawn_renewer(
            self.pool.clone(),
            key.clone(),
            token.clone(),
            self.ttl_ms,
            self.renew_interval,
            cancel.clone(),
        );

        Ok(LockGuard {
            pool: self.pool.clone(),
            key,
            token,
            cancel,
            renew_task: Some(renew_task),
        })
    }
}

fn spawn_renewer(
    pool: Pool,
    key: String,
    token: String,
    ttl_ms: u64,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let script = Script::new(RENEW_SCRIPT);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            let Ok(mut conn) = pool.get().await else {
                tracing::warn!(key = %key, "lock renewer could not reach Redis");
                continue;
            };
            let renewed: Result<i32, _> = script
                .key(&key)
                .arg(&token)
                .arg(ttl_ms)
                .invoke_async(&mut conn)
                .await;
            match renewed {
                Ok(1) => {}
                Ok(_) => {
                    tracing::warn!(key = %key, "lost subscription lock ownership during renewal");
                    return;
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "lock renewal failed"),
            }
        }
    })
}

/// Held while a subscription-scoped mutation is in flight. Dropping it
/// stops the background renewer; call [`LockGuard::release`] to also
/// delete the key immediately rather than waiting out the TTL.
pub struct LockGuard {
    pool: Pool,
    key: String,
    token: String,
    cancel: CancellationToken,
    renew_task: Option<JoinHandle<()>>,
}

impl LockGuard {
    pub async fn release(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(handle) = self.renew_task.take() {
            let _ = handle.await;
        }
        let mut conn = self
            .pool
            .get()
            .await
            .context("failed to get Redis connection for lock release")?;
        let script = Script::new(RELEASE_SCRIPT);
        let _: i32 = script
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await
            .context("release script failed")?;
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
