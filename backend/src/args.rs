use clap::Parser;
use hcprp_common::args::{CsClientArgs, LockArgs, PostgresArgs, RedisArgs};

/// Tuning for the async operation engine (§4.5). Defaults are conservative
/// enough to run against a live CS without hammering it.
#[derive(Parser, Debug, Clone)]
#[command(name = "hcprp-backend")]
#[command(about = "Async operation engine for managed hosted OpenShift control planes")]
pub struct BackendArgs {
    #[clap(flatten)]
    pub postgres: PostgresArgs,

    #[clap(flatten)]
    pub redis: RedisArgs,

    #[clap(flatten)]
    pub cs: CsClientArgs,

    #[clap(flatten)]
    pub lock: LockArgs,

    /// How often the engine scans for pending operations.
    #[arg(long, env = "ENGINE_POLL_INTERVAL_MS", default_value_t = 5_000)]
    pub poll_interval_ms: u64,

    /// Operations younger than this are left alone, giving the handler
    /// that created them a chance to finish its own write before the
    /// engine starts polling CS for the same resource.
    #[arg(long, env = "ENGINE_GRACE_INTERVAL_MS", default_value_t = 2_000)]
    pub grace_interval_ms: i64,

    /// An operation with no state change for longer than this is failed
    /// with reason `Timeout` (§4.5 step 4).
    #[arg(long, env = "ENGINE_STUCK_DEADLINE_SECS", default_value_t = 3_600)]
    pub stuck_deadline_secs: u64,

    /// Max operations pulled per scan.
    #[arg(long, env = "ENGINE_SCAN_LIMIT", default_value_t = 200)]
    pub scan_limit: i64,
}
