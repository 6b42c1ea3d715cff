use clap::Parser;
use hcprp_common::args::{CsClientArgs, LockArgs, PostgresArgs, RedisArgs};

#[derive(Parser, Debug, Clone)]
#[command(name = "hcprp-frontend")]
#[command(about = "ARM frontend for managed hosted OpenShift control planes")]
pub struct ServerArgs {
    /// Port to listen on for ARM requests.
    #[arg(long, env = "PORT", default_value_t = 8443)]
    pub port: u16,

    #[clap(flatten)]
    pub postgres: PostgresArgs,

    #[clap(flatten)]
    pub redis: RedisArgs,

    #[clap(flatten)]
    pub cs: CsClientArgs,

    #[clap(flatten)]
    pub lock: LockArgs,

    /// Origins allowed to call this RP directly; unset runs a permissive
    /// dev CORS policy.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,
}
