//! common CLI args for all commands

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// URL of the VMware vCenter
    #[arg(short, long, env = "VOOM_URL", global = true)]
    pub url: Option<String>,

    /// vCenter username
    #[arg(short = 'U', long, env = "VOOM_USERNAME", global = true)]
    pub username: Option<String>,

    /// vCenter password
    #[arg(short = 'P', long, env = "VOOM_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// accept invalid TLS certificates from vCenter
    #[arg(short = 'k', long, env = "VOOM_INSECURE", global = true)]
    pub insecure: bool,

    /// read VMs from a `voom dump` file instead of vCenter ("-" for stdin)
    #[arg(short = 'f', long, global = true)]
    pub from: Option<PathBuf>,

    /// VI/JSON API release used for live VM stats
    #[arg(long, env = "VOOM_VIM_RELEASE", default_value = "8.0.1.0", global = true)]
    pub vim_release: String,

    /// max in-flight per-VM requests against vCenter
    #[arg(short = 'c', long, default_value_t = 8, global = true)]
    pub concurrency: usize,
}
