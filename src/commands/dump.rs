//! dump command implementation

use anyhow::Context;
use voom::cli::ConnectArgs;
use voom::session::Session;
use voom::vm::Dump;

pub async fn run(args: &ConnectArgs) -> anyhow::Result<()> {
    let session = Session::open(args)
        .await
        .context("Failed to connect to vCenter endpoint")?;
    let vms = session
        .fetch()
        .await
        .context("Failed to retrieve list of VMs")?;

    println!("{}", serde_json::to_string(&Dump { vms })?);
    Ok(())
}
