//! ls command implementation

use anyhow::Context;
use voom::cli::ConnectArgs;
use voom::report;
use voom::session::Session;

pub async fn run(args: &ConnectArgs) -> anyhow::Result<()> {
    let session = Session::open(args)
        .await
        .context("Failed to connect to vCenter endpoint")?;
    let vms = session
        .fetch()
        .await
        .context("Failed to retrieve list of VMs")?;

    print!("{}", report::listing(&vms));
    Ok(())
}
