//! summary command implementation

use anyhow::Context;
use voom::cli::ConnectArgs;
use voom::report::{self, SummaryJson};
use voom::rollup::{Rollup, Unattributed};
use voom::session::Session;

pub async fn run(
    args: &ConnectArgs,
    percentage: bool,
    json: bool,
    policy: Unattributed,
) -> anyhow::Result<()> {
    let session = Session::open(args)
        .await
        .context("Failed to connect to vCenter endpoint")?;
    let vms = session
        .fetch()
        .await
        .context("Failed to retrieve list of VMs")?;

    // all VMs are in hand before the tree is touched
    let rollup = Rollup::tally(&vms, policy);
    let s = &rollup.summary;

    if json {
        println!("{}", serde_json::to_string(&SummaryJson::new(s, s.root()))?);
    } else {
        print!("{}", report::summary_table(s, percentage));
    }
    Ok(())
}
