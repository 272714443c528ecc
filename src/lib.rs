//! voom: vCenter VM inventory and resource rollups
//!
//! retrieves VMs from vCenter (or a saved dump) and totals their resources
//! per BOSH director and deployment

pub mod cli;
pub mod error;
pub mod report;
pub mod rollup;
pub mod session;
pub mod summary;
#[cfg(test)]
mod testlog;
pub mod vcenter;
pub mod vm;
