//! per-machine resource records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// one virtual machine as seen by a single inventory retrieval.
///
/// cpu figures are MHz, memory figures are MB and disk figures are bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vm {
    pub id: String,
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// seconds since power-on
    pub uptime: u64,

    pub cpus: u64,
    pub cpu_usage: u64,
    pub cpu_demand: u64,

    pub memory_allocated: u64,
    pub memory_reserved: u64,
    pub memory_used: u64,

    pub disk_allocated: u64,
    pub disk_used: u64,
    pub disk_free: u64,

    pub tags: BTreeMap<String, String>,
}

impl Vm {
    /// tag value, or "" when the tag is absent
    pub fn tag(&self, key: &str) -> &str {
        self.tags.get(key).map(String::as_str).unwrap_or("")
    }
}

/// on-disk shape of `voom dump`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dump {
    #[serde(default)]
    pub vms: Vec<Vm>,
}
