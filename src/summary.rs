//! nested total/subtotal tree
//!
//! nodes live in an arena owned by [`Summary`]. children are owned through the
//! key map, the parent link is a plain index used only to push totals upward.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::vm::Vm;

/// handle to a node inside a [`Summary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// running totals for one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub vms: u64,
    pub cores: u64,
    /// MHz
    pub compute: u64,
    /// MB
    pub memory_allocated: u64,
    /// MB
    pub memory_used: u64,
    /// bytes
    pub disk_allocated: u64,
    pub disk_used: u64,
    pub disk_free: u64,
}

impl Totals {
    fn add(&mut self, vm: &Vm) {
        self.vms += 1;
        self.cores += vm.cpus;
        self.compute += vm.cpu_usage;
        self.memory_allocated += vm.memory_allocated;
        self.memory_used += vm.memory_used;
        self.disk_allocated += vm.disk_allocated;
        self.disk_used += vm.disk_used;
        self.disk_free += vm.disk_free;
    }
}

/// `part` as a percentage of `whole`; 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[derive(Debug, Default)]
struct Node {
    totals: Totals,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
}

#[derive(Debug)]
pub struct Summary {
    nodes: Vec<Node>,
}

impl Default for Summary {
    fn default() -> Self {
        Self::new()
    }
}

impl Summary {
    /// empty tree holding only the root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// add `vm` to `node` and every ancestor of it
    pub fn ingest(&mut self, node: NodeId, vm: &Vm) {
        let mut cur = Some(node);
        while let Some(id) = cur {
            let n = &mut self.nodes[id.0];
            n.totals.add(vm);
            cur = n.parent;
        }
    }

    /// child of `node` under `key`, created empty on first use
    pub fn breakout(&mut self, node: NodeId, key: &str) -> NodeId {
        if let Some(&child) = self.nodes[node.0].children.get(key) {
            return child;
        }

        let child = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(node),
            ..Node::default()
        });
        self.nodes[node.0].children.insert(key.to_string(), child);
        child
    }

    /// existing child of `node` under `key`, without creating it
    pub fn child(&self, node: NodeId, key: &str) -> Option<NodeId> {
        self.nodes[node.0].children.get(key).copied()
    }

    /// child keys of `node`, sorted
    pub fn keys(&self, node: NodeId) -> Vec<&str> {
        self.nodes[node.0].children.keys().map(String::as_str).collect()
    }

    pub fn totals(&self, node: NodeId) -> &Totals {
        &self.nodes[node.0].totals
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }
}
