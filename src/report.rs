//! text and json renderings of an inventory

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::summary::{NodeId, Summary, Totals, percentage};
use crate::vm::Vm;

const MB_PER_GB: f64 = 1024.0;
const MHZ_PER_GHZ: f64 = 1024.0;
const BYTES_PER_GB: f64 = 1073741824.0;

/// `Nd HH:MM` from a number of seconds
pub fn uptime(seconds: u64) -> String {
    let d = seconds / 86400;
    let h = seconds % 86400 / 3600;
    let m = seconds % 3600 / 60;
    format!("{}d {:02}:{:02}", d, h, m)
}

fn ghz(mhz: u64) -> f64 {
    mhz as f64 / MHZ_PER_GHZ
}

fn gb_from_mb(mb: u64) -> f64 {
    mb as f64 / MB_PER_GB
}

fn gb_from_bytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

enum Row {
    Cells(Vec<String>),
    /// separator line
    Rule,
    /// free text printed under the previous row
    Note(String),
}

/// minimal column-aligned table; first column left aligned, the rest right aligned
pub struct Table {
    header: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(Row::Cells(cells));
    }

    pub fn rule(&mut self) {
        self.rows.push(Row::Rule);
    }

    pub fn note(&mut self, line: String) {
        self.rows.push(Row::Note(line));
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            if let Row::Cells(cells) = row {
                for (i, cell) in cells.iter().enumerate() {
                    let len = cell.chars().count();
                    match widths.get_mut(i) {
                        Some(w) => *w = (*w).max(len),
                        None => widths.push(len),
                    }
                }
            }
        }
        widths
    }
}

fn write_cells(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let mut line = String::new();
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        if i == 0 {
            line.push_str(&format!("{:<w$}", cell, w = *w));
        } else {
            line.push_str(&format!("  {:>w$}", cell, w = *w));
        }
    }
    writeln!(f, "{}", line.trim_end())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        write_cells(f, &self.header, &widths)?;
        let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(f, "{}", "=".repeat(total))?;

        for row in &self.rows {
            match row {
                Row::Cells(cells) => write_cells(f, cells, &widths)?,
                Row::Rule => writeln!(f, "---")?,
                Row::Note(line) => writeln!(f, "{}", line)?,
            }
        }
        Ok(())
    }
}

/// the `ls` listing: one row per VM with its tags underneath
pub fn listing(vms: &[Vm]) -> Table {
    let mut t = Table::new(&["ID", "Status", "IP Address", "Uptime", "CPU", "Memory", "Disk"]);
    for vm in vms {
        t.row(vec![
            vm.id.clone(),
            if vm.on { "on" } else { "off" }.to_string(),
            vm.ip.clone().unwrap_or_default(),
            uptime(vm.uptime),
            format!(
                "{} cores, {}MHz used, {}MHz demand",
                vm.cpus, vm.cpu_usage, vm.cpu_demand
            ),
            format!(
                "{} MB, {} MB resv, {} MB alloc",
                vm.memory_used, vm.memory_reserved, vm.memory_allocated
            ),
            format!(
                "{:.1} GB, {:.1} GB free, {:.1} GB alloc",
                gb_from_bytes(vm.disk_used),
                gb_from_bytes(vm.disk_free),
                gb_from_bytes(vm.disk_allocated)
            ),
        ]);
        for (k, v) in &vm.tags {
            t.note(format!("  {} = {}", k, v));
        }
    }
    t
}

const SUMMARY_HEADER: [&str; 8] = [
    "",
    "cores",
    "compute",
    "memory allocated",
    "memory used",
    "disk allocated",
    "disk used",
    "disk free",
];

/// per-metric values of one node, already scaled to GHz / GB
fn scaled(t: &Totals) -> [f64; 6] {
    [
        ghz(t.compute),
        gb_from_mb(t.memory_allocated),
        gb_from_mb(t.memory_used),
        gb_from_bytes(t.disk_allocated),
        gb_from_bytes(t.disk_used),
        gb_from_bytes(t.disk_free),
    ]
}

fn raw(t: &Totals) -> [u64; 6] {
    [
        t.compute,
        t.memory_allocated,
        t.memory_used,
        t.disk_allocated,
        t.disk_used,
        t.disk_free,
    ]
}

const UNITS: [&str; 6] = ["GHz", "GB", "GB", "GB", "GB", "GB"];

fn totals_row(label: &str, t: &Totals, share_of: Option<&Totals>) -> Vec<String> {
    let mut cells = vec![label.to_string(), format!("{}", t.cores)];
    let values = scaled(t);
    for (i, v) in values.iter().enumerate() {
        let cell = match share_of {
            Some(parent) => format!(
                "{:.1} {} ({:.1}%)",
                v,
                UNITS[i],
                percentage(raw(t)[i], raw(parent)[i])
            ),
            None => format!("{:.1} {}", v, UNITS[i]),
        };
        cells.push(cell);
    }
    cells
}

fn bare_row(label: &str, t: &Totals) -> Vec<String> {
    let mut cells = vec![label.to_string(), format!("{}", t.cores)];
    cells.extend(scaled(t).iter().map(|v| format!("{:.1}", v)));
    cells
}

/// the `summary` table: grand total, then each director with its deployments.
///
/// with `percent` set, director rows also carry their share of the grand total.
pub fn summary_table(s: &Summary, percent: bool) -> Table {
    let mut t = Table::new(&SUMMARY_HEADER);
    let root = s.root();
    let all = s.totals(root);
    t.row(totals_row("ALL", all, None));
    t.rule();

    for name in s.keys(root) {
        let Some(dir) = s.child(root, name) else {
            continue;
        };
        let share = if percent { Some(all) } else { None };
        t.row(totals_row(name, s.totals(dir), share));

        for dep_name in s.keys(dir) {
            if let Some(dep) = s.child(dir, dep_name) {
                t.row(bare_row(&format!("   {}", dep_name), s.totals(dep)));
            }
        }
        t.rule();
    }
    t
}

/// json view of a summary node and everything beneath it
#[derive(Debug, Serialize)]
pub struct SummaryJson<'a> {
    #[serde(flatten)]
    pub totals: Totals,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<&'a str, SummaryJson<'a>>,
}

impl<'a> SummaryJson<'a> {
    pub fn new(s: &'a Summary, node: NodeId) -> Self {
        let children = s
            .keys(node)
            .into_iter()
            .filter_map(|k| s.child(node, k).map(|c| (k, SummaryJson::new(s, c))))
            .collect();
        Self {
            totals: *s.totals(node),
            children,
        }
    }
}
