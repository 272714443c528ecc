//! director/deployment attribution and the summary pass over an inventory

use tracing::{debug, warn};

use crate::summary::Summary;
use crate::vm::Vm;

/// group used when a VM carries no usable ownership tag
pub const UNKNOWN: &str = ":unknown:";

/// what to do with a powered-on VM that has no director
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unattributed {
    /// fall back to the `voom` tag (or [`UNKNOWN`]) keyed by VM id
    #[default]
    Bucket,
    /// leave the VM out of every total
    Drop,
}

/// where a VM lands in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Group { director: String, deployment: String },
    /// powered off, never counted
    Off,
    /// no director and the drop policy is in effect
    Dropped,
}

/// derive the (director, deployment) pair for `vm`.
///
/// the second value is true when the VM could not be attributed at all.
pub fn place(vm: &Vm, policy: Unattributed) -> (Placement, bool) {
    if !vm.on {
        return (Placement::Off, false);
    }

    let mut director = vm.tag("director");
    let mut deployment = vm.tag("deployment");
    // bosh-init deploys carry their own name as the director
    if director == "bosh-init" {
        director = deployment;
    }

    if !director.is_empty() {
        return (group(director, deployment), false);
    }

    if policy == Unattributed::Drop {
        return (Placement::Dropped, true);
    }

    director = vm.tag("voom");
    deployment = vm.id.as_str();
    if director.is_empty() {
        return (group(UNKNOWN, deployment), true);
    }
    (group(director, deployment), false)
}

fn group(director: &str, deployment: &str) -> Placement {
    Placement::Group {
        director: director.to_string(),
        deployment: deployment.to_string(),
    }
}

/// result of one summary pass
#[derive(Debug, Default)]
pub struct Rollup {
    pub summary: Summary,
    /// ids of powered-on VMs with no director, in input order
    pub unattributed: Vec<String>,
    pub powered_off: usize,
}

impl Rollup {
    /// feed every VM into a fresh tree
    pub fn tally<'a, I>(vms: I, policy: Unattributed) -> Self
    where
        I: IntoIterator<Item = &'a Vm>,
    {
        let mut rollup = Rollup::default();
        for vm in vms {
            rollup.add(vm, policy);
        }
        debug!(
            vms = rollup.summary.totals(rollup.summary.root()).vms,
            powered_off = rollup.powered_off,
            unattributed = rollup.unattributed.len(),
            "summary complete"
        );
        rollup
    }

    fn add(&mut self, vm: &Vm, policy: Unattributed) {
        let (placement, orphan) = place(vm, policy);
        if orphan {
            warn!(vm = %vm.id, "vm {} has no director!", vm.id);
            self.unattributed.push(vm.id.clone());
        }

        match placement {
            Placement::Off => self.powered_off += 1,
            Placement::Dropped => {}
            Placement::Group {
                director,
                deployment,
            } => {
                let root = self.summary.root();
                let dir = self.summary.breakout(root, &director);
                let dep = self.summary.breakout(dir, &deployment);
                self.summary.ingest(dep, vm);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(id: &str, tags: &[(&str, &str)]) -> Vm {
        Vm {
            id: id.into(),
            on: true,
            cpus: 1,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn at(director: &str, deployment: &str) -> Placement {
        group(director, deployment)
    }

    #[test]
    fn director_and_deployment() {
        let v = vm("a", &[("director", "teamX"), ("deployment", "web")]);
        assert_eq!(place(&v, Unattributed::Bucket), (at("teamX", "web"), false));
    }

    #[test]
    fn bosh_init_uses_deployment_as_director() {
        let v = vm("a", &[("director", "bosh-init"), ("deployment", "infra")]);
        assert_eq!(place(&v, Unattributed::Bucket), (at("infra", "infra"), false));
        assert_eq!(place(&v, Unattributed::Drop), (at("infra", "infra"), false));
    }

    #[test]
    fn bosh_init_without_deployment_is_unattributed() {
        let v = vm("a", &[("director", "bosh-init")]);
        assert_eq!(place(&v, Unattributed::Bucket), (at(UNKNOWN, "a"), true));
    }

    #[test]
    fn voom_tag_fallback_keys_by_id() {
        let v = vm("jumpbox", &[("voom", "ops"), ("deployment", "ignored")]);
        assert_eq!(place(&v, Unattributed::Bucket), (at("ops", "jumpbox"), false));
    }

    #[test]
    fn no_tags_buckets_as_unknown() {
        let v = vm("stray", &[]);
        assert_eq!(place(&v, Unattributed::Bucket), (at(UNKNOWN, "stray"), true));
    }

    #[test]
    fn drop_policy_skips_untagged() {
        let v = vm("stray", &[("voom", "ops")]);
        assert_eq!(place(&v, Unattributed::Drop), (Placement::Dropped, true));
    }

    #[test]
    fn powered_off_is_never_placed() {
        let mut v = vm("a", &[("director", "teamX"), ("deployment", "web")]);
        v.on = false;
        assert_eq!(place(&v, Unattributed::Bucket), (Placement::Off, false));
    }

    #[test]
    fn tally_scenario() {
        let mut a = vm("a", &[("director", "teamX"), ("deployment", "web")]);
        a.cpus = 2;
        a.cpu_usage = 500;
        a.memory_used = 100;
        let mut b = vm("b", &[("director", "teamX"), ("deployment", "db")]);
        b.cpus = 4;
        b.cpu_usage = 1000;
        b.memory_used = 200;

        let r = Rollup::tally(&[a, b], Unattributed::Bucket);
        let s = &r.summary;
        let root = s.root();
        assert_eq!(s.totals(root).cores, 6);
        assert_eq!(s.totals(root).compute, 1500);
        assert_eq!(s.keys(root), vec!["teamX"]);

        let team = s.child(root, "teamX").unwrap();
        assert_eq!(s.totals(team).cores, 6);
        assert_eq!(s.keys(team), vec!["db", "web"]);
        let web = s.child(team, "web").unwrap();
        assert_eq!(s.totals(web).cores, 2);
        assert!(r.unattributed.is_empty());
    }

    #[test]
    fn tally_skips_powered_off() {
        let mut off = vm("off", &[("director", "teamX"), ("deployment", "web")]);
        off.on = false;
        off.cpus = 16;

        let r = Rollup::tally(&[off], Unattributed::Bucket);
        assert_eq!(r.powered_off, 1);
        assert_eq!(r.summary.totals(r.summary.root()).cores, 0);
        assert!(r.summary.keys(r.summary.root()).is_empty());
    }

    #[test]
    fn tally_records_each_orphan_once() {
        let vms = [vm("stray", &[]), vm("ok", &[("director", "d"), ("deployment", "x")])];

        let bucket = Rollup::tally(&vms, Unattributed::Bucket);
        assert_eq!(bucket.unattributed, vec!["stray"]);
        let s = &bucket.summary;
        let unknown = s.child(s.root(), UNKNOWN).unwrap();
        assert_eq!(s.keys(unknown), vec!["stray"]);
        assert_eq!(s.totals(s.root()).vms, 2);

        let dropped = Rollup::tally(&vms, Unattributed::Drop);
        assert_eq!(dropped.unattributed, vec!["stray"]);
        let s = &dropped.summary;
        assert_eq!(s.keys(s.root()), vec!["d"]);
        assert_eq!(s.totals(s.root()).vms, 1);
    }

    #[test]
    fn warns_once_per_orphan() {
        let vms = [
            vm("stray-a", &[]),
            vm("jumpbox", &[("voom", "ops")]),
            vm("stray-b", &[("deployment", "x")]),
            vm("ok", &[("director", "d"), ("deployment", "x")]),
        ];

        let (_, log) = crate::testlog::logged(|| Rollup::tally(&vms, Unattributed::Bucket));
        assert_eq!(log.matches("has no director!").count(), 2);
        assert_eq!(log.matches("vm stray-a has no director!").count(), 1);
        assert_eq!(log.matches("vm stray-b has no director!").count(), 1);
        assert!(!log.contains("vm jumpbox has no director!"));

        let (_, log) = crate::testlog::logged(|| Rollup::tally(&vms, Unattributed::Drop));
        assert_eq!(log.matches("has no director!").count(), 3);
        assert_eq!(log.matches("vm jumpbox has no director!").count(), 1);
    }

    #[test]
    fn tally_of_nothing() {
        let r = Rollup::tally(std::iter::empty(), Unattributed::Bucket);
        assert_eq!(r.summary.totals(r.summary.root()).vms, 0);
        assert!(r.summary.keys(r.summary.root()).is_empty());
        assert!(r.unattributed.is_empty());
    }
}
