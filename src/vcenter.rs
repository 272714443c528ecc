//! vCenter REST inventory client
//!
//! talks to the vSphere Automation API (`/api/...`) for inventory, disks and
//! tags, and to the VI/JSON API (`/sdk/vim25/...`, vCenter 8.0U1+) for the
//! live quick stats. one session token is obtained up front and sent as
//! `vmware-api-session-id` on every call to either API.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Result, VoomError};
use crate::vm::Vm;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// VI/JSON release used when none is configured
pub const DEFAULT_VIM_RELEASE: &str = "8.0.1.0";

/// connection settings for one vCenter
#[derive(Debug, Clone)]
pub struct VcenterConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub insecure: bool,
    pub concurrency: usize,
    /// VI/JSON API release segment, e.g. "8.0.1.0"
    pub vim_release: String,
}

#[derive(Debug, Clone, Deserialize)]
struct VmSummary {
    vm: String,
    name: String,
    power_state: String,
    #[serde(default)]
    cpu_count: Option<u64>,
    #[serde(default, rename = "memory_size_MiB")]
    memory_size_mib: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VmInfo {
    #[serde(default)]
    disks: HashMap<String, DiskInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct DiskInfo {
    #[serde(default)]
    capacity: u64,
}

#[derive(Debug, Default, Deserialize)]
struct GuestIdentity {
    #[serde(default)]
    ip_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Filesystem {
    #[serde(default)]
    capacity: u64,
    #[serde(default)]
    free_space: u64,
}

/// `VirtualMachineSummary` from VI/JSON, only the fields used here
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VimSummary {
    #[serde(default)]
    config: VimConfigSummary,
    #[serde(default)]
    quick_stats: QuickStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VimConfigSummary {
    /// MB
    #[serde(default)]
    memory_reservation: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuickStats {
    /// MHz
    #[serde(default)]
    overall_cpu_usage: Option<u64>,
    #[serde(default)]
    overall_cpu_demand: Option<u64>,
    /// MB
    #[serde(default)]
    guest_memory_usage: Option<u64>,
    #[serde(default)]
    uptime_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectId {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Serialize)]
struct AttachedQuery<'a> {
    object_ids: &'a [ObjectId],
}

#[derive(Debug, Deserialize)]
struct Attached {
    object_id: ObjectId,
    #[serde(default)]
    tag_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    category_id: String,
}

#[derive(Debug, Deserialize)]
struct CategoryModel {
    name: String,
}

/// everything fetched for one VM beyond its summary
#[derive(Debug, Default)]
struct Detail {
    info: VmInfo,
    identity: Option<GuestIdentity>,
    filesystems: HashMap<String, Filesystem>,
    stats: Option<VimSummary>,
}

/// authenticated handle shared by concurrent requests
#[derive(Clone)]
struct Api {
    http: Client,
    base: Arc<str>,
    token: Arc<str>,
    vim_release: Arc<str>,
}

impl Api {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .header(SESSION_HEADER, &*self.token)
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(VoomError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(self.request(Method::GET, path), path).await
    }

    /// like `get`, but a failure only means the data is unavailable
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.get(path).await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(path, error = %e, "optional lookup failed");
                None
            }
        }
    }

    async fn detail(&self, vm: &VmSummary) -> Result<Detail> {
        let info = self.get(&format!("/api/vcenter/vm/{}", vm.vm)).await?;
        if !is_on(&vm.power_state) {
            return Ok(Detail {
                info,
                ..Default::default()
            });
        }

        let identity = self
            .get_optional(&format!("/api/vcenter/vm/{}/guest/identity", vm.vm))
            .await;
        let filesystems = self
            .get_optional(&format!("/api/vcenter/vm/{}/guest/local-filesystem", vm.vm))
            .await
            .unwrap_or_default();
        let stats = self
            .get_optional(&format!(
                "/sdk/vim25/{}/VirtualMachine/{}/summary",
                self.vim_release, vm.vm
            ))
            .await;
        if stats.is_none() {
            warn!(vm = %vm.name, "no quick stats from vCenter, cpu and memory usage will read 0");
        }
        Ok(Detail {
            info,
            identity,
            filesystems,
            stats,
        })
    }
}

fn is_on(power_state: &str) -> bool {
    power_state == "POWERED_ON"
}

fn validate_url(url: &str) -> Result<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(VoomError::InvalidUrl {
            url: url.to_string(),
            msg: "must start with http:// or https://".into(),
        })
    }
}

/// fold one VM's summary, detail and tags into a record
fn to_vm(summary: &VmSummary, detail: Detail, tags: BTreeMap<String, String>) -> Vm {
    let disk_allocated = detail.info.disks.values().map(|d| d.capacity).sum();
    let disk_free = detail.filesystems.values().map(|fs| fs.free_space).sum();
    let disk_used = detail
        .filesystems
        .values()
        .map(|fs| fs.capacity.saturating_sub(fs.free_space))
        .sum();

    let stats = detail.stats.unwrap_or_default();
    let quick = stats.quick_stats;

    Vm {
        id: summary.name.clone(),
        on: is_on(&summary.power_state),
        ip: detail.identity.and_then(|i| i.ip_address),
        uptime: quick.uptime_seconds.unwrap_or(0),
        cpus: summary.cpu_count.unwrap_or(0),
        cpu_usage: quick.overall_cpu_usage.unwrap_or(0),
        cpu_demand: quick.overall_cpu_demand.unwrap_or(0),
        memory_allocated: summary.memory_size_mib.unwrap_or(0),
        memory_reserved: stats.config.memory_reservation.unwrap_or(0),
        memory_used: quick.guest_memory_usage.unwrap_or(0),
        disk_allocated,
        disk_used,
        disk_free,
        tags,
    }
}

/// category name to tag name per VM id.
///
/// a category allowing several tags per object keeps the first one seen.
fn tags_by_vm(
    attached: Vec<Attached>,
    tag_models: &HashMap<String, TagModel>,
    categories: &HashMap<String, String>,
) -> HashMap<String, BTreeMap<String, String>> {
    let mut out: HashMap<String, BTreeMap<String, String>> = HashMap::new();
    for a in attached {
        let vm_tags = out.entry(a.object_id.id.clone()).or_default();
        for tag_id in &a.tag_ids {
            let Some(tag) = tag_models.get(tag_id) else {
                continue;
            };
            let Some(category) = categories.get(&tag.category_id) else {
                continue;
            };
            match vm_tags.get(category) {
                Some(kept) if kept != &tag.name => {
                    warn!(
                        vm = %a.object_id.id,
                        category = %category,
                        kept = %kept,
                        ignored = %tag.name,
                        "vm has more than one {} tag", category
                    );
                }
                Some(_) => {}
                None => {
                    vm_tags.insert(category.clone(), tag.name.clone());
                }
            }
        }
    }
    out
}

pub struct Vcenter {
    api: Api,
    concurrency: usize,
}

impl Vcenter {
    /// open an API session
    pub async fn connect(cfg: &VcenterConfig) -> Result<Self> {
        let base: Arc<str> = validate_url(&cfg.url)?.into();
        let http = Client::builder()
            .danger_accept_invalid_certs(cfg.insecure)
            .build()?;

        info!(url = %base, user = %cfg.username, "connecting to vCenter");
        let path = "/api/session";
        let resp = http
            .post(format!("{}{}", base, path))
            .basic_auth(&cfg.username, Some(&cfg.password))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(VoomError::Status {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let token: String = serde_json::from_slice(&resp.bytes().await?)?;
        let vim_release = if cfg.vim_release.is_empty() {
            DEFAULT_VIM_RELEASE
        } else {
            cfg.vim_release.as_str()
        };

        Ok(Self {
            api: Api {
                http,
                base,
                token: token.into(),
                vim_release: vim_release.into(),
            },
            concurrency: cfg.concurrency.max(1),
        })
    }

    /// every VM visible to the session, in vCenter's listing order
    pub async fn vms(&self) -> Result<Vec<Vm>> {
        let summaries: Vec<VmSummary> = self.api.get("/api/vcenter/vm").await?;
        info!(count = summaries.len(), "retrieved VM list");

        let mut tags = self.tags(&summaries).await?;
        let details = self.details(&summaries).await?;

        let vms = summaries
            .iter()
            .zip(details)
            .map(|(s, d)| to_vm(s, d, tags.remove(&s.vm).unwrap_or_default()))
            .collect();
        Ok(vms)
    }

    async fn details(&self, summaries: &[VmSummary]) -> Result<Vec<Detail>> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (i, s) in summaries.iter().enumerate() {
            let api = self.api.clone();
            let permits = permits.clone();
            let summary = s.clone();
            set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                debug!(vm = %summary.vm, name = %summary.name, "fetching detail");
                (i, api.detail(&summary).await)
            });
        }

        let mut out: Vec<Detail> = summaries.iter().map(|_| Detail::default()).collect();
        while let Some(joined) = set.join_next().await {
            let (i, detail) = joined?;
            match detail {
                Ok(d) => out[i] = d,
                // the VM may have been deleted between listing and lookup
                Err(VoomError::Status { status: 404, path }) => {
                    warn!(path, "vm disappeared during retrieval");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// tag key (category name) to tag name, per vCenter VM id
    async fn tags(
        &self,
        summaries: &[VmSummary],
    ) -> Result<HashMap<String, BTreeMap<String, String>>> {
        if summaries.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<ObjectId> = summaries
            .iter()
            .map(|s| ObjectId {
                kind: "VirtualMachine".into(),
                id: s.vm.clone(),
            })
            .collect();
        let path = "/api/cis/tagging/tag-association?action=list-attached-tags-on-objects";
        let req = self
            .api
            .request(Method::POST, path)
            .json(&AttachedQuery { object_ids: &ids });
        let attached: Vec<Attached> = self.api.call(req, path).await?;

        let wanted: HashSet<&str> = attached
            .iter()
            .flat_map(|a| a.tag_ids.iter().map(String::as_str))
            .collect();
        let mut tag_models = HashMap::new();
        let mut categories: HashMap<String, String> = HashMap::new();
        for tag_id in wanted {
            let tag: TagModel = self.api.get(&format!("/api/cis/tagging/tag/{}", tag_id)).await?;
            if !categories.contains_key(&tag.category_id) {
                let cat: CategoryModel = self
                    .api
                    .get(&format!("/api/cis/tagging/category/{}", tag.category_id))
                    .await?;
                categories.insert(tag.category_id.clone(), cat.name);
            }
            tag_models.insert(tag_id.to_string(), tag);
        }
        debug!(
            tags = tag_models.len(),
            categories = categories.len(),
            "resolved tags"
        );

        Ok(tags_by_vm(attached, &tag_models, &categories))
    }

    /// end the API session
    pub async fn logout(&self) -> Result<()> {
        let path = "/api/session";
        let resp = self.api.request(Method::DELETE, path).send().await?;
        if !resp.status().is_success() {
            return Err(VoomError::Status {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}
