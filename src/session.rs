use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cli::ConnectArgs;
use crate::error::{Result, VoomError};
use crate::vcenter::{Vcenter, VcenterConfig};
use crate::vm::{Dump, Vm};

/// where VMs come from for one command
enum Source {
    /// a previous `voom dump`, or stdin for "-"
    File(PathBuf),
    Vcenter(Vcenter),
}

pub struct Session {
    source: Source,
}

impl Session {
    /// pick the inventory source from the connection args, logging in if needed
    pub async fn open(args: &ConnectArgs) -> Result<Self> {
        if let Some(path) = &args.from {
            info!(path = %path.display(), "reading VMs from dump");
            return Ok(Self {
                source: Source::File(path.clone()),
            });
        }

        let cfg = VcenterConfig {
            url: args.url.clone().ok_or(VoomError::MissingConfig("--url / $VOOM_URL"))?,
            username: args
                .username
                .clone()
                .ok_or(VoomError::MissingConfig("--username / $VOOM_USERNAME"))?,
            password: args
                .password
                .clone()
                .ok_or(VoomError::MissingConfig("--password / $VOOM_PASSWORD"))?,
            insecure: args.insecure,
            concurrency: args.concurrency,
            vim_release: args.vim_release.clone(),
        };
        Ok(Self {
            source: Source::Vcenter(Vcenter::connect(&cfg).await?),
        })
    }

    /// retrieve every VM once
    pub async fn vms(&self) -> Result<Vec<Vm>> {
        match &self.source {
            Source::File(path) => read_dump(path),
            Source::Vcenter(vc) => vc.vms().await,
        }
    }

    /// retrieve every VM, then close the session whether or not that worked
    pub async fn fetch(self) -> Result<Vec<Vm>> {
        let vms = self.vms().await;
        self.close().await;
        vms
    }

    /// release the remote session, if any
    pub async fn close(self) {
        if let Source::Vcenter(vc) = &self.source {
            if let Err(e) = vc.logout().await {
                warn!(error = %e, "failed to log out of vCenter");
            }
        }
    }
}

/// parse a `voom dump` document from a file, or stdin for "-"
pub fn read_dump(path: &Path) -> Result<Vec<Vm>> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    let dump: Dump = serde_json::from_str(&raw)?;
    Ok(dump.vms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_dump_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"vms":[{{"id":"a","on":true,"cpus":2,"tags":{{"director":"d"}}}},{{"id":"b"}}]}}"#
        )
        .unwrap();

        let vms = read_dump(f.path()).unwrap();
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].tag("director"), "d");
        assert!(!vms[1].on);
    }

    #[test]
    fn malformed_dump_is_decode_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "not json").unwrap();
        assert!(matches!(read_dump(f.path()), Err(VoomError::Decode(_))));
    }

    #[test]
    fn missing_dump_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(read_dump(&missing), Err(VoomError::Io(_))));
    }

    #[tokio::test]
    async fn vcenter_requires_url() {
        let args = ConnectArgs {
            concurrency: 1,
            ..Default::default()
        };
        let err = Session::open(&args).await.err().unwrap();
        assert!(matches!(err, VoomError::MissingConfig(_)));
    }

    #[tokio::test]
    async fn from_file_needs_no_credentials() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"vms":[]}}"#).unwrap();
        let args = ConnectArgs {
            from: Some(f.path().to_path_buf()),
            ..Default::default()
        };
        let session = Session::open(&args).await.unwrap();
        assert!(session.fetch().await.unwrap().is_empty());
    }
}
