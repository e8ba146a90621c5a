//! Cluster-state reload loop.
//!
//! Re-reads the state file on an interval and publishes a new snapshot
//! whenever the document's version differs from the published one. A file
//! that fails to load is logged and skipped; the last good state stays in
//! place. Reads and parsing run on the blocking pool.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use allocview_routing::{ClusterStateDocument, SnapshotHolder};

#[derive(Clone)]
pub struct StateReloader {
    path: PathBuf,
    holder: SnapshotHolder,
    interval: Duration,
}

impl StateReloader {
    pub fn new(path: PathBuf, holder: SnapshotHolder, interval: Duration) -> Self {
        Self {
            path,
            holder,
            interval,
        }
    }

    /// Load the file once. Returns the newly published version, or `None`
    /// when the file still carries the published version.
    pub fn reload_once(&self) -> anyhow::Result<Option<u64>> {
        let document = ClusterStateDocument::from_file(&self.path)?;
        let published = self.holder.current().snapshot().version();
        if document.version == published {
            debug!(version = published, "cluster state unchanged");
            return Ok(None);
        }

        let state = document.into_cluster_state()?;
        let version = state.snapshot().version();
        self.holder.publish(state);
        Ok(Some(version))
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            path = %self.path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "cluster state reloader started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let reloader = self.clone();
                    match tokio::task::spawn_blocking(move || reloader.reload_once()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            warn!(error = %e, path = %self.path.display(), "cluster state reload failed");
                        }
                        Err(e) => {
                            warn!(error = %e, "cluster state reload task failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("cluster state reloader shutting down");
                    break;
                }
            }
        }
    }
}
