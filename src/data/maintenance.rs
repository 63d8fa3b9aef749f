//! Periodic record maintenance: rotation, backup and retention.
//!
//! Every cycle rotates each device's log to a fresh timestamped file, copies the closed
//! files under `storage.backup_dir` when one is configured, and deletes logs older than
//! `storage.retention()` from `storage.record_dir`.

use super::storage::{backup_file, remove_expired, DeviceRecorders};
use crate::config::StorageConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest accepted rotation period.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Outcome of one maintenance cycle.
#[derive(Debug, Default)]
pub struct MaintenanceReport {
    /// `(device, closed path)` for every rotated store.
    pub rotated: Vec<(String, PathBuf)>,
    /// Backup copies written.
    pub backed_up: Vec<PathBuf>,
    /// Expired logs deleted.
    pub removed: Vec<PathBuf>,
}

/// Rotate every device, back up the closed files and apply retention.
///
/// Failures are logged per file; a bad device or backup never stops the cycle.
pub fn maintain(recorders: &DeviceRecorders, storage: &StorageConfig) -> MaintenanceReport {
    let rotated = recorders.rotate_all();

    let mut backed_up = Vec::new();
    if let Some(root) = &storage.backup_dir {
        for (device, path) in &rotated {
            match backup_file(path, root) {
                Ok(copy) => backed_up.push(copy),
                Err(e) => {
                    warn!(device = %device, path = %path.display(), error = %e, "backup failed")
                }
            }
        }
    }

    let removed = match storage.retention() {
        Some(max_age) => prune(&storage.record_dir, max_age),
        None => Vec::new(),
    };

    MaintenanceReport {
        rotated,
        backed_up,
        removed,
    }
}

/// Delete expired logs under `record_dir`, logging instead of failing.
pub fn prune(record_dir: &std::path::Path, max_age: Duration) -> Vec<PathBuf> {
    if !record_dir.is_dir() {
        debug!(dir = %record_dir.display(), "no record directory to prune");
        return Vec::new();
    }
    remove_expired(record_dir, max_age).unwrap_or_else(|e| {
        warn!(dir = %record_dir.display(), error = %e, "retention pass failed");
        Vec::new()
    })
}

/// Run [`maintain`] every `storage.rotation_interval()` until `shutdown` fires or its
/// sender is dropped. Returns the number of completed cycles.
pub async fn run_maintenance(
    recorders: Arc<DeviceRecorders>,
    storage: StorageConfig,
    mut shutdown: oneshot::Receiver<()>,
) -> u64 {
    let period = storage.rotation_interval().max(MIN_PERIOD);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = maintain(&recorders, &storage);
                debug!(
                    rotated = report.rotated.len(),
                    backed_up = report.backed_up.len(),
                    removed = report.removed.len(),
                    "maintenance cycle"
                );
                cycles += 1;
            }
            _ = &mut shutdown => {
                info!(cycles, "maintenance stopped");
                return cycles;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BusMessage;
    use crate::data::replay::read_all;
    use std::fs;

    fn storage(root: &std::path::Path) -> StorageConfig {
        StorageConfig {
            record_dir: root.join("records"),
            backup_dir: Some(root.join("backup")),
            rotation_interval_secs: 60,
            retention_hours: 0,
        }
    }

    #[test]
    fn cycle_rotates_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let recorders = DeviceRecorders::new(&storage.record_dir);
        recorders
            .record(&BusMessage::new("aa:bb/g/acc02", vec![1, 2], 5))
            .unwrap();

        let report = maintain(&recorders, &storage);
        assert_eq!(report.rotated.len(), 1);
        assert_eq!(report.backed_up.len(), 1);
        assert!(report.removed.is_empty());

        let copy = &report.backed_up[0];
        assert!(copy.starts_with(dir.path().join("backup").join("aa_bb")));
        assert_eq!(read_all(copy).unwrap().len(), 1);
    }

    #[test]
    fn retention_prunes_only_expired_logs() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = storage(dir.path());
        storage.backup_dir = None;
        storage.retention_hours = 1;
        let old = storage.record_dir.join("dev").join("old.dat");
        fs::create_dir_all(old.parent().unwrap()).unwrap();
        fs::write(&old, b"").unwrap();

        let recorders = DeviceRecorders::new(&storage.record_dir);
        let report = maintain(&recorders, &storage);
        assert!(report.backed_up.is_empty());
        // Fresh files are inside the retention window.
        assert!(report.removed.is_empty());
        assert!(old.exists());

        assert_eq!(prune(&storage.record_dir, Duration::ZERO), vec![old.clone()]);
        assert!(prune(&dir.path().join("absent"), Duration::ZERO).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_once_per_interval_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let recorders = Arc::new(DeviceRecorders::new(&storage.record_dir));
        recorders
            .record(&BusMessage::new("aa:bb/g/clk01", vec![7], 1))
            .unwrap();

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(run_maintenance(Arc::clone(&recorders), storage, rx));
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), 2);
        assert!(dir.path().join("backup").join("aa_bb").is_dir());
    }
}
