//! Announcement store: a cached view of the announcement directory.
//!
//! A background task rescans the directory on a short interval. Each pass
//! holds the pass lock exclusively; purges triggered by failed calls hold it
//! shared, so a purge never interleaves with a rebuild but purges do not wait
//! on each other. Lookups take no pass lock at all and may observe an entry a
//! concurrent pass is about to replace.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LocalInterceptConfig;
use crate::domain::announcement::Announcement;
use crate::domain::error::StoreError;

/// Changes applied by one scan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub added: usize,
    pub replaced: usize,
    pub pruned: usize,
}

impl ScanReport {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.replaced == 0 && self.pruned == 0
    }
}

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cached announcements keyed by file name.
pub struct AnnouncementStore {
    dir: PathBuf,
    scan_interval: Duration,
    create_dir: bool,
    announcements: DashMap<String, Announcement>,
    pass_lock: RwLock<()>,
    task: Mutex<Option<ScanTask>>,
}

impl AnnouncementStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, scan_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            scan_interval,
            create_dir: true,
            announcements: DashMap::new(),
            pass_lock: RwLock::new(()),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &LocalInterceptConfig) -> Self {
        let mut store = Self::new(cfg.announce_dir.clone(), cfg.scan_interval);
        store.create_dir = cfg.create_dir;
        store
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.announcements.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.announcements.len()
    }

    /// Snapshot of the cached announcement for `file`.
    #[must_use]
    pub fn get(&self, file: &str) -> Option<Announcement> {
        self.announcements.get(file).map(|a| a.value().clone())
    }

    /// File name of the first cached announcement covering `service_key`.
    #[must_use]
    pub fn lookup_match(&self, service_key: &str) -> Option<String> {
        self.announcements
            .iter()
            .find(|entry| entry.value().matches(service_key))
            .map(|entry| entry.key().clone())
    }

    /// Run one scan pass.
    ///
    /// New files and files whose modification time changed are (re)parsed,
    /// entries for vanished files are pruned. Nothing is applied unless the
    /// whole directory could be read. A missing directory holds no
    /// announcements, so every cached entry is pruned.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the directory or one of its files cannot be read.
    pub fn scan(&self) -> Result<ScanReport, StoreError> {
        let _pass = self.pass_lock.write();

        if !self.dir.is_dir() {
            let pruned = self.announcements.len();
            self.announcements.clear();
            return Ok(ScanReport {
                pruned,
                ..ScanReport::default()
            });
        }

        let mut seen = HashSet::new();
        let mut staged = Vec::new();
        let listing = std::fs::read_dir(&self.dir).map_err(|e| StoreError::list_dir(&self.dir, e))?;
        for entry in listing {
            let path = entry.map_err(|e| StoreError::list_dir(&self.dir, e))?.path();
            let meta = std::fs::metadata(&path).map_err(|e| StoreError::read_file(&path, e))?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let modified = meta.modified().map_err(|e| StoreError::read_file(&path, e))?;

            let unchanged = self
                .announcements
                .get(&name)
                .is_some_and(|cached| cached.modified == modified);
            if !unchanged {
                let raw = std::fs::read(&path).map_err(|e| StoreError::read_file(&path, e))?;
                let text = String::from_utf8_lossy(&raw);
                staged.push(Announcement::parse(name.clone(), modified, &text));
            }
            seen.insert(name);
        }

        let mut report = ScanReport::default();
        for announcement in staged {
            debug!(
                file = %announcement.file,
                entries = announcement.entries.len(),
                "loaded announcement"
            );
            if self
                .announcements
                .insert(announcement.file.clone(), announcement)
                .is_some()
            {
                report.replaced += 1;
            } else {
                report.added += 1;
            }
        }
        self.announcements.retain(|name, _| {
            let keep = seen.contains(name);
            if !keep {
                report.pruned += 1;
            }
            keep
        });

        Ok(report)
    }

    /// Drop the announcement for `file` and delete its backing file.
    ///
    /// Idempotent. Returns whether a cached entry was removed. A file that
    /// cannot be deleted is left for manual cleanup.
    #[must_use]
    pub fn purge(&self, file: &str) -> bool {
        let _purge = self.pass_lock.read();

        let removed = self.announcements.remove(file).is_some();
        let path = self.dir.join(file);
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "removed stale announcement file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "announcement file already gone");
            }
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "failed to delete stale announcement file, remove it manually"
            ),
        }
        removed
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start the periodic scan task on the current Tokio runtime.
    ///
    /// Does nothing if the task is already running. The task stops on
    /// [`stop`](Self::stop) or once the store is dropped.
    ///
    /// # Errors
    /// Returns [`StoreError::ZeroInterval`] for a zero scan interval and
    /// [`StoreError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), StoreError> {
        if self.scan_interval.is_zero() {
            return Err(StoreError::ZeroInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }
        if self.create_dir {
            self.ensure_dir();
        }

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_scan_loop(
            Arc::downgrade(self),
            self.scan_interval,
            cancel.clone(),
        ));
        *task = Some(ScanTask { cancel, handle });
        info!(
            dir = %self.dir.display(),
            interval = %humantime::format_duration(self.scan_interval),
            "announcement scan started"
        );
        Ok(())
    }

    /// Stop the scan task and wait for it to finish.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "announcement scan task ended abnormally");
            }
        }
    }

    fn ensure_dir(&self) {
        if self.dir.exists() {
            return;
        }
        match std::fs::create_dir_all(&self.dir) {
            Ok(()) => info!(dir = %self.dir.display(), "created announcement directory"),
            Err(e) => warn!(
                dir = %self.dir.display(),
                error = %e,
                "failed to create announcement directory"
            ),
        }
    }
}

impl Drop for AnnouncementStore {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

async fn run_scan_loop(store: Weak<AnnouncementStore>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_error: Option<String> = None;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("announcement scan task shutting down");
                break;
            }
            _ = interval.tick() => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                let outcome = tokio::task::spawn_blocking(move || store.scan()).await;
                match outcome {
                    Ok(Ok(report)) => {
                        if last_error.take().is_some() {
                            info!("announcement scan recovered");
                        }
                        if !report.is_unchanged() {
                            info!(
                                added = report.added,
                                replaced = report.replaced,
                                pruned = report.pruned,
                                "announcements refreshed"
                            );
                        }
                    }
                    Ok(Err(e)) => {
                        let message = e.to_string();
                        if last_error.as_deref() == Some(message.as_str()) {
                            debug!(error = %message, "announcement scan still failing");
                        } else {
                            warn!(error = %message, "announcement scan failed, retrying next tick");
                            last_error = Some(message);
                        }
                    }
                    Err(e) => warn!(error = %e, "announcement scan pass panicked"),
                }
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn missing_directory_scans_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AnnouncementStore::new(tmp.path().join("absent"), Duration::from_millis(10));

        assert_eq!(store.scan().unwrap(), ScanReport::default());
        assert!(store.is_empty());
    }

    #[test]
    fn scan_adds_and_prunes() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "orders.properties", "com.example.OrderService$20880=orderBean\n");
        let store = AnnouncementStore::new(tmp.path(), Duration::from_millis(10));

        let report = store.scan().unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(store.lookup_match("orderBean").as_deref(), Some("orders.properties"));

        std::fs::remove_file(tmp.path().join("orders.properties")).unwrap();
        let report = store.scan().unwrap();
        assert_eq!(report.pruned, 1);
        assert!(store.is_empty());
        assert_eq!(store.lookup_match("orderBean"), None);
    }

    #[test]
    fn removed_directory_prunes_every_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("barrier");
        std::fs::create_dir(&dir).unwrap();
        write(&dir, "orders.properties", "com.example.OrderService$20880=orderBean\n");
        let store = AnnouncementStore::new(&dir, Duration::from_millis(10));
        store.scan().unwrap();
        assert_eq!(store.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
        let report = store.scan().unwrap();

        assert_eq!(report.pruned, 1);
        assert!(store.is_empty());
        assert_eq!(store.lookup_match("com.example.OrderService"), None);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entry_skips_the_whole_pass() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "orders.properties", "com.example.OrderService$20880=orderBean\n");
        let store = AnnouncementStore::new(tmp.path(), Duration::from_millis(10));
        store.scan().unwrap();

        std::fs::remove_file(tmp.path().join("orders.properties")).unwrap();
        write(tmp.path(), "users.properties", "com.example.UserService$20881=userBean\n");
        std::os::unix::fs::symlink(tmp.path().join("missing"), tmp.path().join("dangling")).unwrap();

        let err = store.scan().unwrap_err();

        assert!(matches!(err, StoreError::ReadFile { .. }), "{err}");
        assert_eq!(store.len(), 1);
        assert!(store.get("orders.properties").is_some());
        assert_eq!(store.lookup_match("com.example.UserService"), None);
    }

    #[test]
    fn subdirectories_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        let store = AnnouncementStore::new(tmp.path(), Duration::from_millis(10));

        assert!(store.scan().unwrap().is_unchanged());
        assert!(store.is_empty());
    }

    #[test]
    fn purge_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "orders.properties", "a$1=orderBean\n");
        let store = AnnouncementStore::new(tmp.path(), Duration::from_millis(10));
        store.scan().unwrap();

        assert!(store.purge("orders.properties"));
        assert!(!tmp.path().join("orders.properties").exists());
        assert!(!store.purge("orders.properties"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_interval_is_rejected_on_start() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(AnnouncementStore::new(tmp.path(), Duration::ZERO));

        assert!(matches!(store.start(), Err(StoreError::ZeroInterval)));
        assert!(!store.is_running());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let store = Arc::new(AnnouncementStore::new("/nonexistent", Duration::from_millis(10)));
        assert!(matches!(store.start(), Err(StoreError::NoRuntime)));
    }
}
