//! Local-first synchronization with a remote document store.
//!
//! Local mutations never wait on the remote. The store announces them as
//! events; [`SyncCoordinator::run`] pushes them in the background and pulls
//! periodically. A full sync is pull, last-write-wins merge, then push of
//! everything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::note::Note;
use crate::store::StoreEvent;
use crate::workspace::SharedWorkspace;

pub const DEFAULT_SYNC_MINUTES: u64 = 5;

/// Per-note push failures from a bulk push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: Vec<(String, String)>,
}

/// The remote half of sync. Documents are loosely typed JSON so that
/// malformed remote records can be skipped instead of failing a pull.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn pull_all(&self) -> Result<Vec<serde_json::Value>>;

    async fn push(&self, note: &Note) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn push_all(&self, notes: &[Note]) -> Result<PushReport> {
        let mut report = PushReport::default();
        for note in notes {
            match self.push(note).await {
                Ok(()) => report.pushed += 1,
                Err(e) => report.failed.push((note.id.clone(), e.to_string())),
            }
        }
        Ok(report)
    }
}

/// A directory of `<id>.json` documents, e.g. a folder kept in step by a
/// file-sync service.
pub struct DirRemote {
    dir: PathBuf,
}

impl DirRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> Result<PathBuf> {
        let unsafe_id = id.is_empty()
            || id.starts_with('.')
            || id.contains(['/', '\\', '\0']);
        if unsafe_id {
            return Err(Error::sync(format!(
                "note id {id:?} is not a valid document name"
            )));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl RemoteStore for DirRemote {
    async fn pull_all(&self) -> Result<Vec<serde_json::Value>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::sync(format!(
                    "cannot read {}: {e}",
                    self.dir.display()
                )));
            }
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::sync(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable remote document {}: {e}",
                        path.display()
                    );
                    continue;
                }
            };
            match serde_json::from_str(&raw) {
                Ok(doc) => docs.push(doc),
                Err(e) => tracing::warn!(
                    "Skipping invalid remote document {}: {e}",
                    path.display()
                ),
            }
        }
        Ok(docs)
    }

    async fn push(&self, note: &Note) -> Result<()> {
        let path = self.document_path(&note.id)?;
        let raw = serde_json::to_string_pretty(note)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::sync(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| Error::sync(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::sync(e.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.document_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::sync(e.to_string())),
        }
    }
}

/// In-process remote for tests and offline sessions. Can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    docs: Mutex<BTreeMap<String, serde_json::Value>>,
    failing: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store a raw document, keyed by its `id` field when it has one.
    pub fn insert_raw(&self, doc: serde_json::Value) {
        let key = doc
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("__anon{}", self.len()));
        if let Ok(mut docs) = self.docs.lock() {
            docs.insert(key, doc);
        }
    }

    pub fn get(&self, id: &str) -> Option<serde_json::Value> {
        self.docs.lock().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::sync("remote unavailable"))
        } else {
            Ok(())
        }
    }

    fn docs(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, serde_json::Value>>> {
        self.docs.lock().map_err(|e| Error::sync(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn pull_all(&self) -> Result<Vec<serde_json::Value>> {
        self.check()?;
        Ok(self.docs()?.values().cloned().collect())
    }

    async fn push(&self, note: &Note) -> Result<()> {
        self.check()?;
        let doc = serde_json::to_value(note)?;
        self.docs()?.insert(note.id.clone(), doc);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check()?;
        self.docs()?.remove(id);
        Ok(())
    }
}

/// What started a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Manual,
    Startup,
    Periodic,
    Enabled,
    Import,
}

impl SyncTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Startup => "startup",
            SyncTrigger::Periodic => "periodic",
            SyncTrigger::Enabled => "enabled",
            SyncTrigger::Import => "import",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Synced {
        inserted: usize,
        updated: usize,
        skipped: usize,
        pushed: usize,
        failed: usize,
    },
    /// Another sync was already running.
    Skipped,
    Disabled,
    Failed(String),
}

/// Clears the in-flight flag however the sync ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncCoordinator {
    workspace: SharedWorkspace,
    remote: Arc<dyn RemoteStore>,
    syncing: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl SyncCoordinator {
    pub fn new(workspace: SharedWorkspace, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            workspace,
            remote,
            syncing: AtomicBool::new(false),
            last_sync: Mutex::new(None),
        }
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync.lock().ok().and_then(|t| *t)
    }

    async fn enabled(&self) -> bool {
        self.workspace.lock().await.store().sync_enabled()
    }

    /// Reload, pull, merge, push. Reloading first means notes other
    /// processes saved are pushed and merged rather than overwritten.
    /// Failures are logged and reported, never raised; the next trigger is
    /// the retry.
    pub async fn sync_now(&self, trigger: SyncTrigger) -> SyncStatus {
        let enabled = {
            let mut ws = self.workspace.lock().await;
            ws.reload();
            ws.store().sync_enabled()
        };
        if !enabled {
            return SyncStatus::Disabled;
        }
        if self.syncing.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                trigger = trigger.as_str(),
                "sync already running, skipping"
            );
            return SyncStatus::Skipped;
        }
        let _guard = InFlight(&self.syncing);
        tracing::debug!(trigger = trigger.as_str(), "sync started");

        let remote_docs = match self.remote.pull_all().await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!("Sync pull failed: {e}");
                return SyncStatus::Failed(e.to_string());
            }
        };

        // Merge and snapshot under one lock so no local edit slips between.
        let (merged, notes) = {
            let mut ws = self.workspace.lock().await;
            ws.reload();
            let merged = ws.merge_remote(remote_docs);
            (merged, ws.store().get_all())
        };

        let pushed = match self.remote.push_all(&notes).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Sync push failed: {e}");
                return SyncStatus::Failed(e.to_string());
            }
        };
        for (id, reason) in &pushed.failed {
            tracing::warn!(id = %id, "Failed to push note: {reason}");
        }

        if let Ok(mut last) = self.last_sync.lock() {
            *last = Some(Utc::now());
        }
        tracing::debug!(
            trigger = trigger.as_str(),
            pushed = pushed.pushed,
            "sync finished"
        );
        SyncStatus::Synced {
            inserted: merged.inserted.len(),
            updated: merged.updated.len(),
            skipped: merged.skipped,
            pushed: pushed.pushed,
            failed: pushed.failed.len(),
        }
    }

    /// Forward one local mutation to the remote. Failures are logged only.
    pub async fn handle_event(&self, event: StoreEvent) {
        if !self.enabled().await {
            return;
        }
        let result = match &event {
            StoreEvent::Added(note) | StoreEvent::Updated(note) => {
                self.remote.push(note).await
            }
            StoreEvent::Deleted(id) => self.remote.delete(id).await,
            StoreEvent::Replaced => {
                self.sync_now(SyncTrigger::Import).await;
                Ok(())
            }
            StoreEvent::Merged { .. } => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!("Background push failed: {e}");
        }
    }

    /// Sync once, then forward events and sync every `interval` until the
    /// event channel closes.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<StoreEvent>,
        interval: Duration,
    ) {
        self.sync_now(SyncTrigger::Startup).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("store closed, stopping sync loop");
                        break;
                    };
                    self.handle_event(event).await;
                }
                _ = ticker.tick() => {
                    self.sync_now(SyncTrigger::Periodic).await;
                }
            }
        }
    }
}
