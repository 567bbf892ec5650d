//! The durable note collection.
//!
//! `NoteStore` owns every note, persists the whole collection after each
//! mutation and announces successful mutations as [`StoreEvent`]s. It knows
//! nothing about sync or recommendation weights; subscribers do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::markers::{DueMarker, Markers};
use crate::note::{self, Note, Progress};

pub const EXPORT_VERSION: u64 = 1;
pub const STATE_FILE: &str = "notes.json";

/// Fields for a new note; everything but the content has a default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    pub content: String,
    pub progress: Progress,
    pub due_date: Option<DateTime<Utc>>,
    pub important: bool,
}

impl NoteDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn due_date(mut self, due: Option<DateTime<Utc>>) -> Self {
        self.due_date = due;
        self
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// Draft built from editor text after marker extraction.
    pub fn from_markers(markers: &Markers) -> Self {
        Self::new(markers.text.clone())
            .due_date(markers.due_date())
            .important(markers.important)
    }
}

impl From<&str> for NoteDraft {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}

impl From<String> for NoteDraft {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}

/// Partial update. `None` leaves a field unchanged; for the due date,
/// `Some(None)` clears it and `Some(Some(dt))` sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub content: Option<String>,
    pub progress: Option<Progress>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub important: Option<bool>,
}

impl NotePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(Some(due));
        self
    }

    pub fn clear_due_date(mut self) -> Self {
        self.due_date = Some(None);
        self
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = Some(important);
        self
    }

    /// Patch for re-saved editor text: content always, due date and
    /// importance only when a marker says so.
    pub fn from_markers(markers: &Markers) -> Self {
        let patch = Self::new().content(markers.text.clone());
        let patch = match markers.due {
            DueMarker::Absent => patch,
            DueMarker::Clear => patch.clear_due_date(),
            DueMarker::Set(due) => patch.due_date(due),
        };
        if markers.important { patch.important(true) } else { patch }
    }

    fn apply(self, note: &mut Note) {
        if let Some(content) = self.content {
            note.content = content;
        }
        if let Some(progress) = self.progress {
            note.progress = progress;
        }
        if let Some(due) = self.due_date {
            note.due_date = due;
        }
        if let Some(important) = self.important {
            note.important = important;
        }
    }
}

/// Emitted after a mutation has been applied and persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(Note),
    Updated(Note),
    Deleted(String),
    /// The whole collection was replaced by an import.
    Replaced,
    Merged { changed: Vec<String> },
}

/// Outcome of folding remote records into the local collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || !self.updated.is_empty()
    }

    pub fn changed_ids(&self) -> Vec<String> {
        self.inserted.iter().chain(&self.updated).cloned().collect()
    }
}

/// Where the serialized state record lives.
pub trait Storage: Send {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, data: &str) -> io::Result<()>;
}

/// `notes.json` inside the notes directory, replaced atomically on save.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, data: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)
    }
}

/// Shared in-memory slot; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            data: Arc::new(Mutex::new(Some(data.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.data.lock().ok().and_then(|d| d.clone())
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> io::Result<Option<String>> {
        let guard = self
            .data
            .lock()
            .map_err(|e| io::Error::other(format!("storage lock poisoned: {e}")))?;
        Ok(guard.clone())
    }

    fn save(&self, data: &str) -> io::Result<()> {
        let mut guard = self
            .data
            .lock()
            .map_err(|e| io::Error::other(format!("storage lock poisoned: {e}")))?;
        *guard = Some(data.to_string());
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    sync_enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedStateRef<'a> {
    notes: &'a [Note],
    sync_enabled: bool,
}

#[derive(Serialize)]
struct ExportFileRef<'a> {
    notes: &'a [Note],
    version: u64,
}

/// Remote documents are loosely typed; `id` and `updatedAt` are checked by hand.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteRecord {
    id: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    progress: Progress,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    important: bool,
}

pub struct NoteStore {
    notes: Vec<Note>,
    sync_enabled: bool,
    storage: Box<dyn Storage>,
    /// Set while the last save failed; reloading would drop local edits.
    unsaved: bool,
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl NoteStore {
    /// Load state from `storage`. Unreadable or corrupted state is logged and
    /// replaced by an empty collection.
    pub fn open(storage: impl Storage + 'static) -> Self {
        let mut store = Self {
            notes: Vec::new(),
            sync_enabled: false,
            storage: Box::new(storage),
            unsaved: false,
            subscribers: Vec::new(),
        };
        if let Some(state) = read_state(store.storage.as_ref()) {
            store.notes = dedup_by_id(state.notes);
            store.sync_enabled = state.sync_enabled;
        }
        tracing::debug!(count = store.notes.len(), "note store opened");
        store
    }

    /// Pick up state saved by other processes since this store was opened.
    /// Returns whether the notes changed. Unreadable state, or a failed
    /// local save, leaves everything as is.
    pub fn reload(&mut self) -> bool {
        if self.unsaved {
            tracing::warn!("Local changes are not saved yet, skipping reload");
            return false;
        }
        let Some(state) = read_state(self.storage.as_ref()) else {
            return false;
        };
        self.sync_enabled = state.sync_enabled;
        let notes = dedup_by_id(state.notes);
        if notes == self.notes {
            return false;
        }
        self.notes = notes;
        tracing::debug!(count = self.notes.len(), "note store reloaded");
        true
    }

    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    /// Receive every mutation from now on. Dropped receivers are pruned.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn add(&mut self, draft: impl Into<NoteDraft>) -> Note {
        let draft = draft.into();
        let id = note::generate_id(|candidate| self.contains(candidate));
        let mut note = Note::new(id, draft.content);
        note.progress = draft.progress;
        note.due_date = draft.due_date;
        note.important = draft.important;

        self.notes.push(note.clone());
        self.persist();
        tracing::debug!(id = %note.id, "note added");
        self.emit(StoreEvent::Added(note.clone()));
        note
    }

    pub fn update(&mut self, id: &str, patch: NotePatch) -> Result<Note> {
        let note = self
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        patch.apply(note);
        note.touch();
        let updated = note.clone();

        self.persist();
        tracing::debug!(id, "note updated");
        self.emit(StoreEvent::Updated(updated.clone()));
        Ok(updated)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let Some(idx) = self.notes.iter().position(|n| n.id == id) else {
            return false;
        };
        self.notes.remove(idx);
        self.persist();
        tracing::debug!(id, "note deleted");
        self.emit(StoreEvent::Deleted(id.to_string()));
        true
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_by_id(id).is_some()
    }

    /// Snapshot in insertion order.
    pub fn get_all(&self) -> Vec<Note> {
        self.notes.clone()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn all_hashtags(&self) -> BTreeSet<String> {
        self.notes.iter().flat_map(Note::hashtags).collect()
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) {
        self.sync_enabled = enabled;
        self.persist();
    }

    /// Replace the whole collection from an export file. Nothing changes
    /// unless the payload is valid. Returns the number of imported notes.
    pub fn import_from(&mut self, data: &str) -> Result<usize> {
        let notes = parse_export(data)?;
        let count = notes.len();
        self.notes = notes;
        self.persist();
        tracing::debug!(count, "notes imported");
        self.emit(StoreEvent::Replaced);
        Ok(count)
    }

    pub fn export_to(&self) -> Result<String> {
        let file = ExportFileRef {
            notes: &self.notes,
            version: EXPORT_VERSION,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Last-write-wins merge of remote documents, per note. Records without
    /// an `id` or `updatedAt` are skipped.
    pub fn merge_remote(&mut self, records: Vec<serde_json::Value>) -> MergeReport {
        let mut report = MergeReport::default();
        for value in records {
            let record = match serde_json::from_value::<RemoteRecord>(value) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Skipping malformed remote note: {e}");
                    report.skipped += 1;
                    continue;
                }
            };
            let (Some(id), Some(updated_at)) = (record.id, record.updated_at)
            else {
                tracing::warn!("Skipping remote note without id or updatedAt");
                report.skipped += 1;
                continue;
            };
            let incoming = Note {
                id,
                content: record.content,
                progress: record.progress,
                due_date: record.due_date,
                important: record.important,
                created_at: record.created_at.unwrap_or(updated_at),
                updated_at,
            };

            match self.notes.iter_mut().find(|n| n.id == incoming.id) {
                Some(local) if incoming.updated_at > local.updated_at => {
                    report.updated.push(incoming.id.clone());
                    *local = incoming;
                }
                Some(_) => {}
                None => {
                    report.inserted.push(incoming.id.clone());
                    self.notes.push(incoming);
                }
            }
        }

        if report.changed() {
            self.persist();
            self.emit(StoreEvent::Merged {
                changed: report.changed_ids(),
            });
        }
        tracing::debug!(
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            skipped = report.skipped,
            "remote notes merged"
        );
        report
    }

    /// Persistence failures never fail the mutation; the in-memory state
    /// stays authoritative and the next successful save catches up.
    fn persist(&mut self) {
        let state = PersistedStateRef {
            notes: &self.notes,
            sync_enabled: self.sync_enabled,
        };
        let result = serde_json::to_string(&state)
            .map_err(io::Error::other)
            .and_then(|raw| self.storage.save(&raw));
        self.unsaved = result.is_err();
        if let Err(e) = result {
            tracing::error!("Failed to persist notes: {e}");
        }
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Decoded persisted state, or `None` when there is none or it cannot be
/// read. Corruption is logged.
fn read_state(storage: &dyn Storage) -> Option<PersistedState> {
    match storage.load() {
        Ok(Some(raw)) => match serde_json::from_str::<PersistedState>(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Stored notes are corrupted, ignoring them: {e}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Could not read stored notes: {e}");
            None
        }
    }
}

/// Validate and decode an export payload: an object with a `notes` array and,
/// optionally, `version: 1`.
fn parse_export(data: &str) -> Result<Vec<Note>> {
    let mut value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| Error::invalid_import(format!("not JSON: {e}")))?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| Error::invalid_import("expected a JSON object"))?;

    if let Some(version) = obj.get("version") {
        if version.as_u64() != Some(EXPORT_VERSION) {
            return Err(Error::invalid_import(format!(
                "unsupported version {version}"
            )));
        }
    }

    let notes = obj
        .remove("notes")
        .filter(serde_json::Value::is_array)
        .ok_or_else(|| Error::invalid_import("missing notes array"))?;
    let notes: Vec<Note> = serde_json::from_value(notes)
        .map_err(|e| Error::invalid_import(format!("bad note record: {e}")))?;

    let mut seen = HashSet::new();
    if let Some(dup) = notes.iter().find(|n| !seen.insert(n.id.as_str())) {
        return Err(Error::invalid_import(format!("duplicate note id {}", dup.id)));
    }
    Ok(notes)
}

fn dedup_by_id(notes: Vec<Note>) -> Vec<Note> {
    let mut seen = HashSet::new();
    notes.into_iter().filter(|n| seen.insert(n.id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_add_defaults() {
        let mut store = NoteStore::in_memory();
        let note = store.add("hello #world");
        assert_eq!(note.progress, Progress::NotStarted);
        assert_eq!(note.due_date, None);
        assert!(!note.important);
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(store.get_by_id(&note.id), Some(&note));
    }

    #[test]
    fn test_add_with_draft_fields() {
        let mut store = NoteStore::in_memory();
        let due = Utc::now();
        let note = store.add(
            NoteDraft::new("x")
                .progress(Progress::InProgress)
                .due_date(Some(due))
                .important(true),
        );
        assert_eq!(note.progress, Progress::InProgress);
        assert_eq!(note.due_date, Some(due));
        assert!(note.important);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = NoteStore::in_memory();
        let ids: HashSet<String> = (0..50)
            .map(|i| store.add(format!("n{i}")).id)
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_update_patch_semantics() {
        let mut store = NoteStore::in_memory();
        let due = Utc::now() + Duration::days(2);
        let note = store.add(NoteDraft::new("a").due_date(Some(due)).important(true));

        let updated = store.update(&note.id, NotePatch::new().content("b")).unwrap();
        assert_eq!(updated.content, "b");
        assert_eq!(updated.due_date, Some(due));
        assert!(updated.important);
        assert!(updated.updated_at >= note.updated_at);

        let cleared = store
            .update(&note.id, NotePatch::new().clear_due_date())
            .unwrap();
        assert_eq!(cleared.due_date, None);
        assert_eq!(cleared.content, "b");

        let flags = store
            .update(
                &note.id,
                NotePatch::new().important(false).progress(Progress::Done),
            )
            .unwrap();
        assert!(!flags.important);
        assert_eq!(flags.progress, Progress::Done);
    }

    #[test]
    fn test_update_unknown_id() {
        let mut store = NoteStore::in_memory();
        let err = store.update("missing", NotePatch::new().content("x")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_delete() {
        let mut store = NoteStore::in_memory();
        let note = store.add("gone soon");
        assert!(store.delete(&note.id));
        assert!(!store.delete(&note.id));
        assert!(store.get_by_id(&note.id).is_none());
    }

    #[test]
    fn test_get_all_is_a_snapshot() {
        let mut store = NoteStore::in_memory();
        store.add("first");
        store.add("second");
        let mut snapshot = store.get_all();
        snapshot[0].content = "changed".into();
        snapshot.clear();
        assert_eq!(store.len(), 2);
        assert_eq!(store.notes()[0].content, "first");
        assert_eq!(store.notes()[1].content, "second");
    }

    #[test]
    fn test_all_hashtags_tracks_content() {
        let mut store = NoteStore::in_memory();
        let a = store.add("#work on #rust");
        store.add("#rust #home");
        let tags: Vec<_> = store.all_hashtags().into_iter().collect();
        assert_eq!(tags, vec!["#home", "#rust", "#work"]);

        store.update(&a.id, NotePatch::new().content("no tags")).unwrap();
        let tags: Vec<_> = store.all_hashtags().into_iter().collect();
        assert_eq!(tags, vec!["#home", "#rust"]);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut store = NoteStore::in_memory();
        let due = Utc::now() + Duration::days(1);
        store.add(NoteDraft::new("one #a").due_date(Some(due)).important(true));
        let b = store.add("two");
        store.update(&b.id, NotePatch::new().progress(Progress::InProgress)).unwrap();
        let exported = store.export_to().unwrap();

        let mut other = NoteStore::in_memory();
        other.add("will be replaced");
        assert_eq!(other.import_from(&exported).unwrap(), 2);
        assert_eq!(other.get_all(), store.get_all());
    }

    #[test]
    fn test_export_carries_version() {
        let store = NoteStore::in_memory();
        let exported = store.export_to().unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value["version"], json!(1));
        assert!(value["notes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_import_normalizes_missing_fields() {
        let mut store = NoteStore::in_memory();
        let payload = json!({
            "notes": [{
                "id": "n-1",
                "content": "legacy",
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-02T00:00:00Z",
            }]
        });
        store.import_from(&payload.to_string()).unwrap();
        let note = store.get_by_id("n-1").unwrap();
        assert_eq!(note.progress, Progress::NotStarted);
        assert_eq!(note.due_date, None);
        assert!(!note.important);
    }

    #[test]
    fn test_import_rejects_bad_payloads_without_mutation() {
        let mut store = NoteStore::in_memory();
        store.add("keep me");
        for bad in [
            "not json",
            "[]",
            r#"{"items": []}"#,
            r#"{"notes": {}}"#,
            r#"{"notes": [], "version": 2}"#,
            r#"{"notes": [{"content": "no id"}]}"#,
            r#"{"notes": [{"id": "a", "content": "x"}, {"id": "a", "content": "y"}]}"#,
        ] {
            let err = store.import_from(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidImport { .. }), "{bad}");
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.notes()[0].content, "keep me");
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut store = NoteStore::in_memory();
        let local = store.add("local");
        let t1 = local.updated_at;

        let older = json!({
            "id": local.id,
            "content": "older",
            "updatedAt": t1 - Duration::seconds(5),
        });
        let same = json!({"id": local.id, "content": "same", "updatedAt": t1});
        let report = store.merge_remote(vec![older, same]);
        assert!(!report.changed());
        assert_eq!(store.get_by_id(&local.id).unwrap().content, "local");

        let newer = json!({
            "id": local.id,
            "content": "newer",
            "updatedAt": t1 + Duration::seconds(5),
            "important": true,
        });
        let report = store.merge_remote(vec![newer]);
        assert_eq!(report.updated, vec![local.id.clone()]);
        let merged = store.get_by_id(&local.id).unwrap();
        assert_eq!(merged.content, "newer");
        assert!(merged.important);
    }

    #[test]
    fn test_merge_inserts_and_skips() {
        let mut store = NoteStore::in_memory();
        let report = store.merge_remote(vec![
            json!({
                "id": "r-1",
                "content": "from cloud",
                "updatedAt": "2025-01-01T00:00:00Z"
            }),
            json!({"content": "no id", "updatedAt": "2025-01-01T00:00:00Z"}),
            json!({"id": "r-2", "content": "no timestamp"}),
            json!({"id": "r-3", "updatedAt": "yesterday"}),
            json!("garbage"),
        ]);
        assert_eq!(report.inserted, vec!["r-1"]);
        assert_eq!(report.skipped, 4);
        let note = store.get_by_id("r-1").unwrap();
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(note.progress, Progress::NotStarted);
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut store = NoteStore::in_memory();
        let mut rx = store.subscribe();
        let note = store.add("x");
        store.update(&note.id, NotePatch::new().content("y")).unwrap();
        store.delete(&note.id);
        store.delete(&note.id);

        assert!(matches!(rx.try_recv(), Ok(StoreEvent::Added(n)) if n.id == note.id));
        assert!(matches!(
            rx.try_recv(),
            Ok(StoreEvent::Updated(n)) if n.content == "y"
        ));
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::Deleted(note.id.clone())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut store = NoteStore::in_memory();
        drop(store.subscribe());
        store.add("x");
        assert!(store.subscribers.is_empty());
    }

    #[test]
    fn test_persists_and_reloads_from_file() {
        let tmp = tempdir().unwrap();
        let mut store = NoteStore::open(FileStorage::in_dir(tmp.path()));
        let note = store.add("durable #yes");
        store.set_sync_enabled(true);

        let reopened = NoteStore::open(FileStorage::in_dir(tmp.path()));
        assert_eq!(reopened.get_by_id(&note.id), Some(&note));
        assert!(reopened.sync_enabled());

        let raw = fs::read_to_string(tmp.path().join(STATE_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["syncEnabled"], json!(true));
        assert!(value["notes"].is_array());
    }

    #[test]
    fn test_reload_sees_other_writers() {
        let tmp = tempdir().unwrap();
        let mut watcher = NoteStore::open(FileStorage::in_dir(tmp.path()));
        let kept = watcher.add("kept");
        let gone = watcher.add("gone");

        let mut other = NoteStore::open(FileStorage::in_dir(tmp.path()));
        other.delete(&gone.id);
        other.update(&kept.id, NotePatch::new().content("kept, edited")).unwrap();
        other.set_sync_enabled(true);

        assert!(watcher.reload());
        assert!(watcher.get_by_id(&gone.id).is_none());
        assert_eq!(watcher.get_by_id(&kept.id).unwrap().content, "kept, edited");
        assert!(watcher.sync_enabled());
        assert!(!watcher.reload());
    }

    #[test]
    fn test_reload_keeps_unsaved_changes() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let mut store = NoteStore::open(FileStorage::in_dir(&blocker));
        let note = store.add("only in memory");

        assert!(!store.reload());
        assert!(store.contains(&note.id));
    }

    #[test]
    fn test_corrupted_state_falls_back_to_empty() {
        let store = NoteStore::open(MemoryStorage::with_data("{not json"));
        assert!(store.is_empty());
        assert!(!store.sync_enabled());
    }

    #[test]
    fn test_memory_storage_is_shared() {
        let storage = MemoryStorage::new();
        let mut store = NoteStore::open(storage.clone());
        store.add("shared");
        assert!(storage.contents().unwrap().contains("shared"));
    }
}
