//! The note store and the recommendation engine, kept in step.
//!
//! All note mutations go through [`Workspace`] so weight entries are created,
//! dropped and reset alongside the notes they belong to. Multi-task callers
//! share one workspace behind a single async mutex ([`SharedWorkspace`]).

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::due::local_today;
use crate::error::Result;
use crate::note::Note;
use crate::queue::{QueueOutcome, TaskQueue};
use crate::recommend::{Pick, RecommendationEngine};
use crate::store::{
    MergeReport, NoteDraft, NotePatch, NoteStore, Storage, StoreEvent,
};

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

pub struct Workspace {
    store: NoteStore,
    engine: RecommendationEngine,
    queue: TaskQueue,
}

impl Workspace {
    pub fn new(store: NoteStore, mut engine: RecommendationEngine) -> Self {
        engine.reset_weights(store.notes());
        Self {
            store,
            engine,
            queue: TaskQueue::new(),
        }
    }

    pub fn open(storage: impl Storage + 'static) -> Self {
        Self::new(NoteStore::open(storage), RecommendationEngine::new())
    }

    pub fn in_memory() -> Self {
        Self::new(NoteStore::in_memory(), RecommendationEngine::new())
    }

    pub fn into_shared(self) -> SharedWorkspace {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn add(&mut self, draft: impl Into<NoteDraft>) -> Note {
        let note = self.store.add(draft);
        self.engine.insert(&note.id);
        note
    }

    pub fn update(&mut self, id: &str, patch: NotePatch) -> Result<Note> {
        self.store.update(id, patch)
    }

    /// Delete a note together with its weight and any queue entry.
    pub fn delete(&mut self, id: &str) -> bool {
        let existed = self.store.delete(id);
        if existed {
            self.engine.remove(id);
            self.queue.remove(id);
        }
        existed
    }

    pub fn import_from(&mut self, data: &str) -> Result<usize> {
        let count = self.store.import_from(data)?;
        self.engine.reshuffle(self.store.notes());
        self.queue.clear();
        Ok(count)
    }

    /// Re-read notes saved by other processes. Weights survive for notes
    /// that still exist; queue entries for vanished notes are dropped.
    pub fn reload(&mut self) -> bool {
        if !self.store.reload() {
            return false;
        }
        self.engine.retain_notes(self.store.notes());
        let store = &self.store;
        self.queue.retain(|id| store.contains(id));
        true
    }

    pub fn export_to(&self) -> Result<String> {
        self.store.export_to()
    }

    pub fn merge_remote(&mut self, records: Vec<serde_json::Value>) -> MergeReport {
        let report = self.store.merge_remote(records);
        for id in &report.inserted {
            self.engine.insert(id);
        }
        report
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) {
        self.store.set_sync_enabled(enabled);
    }

    /// Entering recommendation mode.
    pub fn begin_session(&mut self) {
        self.engine.begin_session();
    }

    pub fn pick(&mut self) -> Pick {
        self.pick_on(local_today())
    }

    pub fn pick_on(&mut self, today: NaiveDate) -> Pick {
        self.engine.pick_on(self.store.notes(), today)
    }

    /// Record a positive signal and queue the note. `None` when the note no
    /// longer exists.
    pub fn accept(&mut self, id: &str) -> Option<QueueOutcome> {
        self.engine
            .accept(id, self.store.notes())
            .then(|| self.queue.push(id))
    }

    pub fn reject(&mut self, id: &str) -> bool {
        self.engine.reject(id, self.store.notes())
    }

    /// Start a fresh round; queued notes stay out of it.
    pub fn reshuffle(&mut self) {
        let queued = self.queue.ids().iter().map(String::as_str);
        self.engine.reshuffle_keeping(self.store.notes(), queued);
    }

    /// Queued notes that still exist, in queue order.
    pub fn queued_notes(&self) -> Vec<&Note> {
        self.queue
            .ids()
            .iter()
            .filter_map(|id| self.store.get_by_id(id))
            .collect()
    }
}
