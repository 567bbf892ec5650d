//! Weighted resurfacing of open notes.
//!
//! Every live note carries a session-only base weight. A pick draws among the
//! not-done, not-yet-viewed notes with probability proportional to
//! `base * importance * urgency`; feedback rescales the picked note and the
//! notes that share hashtags with it.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use crate::due::{local_today, urgency_multiplier};
use crate::note::Note;
use crate::tags::shared_tag_count;

pub const DEFAULT_WEIGHT: f64 = 1.0;
pub const FEEDBACK_FACTOR: f64 = 0.5;
pub const IMPORTANT_MULTIPLIER: f64 = 2.0;
pub const RELATED_STEP: f64 = 0.1;
pub const MAX_RELATED_BOOST: f64 = 2.0;
pub const MIN_RELATED_PENALTY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum Pick {
    Note(Note),
    /// Open notes exist but all have been shown; reshuffle to continue.
    Exhausted,
    /// Nothing to recommend: no notes, or every note is done.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feedback {
    Accept,
    Reject,
}

impl Feedback {
    fn related_multiplier(self, shared: usize) -> f64 {
        let step = RELATED_STEP * shared as f64;
        match self {
            Feedback::Accept => (1.0 + step).min(MAX_RELATED_BOOST),
            Feedback::Reject => (1.0 - step).max(MIN_RELATED_PENALTY),
        }
    }
}

pub struct RecommendationEngine {
    weights: HashMap<String, f64>,
    viewed: HashSet<String>,
    rng: StdRng,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic engine for tests and reproducible sessions.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            weights: HashMap::new(),
            viewed: HashSet::new(),
            rng,
        }
    }

    /// Fresh weights (1.0) for exactly the given notes.
    pub fn reset_weights(&mut self, notes: &[Note]) {
        self.weights = notes
            .iter()
            .map(|n| (n.id.clone(), DEFAULT_WEIGHT))
            .collect();
    }

    /// Follow a collection that changed underneath: weights of surviving
    /// notes are kept, new notes start at 1.0, vanished ids are dropped.
    pub fn retain_notes(&mut self, notes: &[Note]) {
        let live: HashSet<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        self.weights.retain(|id, _| live.contains(id.as_str()));
        self.viewed.retain(|id| live.contains(id.as_str()));
        for note in notes {
            self.insert(&note.id);
        }
    }

    pub fn insert(&mut self, id: &str) {
        self.weights.entry(id.to_string()).or_insert(DEFAULT_WEIGHT);
    }

    pub fn remove(&mut self, id: &str) {
        self.weights.remove(id);
        self.viewed.remove(id);
    }

    pub fn weight(&self, id: &str) -> Option<f64> {
        self.weights.get(id).copied()
    }

    fn base_weight(&self, id: &str) -> f64 {
        self.weight(id).unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn effective_weight(&self, note: &Note, today: NaiveDate) -> f64 {
        let importance =
            if note.important { IMPORTANT_MULTIPLIER } else { 1.0 };
        self.base_weight(&note.id)
            * importance
            * urgency_multiplier(note.due_date.as_ref(), today)
    }

    pub fn is_viewed(&self, id: &str) -> bool {
        self.viewed.contains(id)
    }

    pub fn mark_viewed(&mut self, id: &str) {
        self.viewed.insert(id.to_string());
    }

    /// Entering recommendation mode starts with nothing viewed.
    pub fn begin_session(&mut self) {
        self.viewed.clear();
    }

    pub fn pick(&mut self, notes: &[Note]) -> Pick {
        self.pick_on(notes, local_today())
    }

    /// Draw the next note and mark it viewed.
    pub fn pick_on(&mut self, notes: &[Note], today: NaiveDate) -> Pick {
        let open: Vec<&Note> = notes.iter().filter(|n| !n.is_done()).collect();
        if open.is_empty() {
            return Pick::Empty;
        }
        let candidates: Vec<&Note> = open
            .into_iter()
            .filter(|n| !self.is_viewed(&n.id))
            .collect();
        if candidates.is_empty() {
            return Pick::Exhausted;
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|n| self.effective_weight(n, today))
            .collect();
        let total: f64 = weights.iter().sum();
        let drawn = if total > 0.0 && total.is_finite() {
            let r = self.rng.gen_range(0.0..total);
            weighted_index(&weights, r)
        } else {
            None
        };
        let idx = drawn.unwrap_or_else(|| {
            tracing::debug!(total, "weighted draw fell through, picking uniformly");
            self.rng.gen_range(0..candidates.len())
        });

        let note = candidates[idx].clone();
        self.mark_viewed(&note.id);
        Pick::Note(note)
    }

    /// Halve `id`'s weight and boost notes sharing hashtags with it.
    /// Returns false (and changes nothing) when `id` is not a live note.
    pub fn accept(&mut self, id: &str, notes: &[Note]) -> bool {
        self.apply_feedback(id, notes, Feedback::Accept)
    }

    /// Halve `id`'s weight and dampen notes sharing hashtags with it.
    pub fn reject(&mut self, id: &str, notes: &[Note]) -> bool {
        self.apply_feedback(id, notes, Feedback::Reject)
    }

    fn apply_feedback(
        &mut self,
        id: &str,
        notes: &[Note],
        feedback: Feedback,
    ) -> bool {
        let Some(target) = notes.iter().find(|n| n.id == id) else {
            tracing::debug!(id, "feedback for unknown note ignored");
            return false;
        };
        let target_tags = target.hashtags();
        self.scale(id, FEEDBACK_FACTOR);

        if target_tags.is_empty() {
            return true;
        }
        for other in notes.iter().filter(|n| n.id != id) {
            let shared = shared_tag_count(&target_tags, &other.hashtags());
            if shared > 0 {
                self.scale(&other.id, feedback.related_multiplier(shared));
            }
        }
        true
    }

    /// Multiplicative update. Results are kept strictly positive and finite
    /// even after extreme runs of feedback.
    fn scale(&mut self, id: &str, factor: f64) {
        let weight = self.weights.entry(id.to_string()).or_insert(DEFAULT_WEIGHT);
        *weight = (*weight * factor).clamp(f64::MIN_POSITIVE, f64::MAX);
    }

    /// Reset every live note to the default weight and forget what was shown.
    pub fn reshuffle(&mut self, notes: &[Note]) {
        self.reset_weights(notes);
        self.viewed.clear();
    }

    /// Reshuffle, but keep `keep` (e.g. queued tasks) out of the next round.
    pub fn reshuffle_keeping<'a>(
        &mut self,
        notes: &[Note],
        keep: impl IntoIterator<Item = &'a str>,
    ) {
        self.reshuffle(notes);
        self.viewed.extend(keep.into_iter().map(str::to_string));
    }
}

/// Walk `weights` accumulating, and return the first index whose running sum
/// reaches `r`. `None` when rounding leaves `r` past the final sum.
pub fn weighted_index(weights: &[f64], r: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if cumulative >= r {
            return Some(idx);
        }
    }
    None
}
