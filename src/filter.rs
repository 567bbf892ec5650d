//! Search and table filtering over notes.

use chrono::NaiveDate;
use std::str::FromStr;

use crate::due::{Urgency, days_until};
use crate::note::{Note, Progress};
use crate::tags::normalize_tag;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Importance {
    #[default]
    All,
    Important,
    Normal,
}

impl FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Importance::All),
            "important" | "yes" => Ok(Importance::Important),
            "normal" | "no" => Ok(Importance::Normal),
            other => Err(format!(
                "Unknown importance filter: {other} (expected all|important|normal)"
            )),
        }
    }
}

/// Due-date filter, expressed in the shared urgency buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DueFilter {
    #[default]
    All,
    NoDate,
    Overdue,
    Today,
    Tomorrow,
    /// Due between today and seven days out, inclusive.
    Week,
    Later,
}

impl DueFilter {
    pub fn matches(self, note: &Note, today: NaiveDate) -> bool {
        let Some(due) = note.due_date.as_ref() else {
            return matches!(self, DueFilter::All | DueFilter::NoDate);
        };
        let days = days_until(due, today);
        match self {
            DueFilter::All => true,
            DueFilter::NoDate => false,
            DueFilter::Overdue => Urgency::from_days(days) == Urgency::Overdue,
            DueFilter::Today => Urgency::from_days(days) == Urgency::Today,
            DueFilter::Tomorrow => Urgency::from_days(days) == Urgency::Tomorrow,
            DueFilter::Week => (0..=7).contains(&days),
            DueFilter::Later => Urgency::from_days(days) == Urgency::Later,
        }
    }
}

impl FromStr for DueFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DueFilter::All),
            "none" | "no-date" | "nodate" => Ok(DueFilter::NoDate),
            "overdue" => Ok(DueFilter::Overdue),
            "today" => Ok(DueFilter::Today),
            "tomorrow" => Ok(DueFilter::Tomorrow),
            "week" => Ok(DueFilter::Week),
            "later" | "future" => Ok(DueFilter::Later),
            other => Err(format!(
                "Unknown due filter: {other} (expected all|none|overdue|today|tomorrow|week|later)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// Case-insensitive substring of the content or of any hashtag.
    pub text: Option<String>,
    pub progress: Option<Progress>,
    pub importance: Importance,
    pub due: DueFilter,
    /// Matches notes carrying any of these tags.
    pub tags: Vec<String>,
    /// Drop done notes unless `progress` asks for them.
    pub hide_done: bool,
}

impl NoteFilter {
    /// Table listing defaults: open notes only.
    pub fn table() -> Self {
        Self {
            hide_done: true,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into().trim().to_lowercase();
        self.text = (!text.is_empty()).then_some(text);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        let tag = normalize_tag(tag);
        if !tag.is_empty() && !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn matches(&self, note: &Note, today: NaiveDate) -> bool {
        match self.progress {
            Some(progress) if note.progress != progress => return false,
            None if self.hide_done && note.is_done() => return false,
            _ => {}
        }
        match self.importance {
            Importance::Important if !note.important => return false,
            Importance::Normal if note.important => return false,
            _ => {}
        }
        if !self.due.matches(note, today) {
            return false;
        }

        let hashtags = note.hashtags();
        if !self.tags.is_empty() && !hashtags.iter().any(|t| self.tags.contains(t)) {
            return false;
        }
        match &self.text {
            Some(needle) => {
                note.content.to_lowercase().contains(needle)
                    || hashtags.iter().any(|t| t.to_lowercase().contains(needle))
            }
            None => true,
        }
    }

    pub fn apply<'a>(&self, notes: &'a [Note], today: NaiveDate) -> Vec<&'a Note> {
        notes.iter().filter(|n| self.matches(n, today)).collect()
    }
}
