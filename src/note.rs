use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ID_PREFIX: &str = "n-";
pub const ID_TS_WIDTH: usize = 9;

/// Where a note is in its lifecycle. Serialized the way the web app stored it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Progress {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

impl Progress {
    pub fn as_str(self) -> &'static str {
        match self {
            Progress::NotStarted => "not-started",
            Progress::InProgress => "in-progress",
            Progress::Done => "done",
        }
    }

    /// Single-character indicator used in listings.
    pub fn symbol(self) -> &'static str {
        match self {
            Progress::NotStarted => "○",
            Progress::InProgress => "◐",
            Progress::Done => "●",
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Progress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "not-started" | "notstarted" | "todo" | "new" => {
                Ok(Progress::NotStarted)
            }
            "in-progress" | "inprogress" | "doing" | "started" => {
                Ok(Progress::InProgress)
            }
            "done" | "finished" => Ok(Progress::Done),
            other => Err(format!(
                "Unknown progress state: {other} (expected not-started|in-progress|done)"
            )),
        }
    }
}

/// A note as stored locally and exchanged with the remote store.
///
/// Hashtags are deliberately absent: they are derived from `content` on every
/// read through [`Note::hashtags`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub important: bool,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(id: String, content: String) -> Self {
        let ts = now();
        Self {
            id,
            content,
            progress: Progress::NotStarted,
            due_date: None,
            important: false,
            created_at: ts,
            updated_at: ts,
        }
    }

    pub fn hashtags(&self) -> Vec<String> {
        crate::tags::extract_hashtags(&self.content)
    }

    pub fn is_done(&self) -> bool {
        self.progress == Progress::Done
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }

    /// First non-empty line of the content, for one-line listings.
    pub fn preview(&self) -> &str {
        self.content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("[empty]")
    }
}

/// Derived hashtag list of a note; a pure function of its content.
pub fn hashtags(note: &Note) -> Vec<String> {
    note.hashtags()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Generate a fresh note id (`n-<base62 micros>-<8 hex>`), retrying while
/// `taken` reports a collision.
pub fn generate_id(taken: impl Fn(&str) -> bool) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let ts = encode_base62_width(
            Utc::now().timestamp_micros().max(0) as u64,
            ID_TS_WIDTH,
        );
        let id =
            format!("{ID_PREFIX}{ts}-{:08x}", rng.gen_range(0..=u32::MAX));
        if !taken(&id) {
            return id;
        }
    }
}

fn encode_base62(num: u64) -> String {
    const ALPHABET: &[u8] =
        b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    if num == 0 {
        return "0".to_string();
    }
    let mut n = num;
    let base = ALPHABET.len() as u64;
    let mut out = Vec::new();
    while n > 0 {
        let idx = (n % base) as usize;
        out.push(ALPHABET[idx] as char);
        n /= base;
    }
    out.iter().rev().collect()
}

fn encode_base62_width(num: u64, width: usize) -> String {
    let base = encode_base62(num);
    if base.len() >= width {
        base
    } else {
        format!("{}{}", "0".repeat(width - base.len()), base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_progress_serde_names() {
        let json = serde_json::to_string(&Progress::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let parsed: Progress = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(parsed, Progress::Done);
    }

    #[test]
    fn test_progress_from_str() {
        assert_eq!("todo".parse::<Progress>().unwrap(), Progress::NotStarted);
        assert_eq!(
            "in_progress".parse::<Progress>().unwrap(),
            Progress::InProgress
        );
        assert!("later".parse::<Progress>().is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let note: Note = serde_json::from_value(json!({
            "id": "n-1",
            "content": "hello",
            "createdAt": "2025-01-02T03:04:05Z",
            "updatedAt": "2025-01-02T03:04:05Z",
        }))
        .unwrap();
        assert_eq!(note.progress, Progress::NotStarted);
        assert_eq!(note.due_date, None);
        assert!(!note.important);
    }

    #[test]
    fn test_camel_case_fields() {
        let note = Note::new("n-1".into(), "x".into());
        let value = serde_json::to_value(&note).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("dueDate").unwrap().is_null());
        assert!(value.get("hashtags").is_none());
    }

    #[test]
    fn test_hashtags_follow_content() {
        let mut note = Note::new("n-1".into(), "Plan #work trip".into());
        assert_eq!(hashtags(&note), vec!["#work"]);
        assert_eq!(hashtags(&note), hashtags(&note));
        note.content = "Plan #travel".into();
        assert_eq!(note.hashtags(), vec!["#travel"]);
    }

    #[test]
    fn test_generate_id_shape_and_uniqueness() {
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let id = generate_id(|candidate| seen.contains(candidate));
            assert!(id.starts_with(ID_PREFIX));
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_base62_width() {
        assert_eq!(encode_base62(0), "0");
        assert_eq!(encode_base62(61), "z");
        assert_eq!(encode_base62_width(62, 4), "0010");
    }

    #[test]
    fn test_preview() {
        let note = Note::new("n-1".into(), "\n  first line\nsecond".into());
        assert_eq!(note.preview(), "first line");
        let empty = Note::new("n-2".into(), "   ".into());
        assert_eq!(empty.preview(), "[empty]");
    }
}
