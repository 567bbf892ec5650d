/// Upper bound on queued tasks.
pub const MAX_TASKS: usize = 7;
pub const WARNING_TASKS: usize = 3;
pub const DANGER_TASKS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Added,
    Duplicate,
    Full,
}

/// How heavy the current queue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLevel {
    Normal,
    Warning,
    Danger,
}

impl LoadLevel {
    pub fn for_len(len: usize) -> Self {
        if len > DANGER_TASKS {
            LoadLevel::Danger
        } else if len > WARNING_TASKS {
            LoadLevel::Warning
        } else {
            LoadLevel::Normal
        }
    }

    pub fn color(self) -> (u8, u8, u8) {
        match self {
            LoadLevel::Normal => (76, 175, 80),
            LoadLevel::Warning => (255, 152, 0),
            LoadLevel::Danger => (244, 67, 54),
        }
    }
}

/// Ordered note ids accepted during recommendation, bounded by [`MAX_TASKS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQueue {
    ids: Vec<String>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: &str) -> QueueOutcome {
        if self.contains(id) {
            return QueueOutcome::Duplicate;
        }
        if self.ids.len() >= MAX_TASKS {
            return QueueOutcome::Full;
        }
        self.ids.push(id.to_string());
        QueueOutcome::Added
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|queued| queued != id);
        self.ids.len() != before
    }

    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.ids.retain(|id| keep(id));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|queued| queued == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_rejects_duplicates_and_overflow() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.push("a"), QueueOutcome::Added);
        assert_eq!(queue.push("a"), QueueOutcome::Duplicate);
        for i in 1..MAX_TASKS {
            assert_eq!(queue.push(&format!("t{i}")), QueueOutcome::Added);
        }
        assert_eq!(queue.push("overflow"), QueueOutcome::Full);
        assert_eq!(queue.len(), MAX_TASKS);
        assert_eq!(queue.ids()[0], "a");
    }

    #[test]
    fn test_remove() {
        let mut queue = TaskQueue::new();
        queue.push("a");
        queue.push("b");
        assert!(queue.remove("a"));
        assert!(!queue.remove("a"));
        assert_eq!(queue.ids(), ["b".to_string()]);
    }

    #[test]
    fn test_load_levels() {
        assert_eq!(LoadLevel::for_len(0), LoadLevel::Normal);
        assert_eq!(LoadLevel::for_len(3), LoadLevel::Normal);
        assert_eq!(LoadLevel::for_len(4), LoadLevel::Warning);
        assert_eq!(LoadLevel::for_len(5), LoadLevel::Warning);
        assert_eq!(LoadLevel::for_len(6), LoadLevel::Danger);
        assert_eq!(LoadLevel::for_len(7), LoadLevel::Danger);
    }
}
