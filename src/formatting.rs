use chrono::{DateTime, Local, NaiveDate, Utc};
use yansi::Paint;

use crate::due::{Urgency, format_due_date, format_short_due_date};
use crate::note::Progress;
use crate::queue::LoadLevel;

/// Color palette for consistent theming
pub struct ColorPalette {
    pub primary: (u8, u8, u8),   // IDs, muted text
    pub secondary: (u8, u8, u8), // Headers, emphasis
    pub timestamp: (u8, u8, u8), // Timestamps
    pub highlight: (u8, u8, u8), // Search matches
    pub important: (u8, u8, u8),
}

impl ColorPalette {
    pub const CATPPUCCIN: Self = Self {
        primary: (108, 112, 134),   // Gray
        secondary: (148, 226, 213), // Teal
        timestamp: (137, 180, 250), // Blue
        highlight: (243, 139, 168), // Pink
        important: (250, 179, 135), // Peach
    };
}

/// Formatting context passed through rendering pipeline
pub struct FormatContext {
    pub use_color: bool,
    pub palette: ColorPalette,
}

impl FormatContext {
    pub fn new(use_color: bool) -> Self {
        Self {
            use_color,
            palette: ColorPalette::CATPPUCCIN,
        }
    }

    fn paint(&self, text: &str, (r, g, b): (u8, u8, u8)) -> String {
        if self.use_color {
            Paint::rgb(text, r, g, b).to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_bold(&self, text: &str, (r, g, b): (u8, u8, u8)) -> String {
        if self.use_color {
            Paint::rgb(text, r, g, b).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_id(&self, id: &str) -> String {
        self.paint(id, self.palette.primary)
    }

    pub fn format_header(&self, text: &str) -> String {
        self.paint_bold(text, self.palette.secondary)
    }

    pub fn format_timestamp(&self, ts: &str) -> String {
        self.paint(ts, self.palette.timestamp)
    }

    pub fn format_tag(&self, tag: &str) -> String {
        self.paint_bold(tag, crate::tags::color_for_tag(tag))
    }

    pub fn format_tags(&self, tags: &[String]) -> String {
        tags.iter()
            .map(|t| self.format_tag(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn format_progress(&self, progress: Progress) -> String {
        let color = match progress {
            Progress::NotStarted => self.palette.primary,
            Progress::InProgress => Urgency::Tomorrow.color(),
            Progress::Done => Urgency::Later.color(),
        };
        self.paint(progress.symbol(), color)
    }

    pub fn format_important(&self, important: bool) -> String {
        if important {
            self.paint_bold("!", self.palette.important)
        } else {
            " ".to_string()
        }
    }

    /// Long due label ("Due Tomorrow"), colored by urgency.
    pub fn format_due(&self, due: &DateTime<Utc>, today: NaiveDate) -> String {
        let urgency = Urgency::of(due, today);
        self.paint(&format_due_date(due, today), urgency.color())
    }

    /// Short due label for table cells; empty when there is no due date.
    pub fn format_short_due(
        &self,
        due: Option<&DateTime<Utc>>,
        today: NaiveDate,
    ) -> String {
        match due {
            Some(due) => self.paint(
                &format_short_due_date(due, today),
                Urgency::of(due, today).color(),
            ),
            None => String::new(),
        }
    }

    pub fn format_load(&self, len: usize, max: usize) -> String {
        let level = LoadLevel::for_len(len);
        self.paint(&format!("{len}/{max}"), level.color())
    }

    pub fn highlight_match(&self, text: &str, query: Option<&str>) -> String {
        let Some(q) = query else { return text.to_string() };
        if q.is_empty() || !self.use_color {
            return text.to_string();
        }

        let q_lower = q.to_lowercase();
        let mut out = String::new();
        let mut remaining = text;

        while let Some(pos) = find_case_insensitive(remaining, &q_lower) {
            let (before, rest) = remaining.split_at(pos);
            let (matched, after) = rest.split_at(q_lower.len().min(rest.len()));
            out.push_str(before);
            out.push_str(&self.paint(matched, self.palette.highlight));
            remaining = after;
        }
        out.push_str(remaining);
        out
    }
}

/// Byte offset of `needle` (already lowercase) in `haystack`, ignoring ASCII
/// case. Offsets stay valid for slicing `haystack`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| {
            haystack
                .get(i..i + needle.len())
                .is_some_and(|s| s.eq_ignore_ascii_case(needle))
        })
}

/// Timestamp formatting with relative/absolute modes
pub struct TimeFormatter {
    relative_mode: bool,
    now: DateTime<Utc>,
}

impl TimeFormatter {
    pub fn new(relative_mode: bool, now: DateTime<Utc>) -> Self {
        Self { relative_mode, now }
    }

    pub fn format(&self, ts: &DateTime<Utc>) -> String {
        if self.relative_mode {
            time_ago(Some(*ts), self.now)
        } else {
            ts.with_timezone(&Local).format("%d%b%y %H:%M").to_string()
        }
    }
}

/// "Just now", "5m ago", "3h ago", "2d ago"; "Never" for no timestamp.
pub fn time_ago(then: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(then) = then else {
        return "Never".to_string();
    };
    let seconds = now.signed_duration_since(then).num_seconds().max(0);
    if seconds < 60 {
        return "Just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::due::local_midnight;
    use chrono::Duration;

    #[test]
    fn test_format_context_no_color() {
        let ctx = FormatContext::new(false);
        assert_eq!(ctx.format_id("n-abc123"), "n-abc123");
        assert_eq!(ctx.format_header("Header"), "Header");
        assert_eq!(ctx.format_progress(Progress::Done), "●");
        assert_eq!(ctx.format_important(true), "!");
        assert_eq!(ctx.format_load(4, 7), "4/7");
    }

    #[test]
    fn test_format_context_with_color() {
        let ctx = FormatContext::new(true);
        let id = ctx.format_id("abc123");
        assert!(id.contains("abc123"));
        assert!(id.len() > "abc123".len()); // Has ANSI codes
    }

    #[test]
    fn test_format_due_labels() {
        let ctx = FormatContext::new(false);
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let tomorrow = local_midnight(today.succ_opt().unwrap());
        assert_eq!(ctx.format_due(&tomorrow, today), "Due Tomorrow");
        assert_eq!(ctx.format_short_due(Some(&tomorrow), today), "Tomorrow");
        assert_eq!(ctx.format_short_due(None, today), "");
    }

    #[test]
    fn test_highlight_match() {
        let ctx = FormatContext::new(false);
        assert_eq!(
            ctx.highlight_match("hello world", Some("world")),
            "hello world"
        );

        let ctx = FormatContext::new(true);
        let result = ctx.highlight_match("Hello World", Some("world"));
        assert!(result.contains("World"));
        assert!(result.len() > "Hello World".len());
    }

    #[test]
    fn test_find_case_insensitive_multibyte() {
        assert_eq!(find_case_insensitive("ÄÖ milk", "milk"), Some(5));
        assert_eq!(find_case_insensitive("abc", "zz"), None);
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago(None, now), "Never");
        assert_eq!(time_ago(Some(now - Duration::seconds(10)), now), "Just now");
        assert_eq!(time_ago(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(time_ago(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(time_ago(Some(now - Duration::days(2)), now), "2d ago");
    }

    #[test]
    fn test_time_formatter_modes() {
        let now = Utc::now();
        let relative = TimeFormatter::new(true, now);
        assert_eq!(relative.format(&(now - Duration::hours(2))), "2h ago");
        let absolute = TimeFormatter::new(false, now);
        assert!(!absolute.format(&now).is_empty());
    }
}
