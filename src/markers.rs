//! Free-text time markers (`!today`, `due:3/4/2025`, `!important`, ...) and
//! their structured counterparts.

use chrono::{DateTime, Months, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::due::{days_from, local_midnight, local_today};

pub const IMPORTANT: &str = "!important";
pub const TODAY: &str = "!today";
pub const TOMORROW: &str = "!tomorrow";
pub const NEXT_WEEK: &str = "!nextweek";
pub const NEXT_MONTH: &str = "!nextmonth";
pub const NO_DUE_DATE: &str = "!noDueDate";

/// Group 1 is the marker itself; it must start a word.
static EXPLICIT_DUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(!?due:(\d{1,2})/(\d{1,2})/(\d{4}))\b")
        .expect("valid regex")
});

/// `due:` with no date yet; the editor opens a date picker on this.
static BARE_DUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)!?due:(?:\D|$)").expect("valid regex")
});

/// What the text says about the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueMarker {
    /// No marker; callers leave any existing due date alone.
    Absent,
    /// `!noDueDate`
    Clear,
    Set(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub due: DueMarker,
    pub important: bool,
    /// Input text with every recognised marker removed.
    pub text: String,
}

impl Markers {
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        match self.due {
            DueMarker::Set(dt) => Some(dt),
            DueMarker::Absent | DueMarker::Clear => None,
        }
    }
}

pub fn extract_markers(text: &str) -> Markers {
    extract_markers_on(text, local_today())
}

/// Parse markers relative to `today`.
///
/// Precedence: `!noDueDate`, then an explicit `due:` date, then a bare `due:`
/// (which stops relative markers from being applied), then the first of
/// `!today`, `!tomorrow`, `!nextweek`, `!nextmonth` present in the text.
pub fn extract_markers_on(text: &str, today: NaiveDate) -> Markers {
    let important = text.contains(IMPORTANT);
    let mut rest = strip_all(text, IMPORTANT);

    if rest.contains(NO_DUE_DATE) {
        return Markers {
            due: DueMarker::Clear,
            important,
            text: strip_all(&rest, NO_DUE_DATE),
        };
    }

    if let Some(caps) = EXPLICIT_DUE_RE.captures(&rest) {
        let whole = caps.get(1).map(|m| (m.start(), m.end()));
        let parts = (
            caps[2].parse::<u32>().ok(),
            caps[3].parse::<u32>().ok(),
            caps[4].parse::<i32>().ok(),
        );
        if let ((Some(first), Some(second), Some(year)), Some((start, end))) = (parts, whole) {
            if let Some(date) = parse_day_first(first, second, year) {
                return Markers {
                    due: DueMarker::Set(local_midnight(date)),
                    important,
                    text: remove_span(&rest, start, end),
                };
            }
        }
        tracing::debug!(marker = &caps[1], "due marker matches no calendar date");
    }

    if BARE_DUE_RE.is_match(&rest) {
        return Markers {
            due: DueMarker::Absent,
            important,
            text: rest,
        };
    }

    let mut due = DueMarker::Absent;
    for (marker, date) in relative_markers(today) {
        if rest.contains(marker) {
            due = DueMarker::Set(local_midnight(date));
            rest = strip_all(&rest, marker);
            break;
        }
    }

    Markers {
        due,
        important,
        text: rest,
    }
}

/// Interpret `first/second/year` as day/month, falling back to month/day.
/// Day-first wins when both readings are valid dates.
pub fn parse_day_first(first: u32, second: u32, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

fn relative_markers(today: NaiveDate) -> [(&'static str, NaiveDate); 4] {
    let next_month = today.checked_add_months(Months::new(1)).unwrap_or(today);
    [
        (TODAY, today),
        (TOMORROW, days_from(today, 1)),
        (NEXT_WEEK, days_from(today, 7)),
        (NEXT_MONTH, next_month),
    ]
}

fn strip_all(text: &str, marker: &str) -> String {
    let mut out = text.to_string();
    while let Some(start) = out.find(marker) {
        out = remove_span(&out, start, start + marker.len());
    }
    out.trim().to_string()
}

/// Cut `text[start..end]` plus one neighbouring space so no double gap is
/// left. A span glued to the word before it keeps the space after it.
fn remove_span(text: &str, start: usize, end: usize) -> String {
    let bytes = text.as_bytes();
    let is_space = |i: usize| matches!(bytes.get(i), Some(b' ' | b'\t'));
    let (mut start, mut end) = (start, end);
    if start > 0 && is_space(start - 1) {
        start -= 1;
    } else if start == 0 && is_space(end) {
        end += 1;
    }
    format!("{}{}", &text[..start], &text[end..]).trim().to_string()
}
