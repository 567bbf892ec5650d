//! Due-date urgency: one taxonomy shared by display formatting, filtering and
//! recommendation weighting.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Day-first, matching the `due:D/M/YYYY` input marker.
pub const DATE_FMT: &str = "%d/%m/%Y";
pub const SHORT_DATE_FMT: &str = "%b %-d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    Overdue,
    Today,
    Tomorrow,
    /// Two to seven days out.
    Week,
    Later,
}

impl Urgency {
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d < 0 => Urgency::Overdue,
            0 => Urgency::Today,
            1 => Urgency::Tomorrow,
            2..=7 => Urgency::Week,
            _ => Urgency::Later,
        }
    }

    pub fn of(due: &DateTime<Utc>, today: NaiveDate) -> Self {
        Self::from_days(days_until(due, today))
    }

    /// Factor applied to a note's selection weight.
    pub fn weight_multiplier(self) -> f64 {
        match self {
            Urgency::Overdue => 3.0,
            Urgency::Today => 2.5,
            Urgency::Tomorrow => 2.0,
            Urgency::Week => 1.5,
            Urgency::Later => 1.0,
        }
    }

    pub fn color(self) -> (u8, u8, u8) {
        match self {
            Urgency::Overdue => (244, 67, 54),
            Urgency::Today => (255, 152, 0),
            Urgency::Tomorrow => (255, 193, 7),
            Urgency::Week | Urgency::Later => (76, 175, 80),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Overdue => "overdue",
            Urgency::Today => "today",
            Urgency::Tomorrow => "tomorrow",
            Urgency::Week => "week",
            Urgency::Later => "later",
        }
    }
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Calendar day (local time) a due timestamp falls on.
pub fn due_day(due: &DateTime<Utc>) -> NaiveDate {
    due.with_timezone(&Local).date_naive()
}

/// Whole days from `today` to the due day; negative when overdue.
pub fn days_until(due: &DateTime<Utc>, today: NaiveDate) -> i64 {
    (due_day(due) - today).num_days()
}

pub fn urgency_bucket(due: &DateTime<Utc>, today: NaiveDate) -> Urgency {
    Urgency::of(due, today)
}

/// Weight factor for an optional due date; no due date is neutral.
pub fn urgency_multiplier(due: Option<&DateTime<Utc>>, today: NaiveDate) -> f64 {
    due.map_or(1.0, |d| Urgency::of(d, today).weight_multiplier())
}

/// Local midnight of `date`, as a UTC instant.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

pub fn days_from(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_add_days(Days::new(days)).unwrap_or(today)
}

pub fn format_due_date(due: &DateTime<Utc>, today: NaiveDate) -> String {
    let days = days_until(due, today);
    let day = due_day(due);
    match Urgency::from_days(days) {
        Urgency::Overdue => format!("Overdue: {}", day.format(DATE_FMT)),
        Urgency::Today => "Due Today".to_string(),
        Urgency::Tomorrow => "Due Tomorrow".to_string(),
        Urgency::Week if days == 7 => "Due Next Week".to_string(),
        Urgency::Week => format!("Due in {days} days"),
        Urgency::Later => format!("Due: {}", day.format(DATE_FMT)),
    }
}

pub fn format_short_due_date(due: &DateTime<Utc>, today: NaiveDate) -> String {
    match Urgency::of(due, today) {
        Urgency::Overdue => "Overdue!".to_string(),
        Urgency::Today => "Today".to_string(),
        Urgency::Tomorrow => "Tomorrow".to_string(),
        Urgency::Week | Urgency::Later => {
            due_day(due).format(SHORT_DATE_FMT).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn due_in(days: i64) -> DateTime<Utc> {
        let date = if days >= 0 {
            today() + Days::new(days as u64)
        } else {
            today() - Days::new(days.unsigned_abs())
        };
        local_midnight(date)
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(urgency_bucket(&due_in(-1), today()), Urgency::Overdue);
        assert_eq!(urgency_bucket(&due_in(0), today()), Urgency::Today);
        assert_eq!(urgency_bucket(&due_in(1), today()), Urgency::Tomorrow);
        assert_eq!(urgency_bucket(&due_in(2), today()), Urgency::Week);
        assert_eq!(urgency_bucket(&due_in(7), today()), Urgency::Week);
        assert_eq!(urgency_bucket(&due_in(8), today()), Urgency::Later);
    }

    #[test]
    fn test_multipliers() {
        let t = today();
        assert_eq!(urgency_multiplier(None, t), 1.0);
        assert_eq!(urgency_multiplier(Some(&due_in(-3)), t), 3.0);
        assert_eq!(urgency_multiplier(Some(&due_in(0)), t), 2.5);
        assert_eq!(urgency_multiplier(Some(&due_in(1)), t), 2.0);
        assert_eq!(urgency_multiplier(Some(&due_in(5)), t), 1.5);
        assert_eq!(urgency_multiplier(Some(&due_in(30)), t), 1.0);
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let late = due_in(1) + chrono::Duration::hours(23);
        assert_eq!(days_until(&late, today()), 1);
    }

    #[test]
    fn test_format_due_date_labels() {
        let t = today();
        assert_eq!(format_due_date(&due_in(-2), t), "Overdue: 08/03/2025");
        assert_eq!(format_due_date(&due_in(0), t), "Due Today");
        assert_eq!(format_due_date(&due_in(1), t), "Due Tomorrow");
        assert_eq!(format_due_date(&due_in(3), t), "Due in 3 days");
        assert_eq!(format_due_date(&due_in(7), t), "Due Next Week");
        assert_eq!(format_due_date(&due_in(21), t), "Due: 31/03/2025");
    }

    #[test]
    fn test_format_short_due_date_labels() {
        let t = today();
        assert_eq!(format_short_due_date(&due_in(-1), t), "Overdue!");
        assert_eq!(format_short_due_date(&due_in(0), t), "Today");
        assert_eq!(format_short_due_date(&due_in(1), t), "Tomorrow");
        assert_eq!(format_short_due_date(&due_in(5), t), "Mar 15");
    }

    #[test]
    fn test_presentation_shares_taxonomy() {
        assert_eq!(Urgency::Overdue.color(), (244, 67, 54));
        assert_eq!(Urgency::Later.color(), Urgency::Week.color());
    }
}
