use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;

use crate::filter::{DueFilter, Importance, NoteFilter};
use crate::markers::{DueMarker, extract_markers_on};
use crate::note::Progress;

pub struct ArgParser {
    iter: std::vec::IntoIter<String>,
    command_name: String,
}

impl ArgParser {
    pub fn new(args: Vec<String>, command_name: &str) -> Self {
        Self {
            iter: args.into_iter(),
            command_name: command_name.to_string(),
        }
    }

    /// Extract a single tag from -t/--tag flag
    pub fn extract_tag(&mut self) -> Result<String, Box<dyn Error>> {
        match self.iter.next() {
            Some(v) => {
                let tag = crate::tags::normalize_tag(&v);
                if tag.is_empty() {
                    Err(format!(
                        "Invalid tag provided to {}",
                        self.command_name
                    )
                    .into())
                } else {
                    Ok(tag)
                }
            }
            None => Err(format!(
                "Provide a tag after -t/--tag for {}",
                self.command_name
            )
            .into()),
        }
    }

    /// Extract a string value for a flag
    pub fn extract_value(
        &mut self,
        flag: &str,
    ) -> Result<String, Box<dyn Error>> {
        self.iter.next().ok_or_else(|| {
            format!("Provide a value after {} for {}", flag, self.command_name)
                .into()
        })
    }

    /// Extract and parse a value for a flag
    pub fn extract_parsed<T>(&mut self, flag: &str) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.extract_value(flag)?;
        raw.parse::<T>().map_err(|e| {
            format!("Invalid value for {} in {}: {e}", flag, self.command_name)
                .into()
        })
    }

    /// Get next positional argument
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<String> {
        self.iter.next()
    }

    pub fn unknown_flag(&self, flag: &str) -> Box<dyn Error> {
        format!("Unknown flag for {}: {flag}", self.command_name).into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Updated,
    Created,
    Due,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated" => Ok(SortField::Updated),
            "created" => Ok(SortField::Created),
            "due" => Ok(SortField::Due),
            other => Err(format!(
                "unknown sort field {other} (expected created|updated|due)"
            )),
        }
    }
}

/// Flags accepted by `list`.
#[derive(Debug, Clone)]
pub struct ListFlags {
    pub filter: NoteFilter,
    pub sort_field: SortField,
    /// Explicit `--asc`/`--desc`; otherwise due sorts ascending and the
    /// timestamps descending.
    pub ascending: Option<bool>,
    pub relative_time: bool,
}

impl ListFlags {
    pub fn ascending(&self) -> bool {
        self.ascending.unwrap_or(self.sort_field == SortField::Due)
    }
}

pub fn parse_list_flags(args: Vec<String>) -> Result<ListFlags, Box<dyn Error>> {
    let mut parser = ArgParser::new(args, "list");
    let mut flags = ListFlags {
        filter: NoteFilter::table(),
        sort_field: SortField::default(),
        ascending: None,
        relative_time: false,
    };
    while let Some(arg) = parser.next() {
        match arg.as_str() {
            "-s" | "--search" => {
                let text = parser.extract_value(&arg)?;
                flags.filter = flags.filter.text(text);
            }
            "-t" | "--tag" => {
                let tag = parser.extract_tag()?;
                flags.filter = flags.filter.tag(&tag);
            }
            "-p" | "--progress" => {
                flags.filter.progress = Some(parser.extract_parsed::<Progress>(&arg)?);
            }
            "-i" | "--importance" => {
                flags.filter.importance = parser.extract_parsed::<Importance>(&arg)?;
            }
            "--important" => flags.filter.importance = Importance::Important,
            "-d" | "--due" => {
                flags.filter.due = parser.extract_parsed::<DueFilter>(&arg)?;
            }
            "-a" | "--all" => flags.filter.hide_done = false,
            "--sort" => flags.sort_field = parser.extract_parsed::<SortField>(&arg)?,
            "--asc" => flags.ascending = Some(true),
            "--desc" => flags.ascending = Some(false),
            "-r" | "--relative" => flags.relative_time = true,
            other => return Err(parser.unknown_flag(other)),
        }
    }
    Ok(flags)
}

/// Changes requested by `edit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditFlags {
    pub text: Vec<String>,
    pub progress: Option<Progress>,
    pub important: Option<bool>,
    pub due: Option<Option<DateTime<Utc>>>,
}

impl EditFlags {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.progress.is_none()
            && self.important.is_none()
            && self.due.is_none()
    }
}

pub fn parse_edit_flags(
    mut parser: ArgParser,
    today: NaiveDate,
) -> Result<EditFlags, Box<dyn Error>> {
    let mut flags = EditFlags::default();
    while let Some(arg) = parser.next() {
        match arg.as_str() {
            "-p" | "--progress" => {
                flags.progress = Some(parser.extract_parsed::<Progress>(&arg)?);
            }
            "--important" => flags.important = Some(true),
            "--not-important" => flags.important = Some(false),
            "--due" => {
                let value = parser.extract_value(&arg)?;
                let due = parse_due_value(&value, today).ok_or_else(|| {
                    format!(
                        "Unrecognised due date: {value} \
                         (use D/M/YYYY, today, tomorrow, nextweek or nextmonth)"
                    )
                })?;
                flags.due = Some(Some(due));
            }
            "--no-due" => flags.due = Some(None),
            other if other.starts_with("--") => return Err(parser.unknown_flag(other)),
            _ => flags.text.push(arg),
        }
    }
    Ok(flags)
}

/// Due date from a flag value: `D/M/YYYY` or a relative keyword.
pub fn parse_due_value(value: &str, today: NaiveDate) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_start_matches('!');
    let marker = if value.contains('/') {
        format!("due:{value}")
    } else {
        format!("!{}", value.to_ascii_lowercase())
    };
    let parsed = extract_markers_on(&marker, today);
    match parsed.due {
        DueMarker::Set(due) if parsed.text.is_empty() => Some(due),
        _ => None,
    }
}
