use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::DEFAULT_SYNC_MINUTES;

pub const DIR_VAR: &str = "VAATA_MIND_DIR";
pub const REMOTE_VAR: &str = "VAATA_MIND_REMOTE";
pub const SYNC_MINUTES_VAR: &str = "VAATA_MIND_SYNC_MINUTES";
pub const LOG_VAR: &str = "VAATA_MIND_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub notes_dir: PathBuf,
    pub remote_dir: Option<PathBuf>,
    pub sync_interval: Duration,
    pub use_color: bool,
}

impl Settings {
    pub fn from_env() -> io::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> io::Result<Self> {
        let notes_dir = match lookup(DIR_VAR).filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").ok_or_else(|| {
                    io::Error::other(format!("HOME not set; set {DIR_VAR} explicitly"))
                })?;
                PathBuf::from(home).join(".vaata_mind")
            }
        };
        let remote_dir = lookup(REMOTE_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let minutes = match lookup(SYNC_MINUTES_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(m) if m > 0 => m,
                _ => {
                    tracing::warn!(
                        "Ignoring {SYNC_MINUTES_VAR}={raw:?}; using {DEFAULT_SYNC_MINUTES}"
                    );
                    DEFAULT_SYNC_MINUTES
                }
            },
            None => DEFAULT_SYNC_MINUTES,
        };
        Ok(Self {
            notes_dir,
            remote_dir,
            sync_interval: Duration::from_secs(minutes * 60),
            use_color: lookup("NO_COLOR").is_none(),
        })
    }
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> io::Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_from_home() {
        let s = settings(&[("HOME", "/home/me")]).unwrap();
        assert_eq!(s.notes_dir, PathBuf::from("/home/me/.vaata_mind"));
        assert_eq!(s.remote_dir, None);
        assert_eq!(s.sync_interval, Duration::from_secs(300));
        assert!(s.use_color);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            (DIR_VAR, "/tmp/notes"),
            (REMOTE_VAR, "/tmp/cloud"),
            (SYNC_MINUTES_VAR, "2"),
            ("NO_COLOR", "1"),
        ])
        .unwrap();
        assert_eq!(s.notes_dir, PathBuf::from("/tmp/notes"));
        assert_eq!(s.remote_dir, Some(PathBuf::from("/tmp/cloud")));
        assert_eq!(s.sync_interval, Duration::from_secs(120));
        assert!(!s.use_color);
    }

    #[test]
    fn test_bad_interval_falls_back() {
        let s = settings(&[("HOME", "/h"), (SYNC_MINUTES_VAR, "0")]).unwrap();
        assert_eq!(s.sync_interval, Duration::from_secs(300));
        let s = settings(&[("HOME", "/h"), (SYNC_MINUTES_VAR, "soon")]).unwrap();
        assert_eq!(s.sync_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_home_is_an_error() {
        assert!(settings(&[]).is_err());
    }
}
