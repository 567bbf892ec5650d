use thiserror::Error;

/// Errors surfaced by the note library.
///
/// Unknown ids on lookups are `Option`s, not errors; `NotFound` only shows up
/// where a caller asked to mutate something that is gone.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Note {id} not found")]
    NotFound { id: String },

    #[error("Invalid import: {reason}")]
    InvalidImport { reason: String },

    #[error("Sync failed: {reason}")]
    Sync { reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub fn invalid_import(reason: impl Into<String>) -> Self {
        Self::InvalidImport {
            reason: reason.into(),
        }
    }

    pub fn sync(reason: impl Into<String>) -> Self {
        Self::Sync {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("n-1");
        assert_eq!(err.to_string(), "Note n-1 not found");
    }

    #[test]
    fn test_import_and_sync_messages() {
        assert_eq!(
            Error::invalid_import("missing notes array").to_string(),
            "Invalid import: missing notes array"
        );
        assert_eq!(Error::sync("offline").to_string(), "Sync failed: offline");
    }
}
