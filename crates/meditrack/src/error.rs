//! Error types for meditrack.
//!
//! Every fallible operation in the crate returns [`Error`]. Callers that need
//! to decide how to present a failure use [`Error::kind`], which collapses the
//! variants into the small taxonomy the journal views report on.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::store::Collection;

/// The main error type for meditrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored document does not match the schema of its collection.
    #[error("invalid {collection} record {id}: {message}")]
    InvalidRecord {
        /// Collection the document was read from.
        collection: Collection,
        /// Identifier of the offending document.
        id: String,
        /// What failed to decode.
        message: String,
    },

    /// The addressed record does not exist.
    #[error("{collection} record not found: {id}")]
    NotFound {
        /// Collection that was addressed.
        collection: Collection,
        /// The missing identifier.
        id: String,
    },

    /// The store refused the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // === Journal Errors ===
    /// A form submission failed validation before reaching the store.
    #[error("{field}: {message}")]
    Validation {
        /// The offending form field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// No identity is signed in.
    #[error("not signed in; run `meditrack login` first")]
    NotSignedIn,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for meditrack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a failure, used for user-facing reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Input was rejected before any store call was made.
    Validation,
    /// The store rejected the operation.
    PermissionDenied,
    /// The addressed record does not exist.
    NotFound,
    /// The store could not be reached.
    Unavailable,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::PermissionDenied => write!(f, "permission-denied"),
            Self::NotFound => write!(f, "not-found"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for a form field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Create a permission error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation { .. } => FailureKind::Validation,
            Self::PermissionDenied(_) | Self::NotSignedIn => FailureKind::PermissionDenied,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::DatabaseOpen { .. } => FailureKind::Unavailable,
            Self::DatabaseQuery(err) => sqlite_failure_kind(err),
            _ => FailureKind::Unknown,
        }
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.kind() == FailureKind::Validation
    }

    /// Check if this error is a not-found failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == FailureKind::NotFound
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        self.kind() == FailureKind::PermissionDenied
    }
}

fn sqlite_failure_kind(err: &rusqlite::Error) -> FailureKind {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied
            | ErrorCode::AuthorizationForStatementDenied,
        ) => FailureKind::PermissionDenied,
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure,
        ) => FailureKind::Unavailable,
        _ => FailureKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = Error::validation("anonymousId", "is required");
        assert_eq!(err.to_string(), "anonymousId: is required");
        assert!(err.is_validation());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found(Collection::Patients, "abc");
        assert_eq!(err.to_string(), "patients record not found: abc");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_permission_denied_is_verbatim() {
        let err = Error::permission_denied("record belongs to another owner");
        assert!(err.to_string().contains("record belongs to another owner"));
        assert!(err.is_permission_error());
    }

    #[test]
    fn test_not_signed_in_is_permission_kind() {
        assert_eq!(Error::NotSignedIn.kind(), FailureKind::PermissionDenied);
    }

    #[test]
    fn test_unavailable_kind() {
        let err = Error::DatabaseOpen {
            path: "/nonexistent/meditrack.db".into(),
            source: rusqlite::Error::InvalidQuery,
        };
        assert_eq!(err.kind(), FailureKind::Unavailable);
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
        assert_eq!(err.kind(), FailureKind::Unknown);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::PermissionDenied.to_string(), "permission-denied");
        assert_eq!(FailureKind::NotFound.to_string(), "not-found");
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert_eq!(err.kind(), FailureKind::Unavailable);
        }
    }

    #[test]
    fn test_readonly_write_is_permission_denied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("CREATE TABLE t (x INTEGER)", [])
            .unwrap();

        let conn = rusqlite::Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .unwrap();
        let err: Error = conn
            .execute("INSERT INTO t (x) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), FailureKind::PermissionDenied);
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_invalid_record_display() {
        let err = Error::InvalidRecord {
            collection: Collection::ProfessionalGoals,
            id: "g1".to_string(),
            message: "missing field `goal`".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("professionalGoals"));
        assert!(msg.contains("missing field"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "histogram_days must be between 1 and 90".to_string(),
        };
        assert!(err.to_string().contains("histogram_days"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
