//! Document store error types.

/// Kinds of document store errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StoreErrorKind {
    /// Failed to create a directory for a document
    #[display("Failed to create directory: {}", _0)]
    DirectoryCreation(String),
    /// Failed to write a document
    #[display("Failed to write document: {}", _0)]
    FileWrite(String),
    /// Failed to read a document
    #[display("Failed to read document: {}", _0)]
    FileRead(String),
    /// No persisted bytes exist for the key
    #[display("Document not found: {}", _0)]
    NotFound(String),
    /// Document could not be encoded or decoded
    #[display("Serialization failed: {}", _0)]
    Serialization(String),
    /// `update` was called on a key that was never loaded
    #[display("No cached data for {}", _0)]
    NotCached(String),
    /// The cached document changed while a write was in flight
    #[display("Document changed during write: {}", _0)]
    Conflict(String),
    /// Every attempt of an atomic update failed
    #[display("Atomic update of {} failed after {} attempts", key, attempts)]
    RetryExhausted {
        /// Document key being updated
        key: String,
        /// Number of attempts made
        attempts: u32,
    },
}

/// Document store error with location tracking.
///
/// A `RetryExhausted` error carries the last underlying failure, reachable
/// through [`std::error::Error::source`].
///
/// # Examples
///
/// ```
/// use linkfix_error::{StoreError, StoreErrorKind};
///
/// let err = StoreError::new(StoreErrorKind::NotCached("requests.json".to_string()));
/// assert!(format!("{}", err).contains("No cached data"));
/// assert!(err.is_not_cached());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Store Error: {} at line {} in {}", kind, line, file)]
pub struct StoreError {
    kind: StoreErrorKind,
    #[error(source)]
    cause: Option<Box<StoreError>>,
    line: u32,
    file: &'static str,
}

impl StoreError {
    /// Create a new store error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StoreErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            cause: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Build a `RetryExhausted` error wrapping the last failure.
    #[track_caller]
    pub fn retry_exhausted(key: impl Into<String>, attempts: u32, last: StoreError) -> Self {
        let mut err = Self::new(StoreErrorKind::RetryExhausted {
            key: key.into(),
            attempts,
        });
        err.cause = Some(Box::new(last));
        err
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StoreErrorKind {
        &self.kind
    }

    /// Line where the error was created.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// File where the error was created.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// I/O failures and write conflicts are transient; encoding problems and
    /// cache misuse are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::DirectoryCreation(_)
                | StoreErrorKind::FileWrite(_)
                | StoreErrorKind::FileRead(_)
                | StoreErrorKind::Conflict(_)
        )
    }

    /// Whether this is a `NotCached` error.
    pub fn is_not_cached(&self) -> bool {
        matches!(self.kind, StoreErrorKind::NotCached(_))
    }
}

/// Result type for document store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn retry_exhausted_exposes_last_error_as_source() {
        let last = StoreError::new(StoreErrorKind::FileWrite("disk full".to_string()));
        let err = StoreError::retry_exhausted("requests.json", 3, last);

        assert_eq!(
            err.kind(),
            &StoreErrorKind::RetryExhausted {
                key: "requests.json".to_string(),
                attempts: 3,
            }
        );
        let source = err.source().expect("cause attached");
        assert!(source.to_string().contains("disk full"));
        assert!(!err.is_transient());
    }

    #[test]
    fn io_kinds_are_transient() {
        assert!(StoreError::new(StoreErrorKind::FileRead("x".into())).is_transient());
        assert!(StoreError::new(StoreErrorKind::FileWrite("x".into())).is_transient());
        assert!(StoreError::new(StoreErrorKind::Conflict("x".into())).is_transient());
        assert!(!StoreError::new(StoreErrorKind::Serialization("x".into())).is_transient());
        assert!(!StoreError::new(StoreErrorKind::NotCached("x".into())).is_transient());
    }

    #[test]
    fn display_includes_kind_and_location() {
        let err = StoreError::new(StoreErrorKind::NotFound("requests.json".to_string()));
        let text = err.to_string();
        assert!(text.starts_with("Store Error: Document not found: requests.json at line"));
        assert!(text.contains(err.file()));
        assert!(err.source().is_none());
    }
}
