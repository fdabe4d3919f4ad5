//! Top-level error wrapper types.

use crate::{ConfigError, StoreError};

/// The foundation error enum for linkfix.
///
/// # Examples
///
/// ```
/// use linkfix_error::{LinkfixError, StoreError, StoreErrorKind};
///
/// let store_err = StoreError::new(StoreErrorKind::FileWrite("permission denied".into()));
/// let err: LinkfixError = store_err.into();
/// assert!(format!("{}", err).contains("Store Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum LinkfixErrorKind {
    /// Document store error
    #[from(StoreError)]
    Store(StoreError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Linkfix error with kind discrimination.
///
/// # Examples
///
/// ```
/// use linkfix_error::{ConfigError, LinkfixErrorKind, LinkfixResult};
///
/// fn might_fail() -> LinkfixResult<()> {
///     Err(ConfigError::new("Missing [store] section"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(matches!(err.kind(), LinkfixErrorKind::Config(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Linkfix Error: {}", _0)]
pub struct LinkfixError(Box<LinkfixErrorKind>);

impl LinkfixError {
    /// Create a new error from a kind.
    pub fn new(kind: LinkfixErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &LinkfixErrorKind {
        &self.0
    }

    /// The store error, if this wraps one.
    pub fn as_store(&self) -> Option<&StoreError> {
        match self.kind() {
            LinkfixErrorKind::Store(err) => Some(err),
            _ => None,
        }
    }
}

// Generic From implementation for any type that converts to LinkfixErrorKind
impl<T> From<T> for LinkfixError
where
    T: Into<LinkfixErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for linkfix operations.
pub type LinkfixResult<T> = std::result::Result<T, LinkfixError>;
