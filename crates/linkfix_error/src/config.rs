//! Configuration error types.

/// Configuration error with source location.
///
/// Raised while assembling the bot configuration from its layered sources,
/// or when a loaded value is out of range.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// What went wrong, including the offending source or field
    pub message: String,
    /// Dotted path of the setting involved, when known
    pub setting: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkfix_error::ConfigError;
    ///
    /// let err = ConfigError::new("Failed to parse linkfix.toml");
    /// assert!(err.message.contains("linkfix.toml"));
    /// assert!(err.setting.is_none());
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            setting: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create an error about one specific setting.
    ///
    /// ```
    /// use linkfix_error::ConfigError;
    ///
    /// let err = ConfigError::invalid("store.flush_interval_secs", "must be greater than zero");
    /// assert_eq!(err.setting.as_deref(), Some("store.flush_interval_secs"));
    /// ```
    #[track_caller]
    pub fn invalid(setting: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        let setting = setting.into();
        let location = std::panic::Location::caller();
        Self {
            message: format!("{}: {}", setting, reason),
            setting: Some(setting),
            line: location.line(),
            file: location.file(),
        }
    }
}
