//! Layered bot configuration.
//!
//! Sources, later ones overriding earlier ones:
//! - Bundled defaults (`include_str!` of the workspace `linkfix.toml`)
//! - `~/.config/linkfix/linkfix.toml`
//! - `./linkfix.toml`
//! - `LINKFIX_<SECTION>__<KEY>` environment variables

use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use linkfix_error::{ConfigError, LinkfixResult};
use linkfix_rate_limit::RateLimitConfig;
use linkfix_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../linkfix.toml");

/// The `[store]` table: where documents live plus the store tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct StoreSettings {
    /// Directory holding every persisted document
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    /// Flush interval and atomic update retries
    #[serde(flatten)]
    store_config: StoreConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_config: StoreConfig::default(),
        }
    }
}

/// The `[documents]` table: document keys used by bot features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct DocumentPaths {
    /// Image macro definitions
    macros: String,
    /// Feature requests
    requests: String,
    /// RPG player records
    rpg_players: String,
    /// RPG channel settings
    rpg_channels: String,
    /// RPG world state
    rpg_game_state: String,
}

impl DocumentPaths {
    /// Every configured key, paired with its setting name.
    pub fn all(&self) -> [(&'static str, &str); 5] {
        [
            ("macros", &self.macros),
            ("requests", &self.requests),
            ("rpg_players", &self.rpg_players),
            ("rpg_channels", &self.rpg_channels),
            ("rpg_game_state", &self.rpg_game_state),
        ]
    }
}

impl Default for DocumentPaths {
    fn default() -> Self {
        Self {
            macros: "image_macros.json".to_string(),
            requests: "requests.json".to_string(),
            rpg_players: "rpg/players.json".to_string(),
            rpg_channels: "rpg/channels.json".to_string(),
            rpg_game_state: "rpg/game_state.json".to_string(),
        }
    }
}

/// The `[logging]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", into)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    level: String,
    /// Emit JSON lines instead of human-readable output
    json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete linkfix configuration.
///
/// # Example
///
/// ```no_run
/// use linkfix::LinkfixConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = LinkfixConfig::load()?;
/// println!("documents live in {}", config.store().data_dir().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct LinkfixConfig {
    /// Document store settings
    #[serde(default)]
    store: StoreSettings,
    /// Rate limiter settings
    #[serde(default)]
    rate_limit: RateLimitConfig,
    /// Cooldown per action, in seconds
    #[serde(default)]
    cooldowns: BTreeMap<String, u64>,
    /// Document keys
    #[serde(default)]
    documents: DocumentPaths,
    /// Logging settings
    #[serde(default)]
    logging: LoggingConfig,
}

impl LinkfixConfig {
    /// Load every layer and validate the result.
    ///
    /// Missing user files are skipped silently.
    ///
    /// # Errors
    ///
    /// A `ConfigError` if a present source cannot be parsed, or if a value
    /// fails [`validate`](Self::validate).
    #[instrument]
    pub fn load() -> LinkfixResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/linkfix/linkfix.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("linkfix").required(false))
            .add_source(
                Environment::with_prefix("LINKFIX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?;
        Self::finish(config)
    }

    /// Load a single explicit file; absent settings take their defaults.
    ///
    /// # Errors
    ///
    /// A `ConfigError` if the file is missing, malformed or invalid.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> LinkfixResult<Self> {
        debug!("Loading configuration from file");

        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;
        Self::finish(config)
    }

    /// Parse TOML text directly.
    pub fn from_toml(text: &str) -> LinkfixResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        Self::finish(config)
    }

    fn finish(config: Config) -> LinkfixResult<Self> {
        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject values the runtime cannot honor.
    ///
    /// # Errors
    ///
    /// A `ConfigError` naming the first offending setting.
    pub fn validate(&self) -> LinkfixResult<()> {
        let store = &self.store.store_config;
        if *store.flush_interval_secs() == 0 {
            return Err(ConfigError::invalid(
                "store.flush_interval_secs",
                "must be greater than zero",
            ).into());
        }
        if *store.max_retries() == 0 {
            return Err(ConfigError::invalid(
                "store.max_retries",
                "at least one attempt is required",
            ).into());
        }
        if *self.rate_limit.window_secs() == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.window_secs",
                "must be greater than zero",
            ).into());
        }
        if *self.rate_limit.cleanup_interval_secs() == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.cleanup_interval_secs",
                "must be greater than zero",
            ).into());
        }
        if *self.rate_limit.burst().window_ms() == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.burst.window_ms",
                "must be greater than zero",
            ).into());
        }
        for (name, key) in self.documents.all() {
            if !is_relative_key(key) {
                return Err(ConfigError::invalid(
                    format!("documents.{}", name),
                    format!("'{}' must be a relative path inside the data directory", key),
                ).into());
            }
        }
        Ok(())
    }

    /// Configured cooldown for `action`.
    pub fn cooldown(&self, action: &str) -> Option<Duration> {
        self.cooldowns.get(action).copied().map(Duration::from_secs)
    }

    /// Copy with a different data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.store = self.store.with_data_dir(data_dir.into());
        self
    }
}

fn is_relative_key(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
