//! Configuration management.
//!
//! All configuration is environment-driven. The binary loads `.env` via
//! `dotenvy` before reading; library consumers can also construct
//! [`MemoryConfig`] directly, which is what the test suite does.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

/// Environment variable overriding the base storage path.
///
/// May name either a directory or a file; a value with a file extension is
/// resolved to its parent directory.
pub const ENV_STORAGE_PATH: &str = "ENGRAM_STORAGE_PATH";

/// Environment variable for the storage size ceiling in bytes.
pub const ENV_MAX_STORAGE_SIZE: &str = "ENGRAM_MAX_STORAGE_SIZE";

/// Environment variable for the advisory data retention window in days.
pub const ENV_DATA_RETENTION_DAYS: &str = "ENGRAM_DATA_RETENTION_DAYS";

/// Environment variable holding the encryption passphrase.
///
/// Presence enables AES-256-GCM encryption at rest for every namespace file.
pub const ENV_ENCRYPTION_PASSWORD: &str = "ENGRAM_ENCRYPTION_PASSWORD";

/// Environment variable toggling the fuzzy search layer.
pub const ENV_FUZZY_SEARCH: &str = "ENGRAM_FUZZY_SEARCH";

/// Default storage size ceiling (500 MiB).
pub const DEFAULT_MAX_STORAGE_SIZE: u64 = 500 * 1024 * 1024;

/// Default advisory retention window in days.
pub const DEFAULT_DATA_RETENTION_DAYS: u64 = 180;

/// Dotfolder under the user's home directory used when no override is set.
const DEFAULT_BASE_DIR: &str = ".engram";

/// Main configuration for the memory subsystem.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Base directory holding one subdirectory per namespace.
    pub base_path: PathBuf,
    /// Whether the fuzzy search layer runs after exact/substring matching.
    pub fuzzy_search: bool,
    /// Storage size ceiling in bytes, checked around every save.
    pub max_storage_size: u64,
    /// Advisory retention window in days, checked on every load.
    pub data_retention_days: u64,
    /// Encryption passphrase; presence enables encryption at rest.
    pub encryption_password: Option<SecretString>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            fuzzy_search: true,
            max_storage_size: DEFAULT_MAX_STORAGE_SIZE,
            data_retention_days: DEFAULT_DATA_RETENTION_DAYS,
            encryption_password: None,
        }
    }
}

impl MemoryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the environment.
    ///
    /// Unset or unparseable variables fall back to their defaults; this
    /// loader never fails.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ENV_STORAGE_PATH) {
            if !raw.trim().is_empty() {
                config.base_path = resolve_base_path(&raw);
            }
        }

        if let Ok(raw) = std::env::var(ENV_MAX_STORAGE_SIZE) {
            if let Ok(size) = raw.trim().parse::<u64>() {
                if size > 0 {
                    config.max_storage_size = size;
                }
            }
        }

        if let Ok(raw) = std::env::var(ENV_DATA_RETENTION_DAYS) {
            if let Ok(days) = raw.trim().parse::<u64>() {
                if days > 0 {
                    config.data_retention_days = days;
                }
            }
        }

        if let Ok(raw) = std::env::var(ENV_FUZZY_SEARCH) {
            if let Some(enabled) = parse_bool(&raw) {
                config.fuzzy_search = enabled;
            }
        }

        if let Ok(password) = std::env::var(ENV_ENCRYPTION_PASSWORD) {
            if !password.is_empty() {
                config.encryption_password = Some(SecretString::from(password));
            }
        }

        config
    }

    /// Returns true when encryption at rest is enabled.
    #[must_use]
    pub const fn encryption_enabled(&self) -> bool {
        self.encryption_password.is_some()
    }

    /// Sets the base storage path.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Toggles the fuzzy search layer.
    #[must_use]
    pub const fn with_fuzzy_search(mut self, enabled: bool) -> Self {
        self.fuzzy_search = enabled;
        self
    }

    /// Sets the storage size ceiling in bytes.
    #[must_use]
    pub const fn with_max_storage_size(mut self, bytes: u64) -> Self {
        self.max_storage_size = bytes;
        self
    }

    /// Sets the advisory retention window in days.
    #[must_use]
    pub const fn with_data_retention_days(mut self, days: u64) -> Self {
        self.data_retention_days = days;
        self
    }

    /// Sets the encryption passphrase, enabling encryption at rest.
    #[must_use]
    pub fn with_encryption_password(mut self, password: impl Into<String>) -> Self {
        self.encryption_password = Some(SecretString::from(password.into()));
        self
    }
}

/// Resolves a storage path override to a base directory.
///
/// A value naming a file (anything with an extension) resolves to its parent
/// directory; relative paths are anchored at the current working directory.
fn resolve_base_path(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    if absolute.extension().is_some() {
        absolute
            .parent()
            .map_or_else(|| absolute.clone(), Path::to_path_buf)
    } else {
        absolute
    }
}

/// Returns the default base directory (`~/.engram`).
fn default_base_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(DEFAULT_BASE_DIR),
        |dirs| dirs.home_dir().join(DEFAULT_BASE_DIR),
    )
}

/// Parses a boolean environment value.
///
/// Accepts the usual spellings; anything else is `None` so the caller keeps
/// its default.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "off" => Some(false),
        _ => None,
    }
}
