//! Configuration management for meditrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Category;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "meditrack";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "journal.db";

/// Default session file name.
const SESSION_FILE_NAME: &str = "session.json";

/// Upper bound for the dashboard histogram window.
const MAX_HISTOGRAM_DAYS: u32 = 90;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `MEDITRACK_`, sections split on `__`)
/// 2. TOML config file at `~/.config/meditrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Signed-in identity profile.
    pub identity: IdentityConfig,
    /// Journal form defaults and dashboard settings.
    pub journal: JournalConfig,
    /// Privacy checks for anonymized patient codes.
    pub privacy: PrivacyConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/meditrack/journal.db`
    pub database_path: Option<PathBuf>,
    /// Open the database read-only. Every write then fails as permission-denied.
    pub read_only: bool,
}

/// Identity profile handed out by the bundled identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Opaque identity reference. Generated at first sign-in when unset.
    pub id: Option<String>,
    /// Name shown in the navigation rail.
    pub display_name: Option<String>,
    /// Contact e-mail. Never used as an owner reference.
    pub email: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Path to the session file.
    /// Defaults to `~/.local/share/meditrack/session.json`
    pub session_path: Option<PathBuf>,
}

/// Journal behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Category assigned when a consultation form leaves it unset.
    pub default_category: Category,
    /// Duration assigned when the form value is missing or not a positive number.
    pub default_duration_minutes: u32,
    /// Length of the dashboard's trailing activity histogram.
    pub histogram_days: u32,
}

/// Privacy-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Reject anonymized codes that match an identifier pattern.
    pub check_identifiers: bool,
    /// Patterns (regex) for data that must never appear in an anonymized code.
    pub identifier_patterns: Vec<String>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            default_category: Category::General,
            default_duration_minutes: 20,
            histogram_days: 7,
        }
    }
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            check_identifiers: true,
            identifier_patterns: default_identifier_patterns(),
        }
    }
}

/// Default patterns for identifying data.
fn default_identifier_patterns() -> Vec<String> {
    vec![
        // E-mail addresses
        r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}".to_string(),
        // Phone numbers: the whole code is `+` and digits, or grouped digits
        r"^(?:\+\d[\d\s().-]{6,}|\(?\d{2,4}\)?[\s.-]\d{3,4}[\s.-]\d{3,4})$".to_string(),
        // Dotted national ID numbers
        r"\b\d{1,2}\.\d{3}\.\d{3}\b".to_string(),
        // SSN pattern
        r"\b\d{3}-\d{2}-\d{4}\b".to_string(),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("MEDITRACK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.journal.default_duration_minutes == 0 {
            return Err(Error::ConfigValidation {
                message: "default_duration_minutes must be greater than 0".to_string(),
            });
        }

        if !(1..=MAX_HISTOGRAM_DAYS).contains(&self.journal.histogram_days) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "histogram_days must be between 1 and {MAX_HISTOGRAM_DAYS}, got {}",
                    self.journal.histogram_days
                ),
            });
        }

        if let Some(id) = &self.identity.id {
            if id.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "identity.id must not be blank".to_string(),
                });
            }
        }

        self.identifier_patterns()?;
        Ok(())
    }

    /// Compile the privacy identifier patterns.
    ///
    /// Returns an empty list when identifier checks are disabled.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first pattern that fails to compile.
    pub fn identifier_patterns(&self) -> Result<Vec<Regex>> {
        if !self.privacy.check_identifiers {
            return Ok(Vec::new());
        }
        self.privacy
            .identifier_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|_| Error::ConfigValidation {
                    message: format!("invalid regex pattern: {pattern}"),
                })
            })
            .collect()
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the session file path, resolving defaults if not set.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.identity
            .session_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SESSION_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert!(!config.storage.read_only);
        assert!(config.identity.id.is_none());
        assert_eq!(config.journal.default_category, Category::General);
        assert_eq!(config.journal.default_duration_minutes, 20);
        assert_eq!(config.journal.histogram_days, 7);
        assert!(config.privacy.check_identifiers);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_duration() {
        let mut config = Config::default();
        config.journal.default_duration_minutes = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_duration_minutes"));
    }

    #[test]
    fn test_validate_histogram_bounds() {
        let mut config = Config::default();
        config.journal.histogram_days = 0;
        assert!(config.validate().is_err());

        config.journal.histogram_days = 91;
        assert!(config.validate().is_err());

        config.journal.histogram_days = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_blank_identity_id() {
        let mut config = Config::default();
        config.identity.id = Some("   ".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("identity.id"));
    }

    #[test]
    fn test_validate_invalid_regex() {
        let mut config = Config::default();
        config.privacy.identifier_patterns = vec!["[invalid".to_string()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid regex"));
    }

    #[test]
    fn test_identifier_patterns_disabled() {
        let mut config = Config::default();
        config.privacy.check_identifiers = false;
        config.privacy.identifier_patterns = vec!["[invalid".to_string()];

        assert!(config.identifier_patterns().unwrap().is_empty());
    }

    #[test]
    fn test_default_identifier_patterns() {
        let patterns = Config::default().identifier_patterns().unwrap();
        let matches = |text: &str| patterns.iter().any(|re| re.is_match(text));

        assert!(matches("jane.doe@example.com"));
        assert!(matches("+54 11 5555-1234"));
        assert!(matches("30.123.456"));
        assert!(matches("123-45-6789"));
        assert!(matches("555-123-4567"));
        assert!(matches("(011) 5555-1234"));
        assert!(!matches("PAC-001"));
        assert!(!matches("CARD-2024-17"));
    }

    #[test]
    fn test_anonymized_codes_with_long_digit_runs_pass() {
        let rules = crate::model::FormRules::from_config(&Config::default()).unwrap();

        for code in ["PAC-2024-0001", "HC-20240510", "P-1234567", "URG-2024-05-10-003"] {
            assert!(rules.check_anonymous_id(code).is_ok(), "{code} was rejected");
        }
        assert!(rules.check_anonymous_id("+54 9 11 5555-1234").is_err());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("journal.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_session_path_default() {
        let path = Config::default().session_path();
        assert!(path.to_string_lossy().contains("session.json"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("meditrack"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[identity]
id = "clinician-7"
display_name = "Ana"

[journal]
default_category = "Chronic"
histogram_days = 14
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.identity.id.as_deref(), Some("clinician-7"));
        assert_eq!(config.identity.display_name.as_deref(), Some("Ana"));
        assert_eq!(config.journal.default_category, Category::Chronic);
        assert_eq!(config.journal.histogram_days, 14);
        assert_eq!(config.journal.default_duration_minutes, 20);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[journal]\nhistogram_days = 0\n").unwrap();

        assert!(Config::load_from(Some(path)).is_err());
    }

    #[test]
    fn test_journal_config_deserialize() {
        let json = r#"{"default_duration_minutes": 30}"#;
        let journal: JournalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(journal.default_duration_minutes, 30);
        assert_eq!(journal.histogram_days, 7);
    }
}
