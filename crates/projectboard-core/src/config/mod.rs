//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::project::SortBy;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "PROJECTBOARD_CONFIG_DIR";
/// Environment variable overriding the local data directory
pub const DATA_DIR_ENV: &str = "PROJECTBOARD_DATA_DIR";
/// Environment variable holding the Firebase web API key
pub const FIREBASE_API_KEY_ENV: &str = "FIREBASE_API_KEY";

/// Projectboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub local: LocalConfig,
    pub firebase: FirebaseConfig,
    pub view: ViewConfig,
}

/// Which store pair the repository talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Firebase,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Firebase => "firebase",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "local" => Ok(BackendKind::Local),
            "firebase" => Ok(BackendKind::Firebase),
            _ => Err(anyhow!(
                "Invalid backend: {}. Valid options: local, firebase",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
}

/// Settings for the JSONL + filesystem backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Data directory; defaults to the platform data dir
    pub data_dir: Option<PathBuf>,
}

/// Settings for the Firestore + Firebase Storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Must stay empty in the file; the key comes from `FIREBASE_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub project_id: String,
    pub database: String,
    pub storage_bucket: String,
    pub firestore_endpoint: String,
    pub storage_endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub default_sort: SortBy,
    pub favorites_only: bool,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: String::new(),
            database: "(default)".to_string(),
            storage_bucket: String::new(),
            firestore_endpoint: "https://firestore.googleapis.com".to_string(),
            storage_endpoint: "https://firebasestorage.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl LocalConfig {
    /// Data directory after applying `PROJECTBOARD_DATA_DIR` and defaults
    pub fn resolved_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("projectboard"))
    }
}

impl FirebaseConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(env::var(FIREBASE_API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key()
            .map(|opt| opt.map(|key| redact_key(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Firebase API keys must be provided via the {} environment variable, not stored in configuration",
                FIREBASE_API_KEY_ENV
            ));
        }
        Ok(())
    }

    /// Check the settings the Firebase backend cannot run without
    pub fn ensure_complete(&self) -> anyhow::Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(anyhow!(
                "firebase.project_id is not set. Use `projectboard config set firebase.project_id <id>`."
            ));
        }
        if self.storage_bucket.trim().is_empty() {
            return Err(anyhow!(
                "firebase.storage_bucket is not set. Use `projectboard config set firebase.storage_bucket <bucket>`."
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("projectboard")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.firebase.enforce_env_only()?;
        if self.firebase.timeout_secs == 0 {
            return Err(anyhow!("firebase.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "backend.kind" => Ok(self.backend.kind.to_string()),

            "local.data_dir" => Ok(self
                .local
                .resolved_data_dir()?
                .display()
                .to_string()),

            "firebase.project_id" => Ok(self.firebase.project_id.clone()),
            "firebase.database" => Ok(self.firebase.database.clone()),
            "firebase.storage_bucket" => Ok(self.firebase.storage_bucket.clone()),
            "firebase.firestore_endpoint" => Ok(self.firebase.firestore_endpoint.clone()),
            "firebase.storage_endpoint" => Ok(self.firebase.storage_endpoint.clone()),
            "firebase.timeout_secs" => Ok(self.firebase.timeout_secs.to_string()),

            // Show redacted
            "firebase.api_key" => match self.firebase.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(format!("(not set - use {} env var)", FIREBASE_API_KEY_ENV)),
            },

            "view.default_sort" => Ok(self.view.default_sort.to_string()),
            "view.favorites_only" => Ok(self.view.favorites_only.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `projectboard config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "backend.kind" => {
                self.backend.kind = value.parse()?;
            }

            "local.data_dir" => {
                self.local.data_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            "firebase.project_id" => self.firebase.project_id = value.trim().to_string(),
            "firebase.database" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("firebase.database cannot be empty"));
                }
                self.firebase.database = value.trim().to_string();
            }
            "firebase.storage_bucket" => self.firebase.storage_bucket = value.trim().to_string(),
            "firebase.firestore_endpoint" | "firebase.storage_endpoint" => {
                let endpoint = value.trim().trim_end_matches('/');
                reqwest::Url::parse(endpoint)
                    .with_context(|| format!("Invalid endpoint URL: {}", value))?;
                if key == "firebase.firestore_endpoint" {
                    self.firebase.firestore_endpoint = endpoint.to_string();
                } else {
                    self.firebase.storage_endpoint = endpoint.to_string();
                }
            }
            "firebase.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be greater than zero"));
                }
                self.firebase.timeout_secs = secs;
            }

            // API key cannot be set via config
            "firebase.api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration. \
                     Set the {} environment variable instead.",
                    FIREBASE_API_KEY_ENV
                ));
            }

            "view.default_sort" => {
                self.view.default_sort = value.parse()?;
            }
            "view.favorites_only" => {
                self.view.favorites_only = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `projectboard config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "backend.kind",
            "local.data_dir",
            "firebase.project_id",
            "firebase.database",
            "firebase.storage_bucket",
            "firebase.firestore_endpoint",
            "firebase.storage_endpoint",
            "firebase.timeout_secs",
            "firebase.api_key",
            "view.default_sort",
            "view.favorites_only",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

/// Mask all but the last four characters of a secret
fn redact_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.kind, BackendKind::Local);
        assert_eq!(config.firebase.database, "(default)");
        assert_eq!(config.view.default_sort, SortBy::Alphabetical);
        assert!(!config.view.favorites_only);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [backend]
            kind = "firebase"

            [firebase]
            project_id = "demo-project"
            storage_bucket = "demo-project.appspot.com"

            [view]
            default_sort = "endingSoon"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.kind, BackendKind::Firebase);
        assert_eq!(config.firebase.project_id, "demo-project");
        assert_eq!(config.firebase.timeout_secs, 30);
        assert_eq!(config.view.default_sort, SortBy::EndingSoon);
        assert!(config.firebase.ensure_complete().is_ok());
    }

    #[test]
    fn test_api_key_in_file_is_rejected() {
        let result = Config::from_toml(
            r#"
            [firebase]
            api_key = "AIza-secret"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_set_and_get_round_trip_keys() {
        let mut config = Config::default();
        config.set("backend.kind", "firebase").unwrap();
        config.set("view.default_sort", "recent").unwrap();
        config.set("view.favorites_only", "true").unwrap();
        config.set("firebase.timeout_secs", "5").unwrap();
        config
            .set("firebase.firestore_endpoint", "http://localhost:8080/")
            .unwrap();

        assert_eq!(config.get("backend.kind").unwrap(), "firebase");
        assert_eq!(config.get("view.default_sort").unwrap(), "recent");
        assert_eq!(config.get("view.favorites_only").unwrap(), "true");
        assert_eq!(config.get("firebase.timeout_secs").unwrap(), "5");
        assert_eq!(
            config.get("firebase.firestore_endpoint").unwrap(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("backend.kind", "postgres").is_err());
        assert!(config.set("view.default_sort", "random").is_err());
        assert!(config.set("firebase.timeout_secs", "0").is_err());
        assert!(config.set("firebase.api_key", "secret").is_err());
        assert!(config.set("no.such.key", "x").is_err());
    }

    #[test]
    fn test_incomplete_firebase_settings() {
        let config = Config::default();
        assert!(config.firebase.ensure_complete().is_err());
    }

    #[test]
    fn test_serialized_config_omits_api_key() {
        let contents = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(!contents.contains("api_key"));
        assert!(Config::from_toml(&contents).is_ok());
    }

    #[test]
    fn test_redact_key_keeps_last_four_chars() {
        assert_eq!(redact_key("abc"), "***");
        assert_eq!(redact_key("AIzaSyExample1234"), "***1234");
        assert_eq!(redact_key("chave-ãéíõú"), "***éíõú");
    }
}
