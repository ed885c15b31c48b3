//! Application-level configuration loading: tier ladder, labels, storage backend and admin token.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use tracing::info;
use utoipa::ToSchema;

use crate::{
    dao::groups::StaticGroupDirectory,
    state::tiers::{ConfigError, ThresholdTable, TierEntry, TierLabels},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RANKPOINT_CONFIG_PATH";
const ADMIN_TOKEN_ENV: &str = "RANKPOINT_ADMIN_TOKEN";
const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(300);

/// Immutable runtime configuration, re-read on `/admin/reload`.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ordered tier ladder; each cost is added on top of the previous tier.
    pub tiers: Vec<TierEntry>,
    /// Known permission groups. When omitted, the tier groups themselves are accepted.
    pub groups: Option<Vec<String>>,
    pub labels: TierLabels,
    /// Period of the background flush.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub save_interval: Duration,
    pub storage: StorageSettings,
    /// Token expected in `X-Admin-Token` on mutating routes; open access when unset.
    pub admin_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            groups: None,
            labels: TierLabels::default(),
            save_interval: DEFAULT_SAVE_INTERVAL,
            storage: StorageSettings::default(),
            admin_token: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration from [`DEFAULT_CONFIG_PATH`] or its environment override.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`. A missing file yields the built-in defaults,
    /// while an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(contents) => {
                let config = serde_json::from_str::<Self>(&contents).map_err(|source| {
                    ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                info!(
                    path = %path.display(),
                    tiers = config.tiers.len(),
                    "loaded configuration"
                );
                config
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(token) = non_empty_var(ADMIN_TOKEN_ENV) {
            self.admin_token = Some(token);
        }
        self.storage.apply_env_overrides();
    }

    /// Validate the tier ladder against the permission-group directory.
    pub fn threshold_table(&self) -> Result<ThresholdTable, ConfigError> {
        let directory = match &self.groups {
            Some(groups) => StaticGroupDirectory::new(groups.iter().map(String::as_str)),
            None => StaticGroupDirectory::new(self.tiers.iter().map(|tier| tier.group.as_str())),
        };
        ThresholdTable::build(&self.tiers, &directory)
            .map(|table| table.with_labels(self.labels.clone()))
    }
}

/// Which persistence backend holds the balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mongo,
    Couch,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Mongo => "mongo",
            StorageBackend::Couch => "couch",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub mongo: MongoSettings,
    pub couch: CouchSettings,
}

impl StorageSettings {
    /// Same settings pointing at another backend.
    pub fn with_backend(&self, backend: StorageBackend) -> Self {
        Self {
            backend,
            ..self.clone()
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(uri) = non_empty_var("MONGO_URI") {
            self.mongo.uri = uri;
        }
        if let Some(database) = non_empty_var("MONGO_DB") {
            self.mongo.database = database;
        }
        if let Some(base_url) = non_empty_var("COUCH_BASE_URL") {
            self.couch.base_url = base_url;
        }
        if let Some(database) = non_empty_var("COUCH_DB") {
            self.couch.database = database;
        }
        if let Some(username) = non_empty_var("COUCH_USERNAME") {
            self.couch.username = Some(username);
        }
        if let Some(password) = non_empty_var("COUCH_PASSWORD") {
            self.couch.password = Some(password);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
    /// Pings attempted before giving up on the initial connection.
    pub connect_attempts: u32,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".into(),
            database: "rankpoint".into(),
            connect_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CouchSettings {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for CouchSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5984".into(),
            database: "rankpoint".into(),
            username: None,
            password: None,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Ladder shipped with the binary.
fn default_tiers() -> Vec<TierEntry> {
    [
        ("novice", "Novice", 0),
        ("apprentice", "Apprentice", 100),
        ("veteran", "Veteran", 500),
        ("master", "Master", 1500),
    ]
    .into_iter()
    .map(|(group, display_name, points)| TierEntry {
        group: group.to_string(),
        display_name: Some(display_name.to_string()),
        points,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_a_valid_ladder() {
        let table = AppConfig::default().threshold_table().unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.resolve(600).group.as_deref(), Some("veteran"));
    }

    #[test]
    fn parses_a_full_document() {
        let raw = r#"{
            "tiers": [
                {"group": "Bronze", "points": 10},
                {"group": "silver", "display_name": "Silver", "points": 40}
            ],
            "groups": ["bronze", "SILVER", "gold"],
            "labels": {"max_total": "-", "max_need": "done", "unranked": "none"},
            "save_interval": 30,
            "storage": {"backend": "couch", "couch": {"database": "points"}}
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.save_interval, Duration::from_secs(30));
        assert_eq!(config.storage.backend, StorageBackend::Couch);
        assert_eq!(config.storage.couch.database, "points");
        assert_eq!(config.storage.couch.base_url, "http://localhost:5984");

        let table = config.threshold_table().unwrap();
        assert_eq!(table.resolve(5).display_name, "none");
        assert_eq!(table.resolve(50).display_name, "Silver");
    }

    #[test]
    fn unknown_group_is_rejected() {
        let raw = r#"{"tiers": [{"group": "ghost", "points": 0}], "groups": ["gold"]}"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            config.threshold_table(),
            Err(ConfigError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("does/not/exist.json")).unwrap();
        assert_eq!(config.tiers.len(), 4);
        assert_eq!(config.save_interval, DEFAULT_SAVE_INTERVAL);
    }
}
