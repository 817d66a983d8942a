use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
///
/// Loaded from `config.yml` (or `.toml`); every field has a default so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Base directory for the database and backups. Defaults to
    /// `~/.paperlink/data` when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for the admin API. When unset the admin routes are
    /// disabled rather than left open.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the backup directory; defaults to `<data_dir>/backups`.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Resolve the effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".paperlink")
                .join("data")
        })
    }

    /// Resolve the effective backup directory.
    pub fn backup_dir(&self) -> PathBuf {
        self.storage
            .backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("backups"))
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("paperlink.db")
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8321
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8321);
        assert!(config.admin.token.is_none());
    }

    #[test]
    fn backup_dir_defaults_under_data_dir() {
        let config = AppConfig {
            data_dir: Some("/var/lib/paperlink".into()),
            ..Default::default()
        };
        assert_eq!(
            config.backup_dir(),
            std::path::Path::new("/var/lib/paperlink/backups")
        );
        assert_eq!(
            config.database_path(),
            std::path::Path::new("/var/lib/paperlink/paperlink.db")
        );
    }

    #[test]
    fn explicit_backup_dir_wins() {
        let config = AppConfig {
            data_dir: Some("/data".into()),
            storage: StorageConfig {
                backup_dir: Some("/backups".into()),
            },
            ..Default::default()
        };
        assert_eq!(config.backup_dir(), std::path::Path::new("/backups"));
    }
}
