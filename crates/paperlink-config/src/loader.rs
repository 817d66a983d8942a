use std::path::{Path, PathBuf};

use paperlink_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

/// Loads `AppConfig` from YAML or TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a config file, dispatching on the file extension.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path, or fall back to the first default location
    /// that exists. Missing defaults are not an error; you just get defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in Self::default_paths() {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }

        info!("no config file found, using defaults");
        Ok(AppConfig::default())
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("paperlink.yml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".paperlink").join("config.yml"));
            paths.push(home.join(".paperlink").join("config.toml"));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("paperlink-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_yaml_config() {
        let path = temp_file(
            "config.yml",
            "gateway:\n  host: 0.0.0.0\n  port: 9000\nadmin:\n  token: secret\n",
        );
        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.admin.token.as_deref(), Some("secret"));
    }

    #[test]
    fn loads_toml_config() {
        let path = temp_file("config.toml", "[gateway]\nhost = \"::1\"\nport = 4000\n");
        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.gateway.host, "::1");
        assert_eq!(config.gateway.port, 4000);
    }

    #[test]
    fn rejects_unknown_extension() {
        let path = temp_file("config.ini", "[gateway]");
        assert!(ConfigLoader::load(&path).is_err());
    }

    #[test]
    fn invalid_yaml_is_a_config_error() {
        let path = temp_file("bad.yml", "gateway: [not a map");
        let err = ConfigLoader::load(&path).unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }
}
