use super::schema::WeftConfig;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_CONFIG_FILE: &str = "weft.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Search order: `./weft.yaml`, then `~/.weft/config.yaml`, then
    /// built-in defaults. A malformed file is skipped with a warning so
    /// one bad edit does not take the tool down.
    pub async fn load_default() -> WeftConfig {
        match Self::load_from(DEFAULT_CONFIG_FILE).await {
            Ok(config) => {
                debug!("Loaded config from {}", DEFAULT_CONFIG_FILE);
                return config;
            }
            Err(ConfigError::Parse(e)) => {
                warn!("Ignoring malformed {}: {}", DEFAULT_CONFIG_FILE, e);
            }
            Err(_) => {}
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".weft").join("config.yaml");
            match Self::load_from(&path).await {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(ConfigError::Parse(e)) => {
                    warn!("Ignoring malformed {}: {}", path.display(), e);
                }
                Err(_) => {}
            }
        }

        debug!("No config file found, using defaults");
        WeftConfig::default()
    }

    pub async fn load_from(path: impl AsRef<Path>) -> Result<WeftConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_from_reads_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("weft.yaml");
        tokio::fs::write(&path, "base_url: https://qa.example.com\n")
            .await
            .expect("write");

        let config = ConfigLoader::load_from(&path).await.expect("load");
        assert_eq!(config.base_url, "https://qa.example.com");
    }

    #[tokio::test]
    async fn load_from_rejects_bad_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("weft.yaml");
        tokio::fs::write(&path, "base_url: [unclosed\n").await.expect("write");

        let result = ConfigLoader::load_from(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[tokio::test]
    async fn load_from_missing_file_is_io_error() {
        let result = ConfigLoader::load_from("/nonexistent/weft.yaml").await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
