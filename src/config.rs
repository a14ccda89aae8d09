use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context("Failed to read config file. Make sure config.toml exists.")?;

        let mut config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        // Override with environment variable if set
        if let Ok(key) = std::env::var("INKPOST_API_KEY") {
            config.api.api_key = key;
        }

        if config.api.api_key.is_empty() {
            anyhow::bail!(
                "API key is not set. Put it in config.toml or the INKPOST_API_KEY environment variable."
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let toml_str = r#"
            [api]
            base_url = "https://open.example-notes.com"
            api_key = "test_key"

            [storage]
            db_path = "./notes.db"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.base_url, "https://open.example-notes.com");
        assert_eq!(config.api.api_key, "test_key");
        assert_eq!(config.storage.db_path, "./notes.db");
    }

    #[test]
    fn test_api_key_defaults_to_empty() {
        let toml_str = r#"
            [api]
            base_url = "https://open.example-notes.com"

            [storage]
            db_path = "notes.db"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.api.api_key.is_empty());
    }
}
