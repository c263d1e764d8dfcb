use std::env;
use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Input files imported when the command line names none.
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub check_images: bool,
    #[serde(default = "default_image_check_timeout_secs")]
    pub image_check_timeout_secs: u64,
}

fn default_database_path() -> String {
    "data/catalog.db".to_string()
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_image_check_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: default_database_path(),
            input_files: vec![],
            tracing_level: default_tracing_level(),
            user_agent: default_user_agent(),
            check_images: false,
            image_check_timeout_secs: default_image_check_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "data/config.yaml";

        let mut config: Config = if let Ok(config_str) = fs::read_to_string(config_path) {
            serde_yaml::from_str(&config_str)
                .with_context(|| format!("failed to parse {}", config_path))?
        } else {
            Config::default()
        };

        // Override with environment variables if present
        if let Ok(path) = env::var("DATABASE_PATH") {
            config.database_path = path;
        }

        if let Ok(files) = env::var("INPUT_FILES") {
            config.input_files = files
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(level) = env::var("TRACING_LEVEL") {
            config.tracing_level = level;
        }

        if let Ok(user_agent) = env::var("USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Ok(check) = env::var("CHECK_IMAGES") {
            config.check_images = check
                .parse()
                .context("Failed to parse CHECK_IMAGES environment variable")?;
        }

        if let Ok(timeout) = env::var("IMAGE_CHECK_TIMEOUT_SECS") {
            config.image_check_timeout_secs = timeout
                .parse()
                .context("Failed to parse IMAGE_CHECK_TIMEOUT_SECS environment variable")?;
        }

        // Validate required fields
        if config.database_path.trim().is_empty() {
            anyhow::bail!(
                "database_path is required (set via data/config.yaml or DATABASE_PATH env var)"
            );
        }

        if config.image_check_timeout_secs == 0 {
            anyhow::bail!("image_check_timeout_secs must be at least 1");
        }

        Ok(config)
    }

    /// Write a starter config file for a fresh checkout.
    pub fn create_default() -> Result<()> {
        fs::create_dir_all("data")?;
        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write("data/config.yaml", config_str)?;
        Ok(())
    }
}
