use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::persistence::Namespace;

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for recent-pins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShelfConfig {
    /// Preferences file holding every surface's persisted lists
    #[serde(default = "defaults::default_prefs_path")]
    pub prefs_path: PathBuf,
    /// First part of every preference key
    #[serde(default = "defaults::default_company_name")]
    pub company_name: String,
    /// Second part of every preference key
    #[serde(default = "defaults::default_product_name")]
    pub product_name: String,
    /// Height of one list row, used to derive capacity from the list area
    #[serde(default = "defaults::default_row_height")]
    pub row_height: f32,
    /// Narrowest column before the list area wraps into fewer columns
    #[serde(default = "defaults::default_min_column_width")]
    pub min_column_width: f32,
    /// Capacity until the UI reports its real size
    #[serde(default = "defaults::default_capacity")]
    pub default_capacity: usize,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        ShelfConfig {
            prefs_path: defaults::default_prefs_path(),
            company_name: defaults::default_company_name(),
            product_name: defaults::default_product_name(),
            row_height: defaults::default_row_height(),
            min_column_width: defaults::default_min_column_width(),
            default_capacity: defaults::default_capacity(),
        }
    }
}

impl ShelfConfig {
    /// Load configuration from the config file (if any) and environment
    /// variables
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        tracing::debug!("loading recent-pins config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = env::var("RECENT_PINS_PREFS") {
            self.prefs_path = expand_tilde(&PathBuf::from(path));
        }

        if let Ok(capacity) = env::var("RECENT_PINS_CAPACITY") {
            self.default_capacity = capacity
                .parse()
                .context("Failed to parse RECENT_PINS_CAPACITY as usize")?;
        }

        if let Ok(company) = env::var("RECENT_PINS_COMPANY") {
            self.company_name = company;
        }

        if let Ok(product) = env::var("RECENT_PINS_PRODUCT") {
            self.product_name = product;
        }
        Ok(())
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: ShelfConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.prefs_path = expand_tilde(&config.prefs_path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/recent-pins/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// Preference namespace of one surface
    pub fn namespace(&self, surface: &str) -> Namespace {
        Namespace::new(&self.company_name, &self.product_name, surface)
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(crate) fn default_prefs_path() -> PathBuf {
        super::expand_tilde(&PathBuf::from("~/.config/recent-pins/prefs.yaml"))
    }

    pub(crate) fn default_company_name() -> String {
        "DefaultCompany".to_string()
    }

    pub(crate) fn default_product_name() -> String {
        "DefaultProduct".to_string()
    }

    pub(crate) fn default_row_height() -> f32 {
        16.0
    }

    pub(crate) fn default_min_column_width() -> f32 {
        150.0
    }

    pub(crate) fn default_capacity() -> usize {
        20
    }
}
