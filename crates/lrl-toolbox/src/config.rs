//! Configuration management for lrl-toolbox.
//!
//! This module provides configuration loading and validation using figment,
//! supporting a TOML config file, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filetree::{DataFormat, FileTreeConfig};
use crate::preprocessing::NanPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used under the platform config and data dirs.
const APP_DIR_NAME: &str = "lrl-toolbox";

/// Default tree directory name inside the data dir.
const TREE_DIR_NAME: &str = "tree";

/// Environment variable prefix; nested keys are separated by `__`.
const ENV_PREFIX: &str = "LRL_TOOLBOX_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `LRL_TOOLBOX_`, e.g. `LRL_TOOLBOX_TREE__LEAF_DEPTH`)
/// 2. TOML config file at `~/.config/lrl-toolbox/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File tree configuration.
    pub tree: TreeConfig,
    /// Preprocessing defaults.
    pub preprocessing: PreprocessingConfig,
}

/// File tree defaults used by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Tree root. Defaults to `~/.local/share/lrl-toolbox/tree`.
    pub root: Option<PathBuf>,
    /// Depth of newly created trees.
    pub tree_depth: u32,
    /// Bits per level of newly created trees.
    pub leaf_depth: u32,
    /// Data format of newly created trees.
    pub file_format: DataFormat,
    /// Whether newly created trees store metadata files.
    pub has_metadata: bool,
}

/// Defaults for the preprocessing commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Lower quantile for winsorizing.
    pub winsor_low: f64,
    /// Upper quantile for winsorizing.
    pub winsor_high: f64,
    /// NaN handling for all transformers.
    pub nan_policy: NanPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        let layout = FileTreeConfig::default();
        Self {
            root: None,
            tree_depth: layout.tree_depth,
            leaf_depth: layout.leaf_depth,
            file_format: layout.file_format,
            has_metadata: layout.has_metadata,
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            winsor_low: 0.1,
            winsor_high: 0.9,
            nan_policy: NanPolicy::default(),
        }
    }
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
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.layout().validate()?;

        let (low, high) = (self.preprocessing.winsor_low, self.preprocessing.winsor_high);
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low > high {
            return Err(Error::ConfigValidation {
                message: format!(
                    "winsor_low ({low}) and winsor_high ({high}) must satisfy 0 <= low <= high <= 1"
                ),
            });
        }

        Ok(())
    }

    /// Get the tree root, resolving defaults if not set.
    #[must_use]
    pub fn tree_root(&self) -> PathBuf {
        self.tree
            .root
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(TREE_DIR_NAME))
    }

    /// Layout applied to newly created trees.
    #[must_use]
    pub fn layout(&self) -> FileTreeConfig {
        FileTreeConfig {
            file_count: 0,
            tree_depth: self.tree.tree_depth,
            leaf_depth: self.tree.leaf_depth,
            file_format: self.tree.file_format,
            has_metadata: self.tree.has_metadata,
        }
    }

    /// Configured winsorizing quantile range.
    #[must_use]
    pub fn quantile_range(&self) -> (f64, f64) {
        (self.preprocessing.winsor_low, self.preprocessing.winsor_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.tree.root.is_none());
        assert_eq!(config.layout(), FileTreeConfig::default());
        assert_eq!(config.quantile_range(), (0.1, 0.9));
        assert_eq!(config.preprocessing.nan_policy, NanPolicy::Propagate);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_bad_layout() {
        let mut config = Config::default();
        config.tree.leaf_depth = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("leaf_depth"));
    }

    #[test]
    fn test_validate_bad_quantiles() {
        let mut config = Config::default();
        config.preprocessing.winsor_low = 0.95;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("winsor_low"));
    }

    #[test]
    fn test_tree_root_default() {
        let config = Config::default();
        let root = config.tree_root();
        assert!(root.to_string_lossy().contains("lrl-toolbox"));
        assert!(root.ends_with("tree"));
    }

    #[test]
    fn test_tree_root_custom() {
        let mut config = Config::default();
        config.tree.root = Some(PathBuf::from("/srv/trees/a"));
        assert_eq!(config.tree_root(), PathBuf::from("/srv/trees/a"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("lrl-toolbox"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[tree]
root = "/tmp/lrl-tree"
leaf_depth = 4
file_format = "yaml"

[preprocessing]
winsor_low = 0.05
nan_policy = "omit"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.tree_root(), PathBuf::from("/tmp/lrl-tree"));
        assert_eq!(config.layout().leaf_depth, 4);
        assert_eq!(config.layout().file_format, DataFormat::Yaml);
        assert_eq!(config.quantile_range(), (0.05, 0.9));
        assert_eq!(config.preprocessing.nan_policy, NanPolicy::Omit);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tree]\ntree_depth = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(Some(path)),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("leaf_depth"));
        assert!(json.contains("nan_policy"));
    }
}
