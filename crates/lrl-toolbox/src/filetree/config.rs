//! Persistent layout of a file tree.

use serde::{Deserialize, Serialize};

use super::DataFormat;
use crate::error::{Error, Result};

/// Layout and size of a file tree, stored as `.filetree.json` in its root.
///
/// Values are never mutated in place; updates go through the `with_*`
/// builders so that a written config always describes a consistent tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTreeConfig {
    /// Number of entries stored.
    pub file_count: u64,
    /// Number of `leaf_depth`-bit groups an index is split into.
    pub tree_depth: u32,
    /// Bits per directory level; each leaf holds `2^leaf_depth` entries.
    pub leaf_depth: u32,
    /// Format of the data files.
    pub file_format: DataFormat,
    /// Whether a `.metadata` file accompanies each data file.
    pub has_metadata: bool,
}

impl Default for FileTreeConfig {
    fn default() -> Self {
        Self {
            file_count: 0,
            tree_depth: 2,
            leaf_depth: 7,
            file_format: DataFormat::default(),
            has_metadata: true,
        }
    }
}

impl FileTreeConfig {
    /// Largest number of index bits a tree may address.
    pub const MAX_INDEX_BITS: u32 = 63;

    /// Copy with a different entry count.
    #[must_use]
    pub fn with_file_count(&self, file_count: u64) -> Self {
        Self {
            file_count,
            ..self.clone()
        }
    }

    /// Copy with a different depth.
    #[must_use]
    pub fn with_tree_depth(&self, tree_depth: u32) -> Self {
        Self {
            tree_depth,
            ..self.clone()
        }
    }

    /// Number of entries per leaf directory.
    #[must_use]
    pub fn leaf_capacity(&self) -> u64 {
        1 << self.leaf_depth
    }

    /// Check depth bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if a depth is zero or the tree
    /// would address more than [`Self::MAX_INDEX_BITS`] bits.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_depth == 0 {
            return Err(Error::ConfigValidation {
                message: "leaf_depth must be at least 1".to_string(),
            });
        }
        if self.tree_depth == 0 {
            return Err(Error::ConfigValidation {
                message: "tree_depth must be at least 1".to_string(),
            });
        }
        let bits = u64::from(self.leaf_depth) * u64::from(self.tree_depth);
        if bits > u64::from(Self::MAX_INDEX_BITS) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "leaf_depth * tree_depth must not exceed {}, got {bits}",
                    Self::MAX_INDEX_BITS
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FileTreeConfig::default();
        assert_eq!(config.file_count, 0);
        assert_eq!(config.tree_depth, 2);
        assert_eq!(config.leaf_depth, 7);
        assert_eq!(config.file_format, DataFormat::Json);
        assert!(config.has_metadata);
        assert_eq!(config.leaf_capacity(), 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_builders_leave_original() {
        let config = FileTreeConfig::default();
        let grown = config.with_tree_depth(3).with_file_count(10);
        assert_eq!(config.tree_depth, 2);
        assert_eq!(grown.tree_depth, 3);
        assert_eq!(grown.file_count, 10);
        assert_eq!(grown.leaf_depth, config.leaf_depth);
    }

    #[test]
    fn test_validate_rejects_zero_depths() {
        let config = FileTreeConfig {
            leaf_depth: 0,
            ..FileTreeConfig::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("leaf_depth"));

        let config = FileTreeConfig::default().with_tree_depth(0);
        assert!(config.validate().unwrap_err().to_string().contains("tree_depth"));
    }

    #[test]
    fn test_validate_rejects_too_many_bits() {
        let config = FileTreeConfig {
            leaf_depth: 16,
            tree_depth: 4,
            ..FileTreeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FileTreeConfig =
            serde_json::from_str(r#"{"file_count": 12, "file_format": "csv"}"#).unwrap();
        assert_eq!(config.file_count, 12);
        assert_eq!(config.file_format, DataFormat::Csv);
        assert_eq!(config.tree_depth, 2);
    }
}
