//! A single stored item: data plus optional metadata.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DataFormat;
use crate::error::{Error, Result};

/// Extension of the JSON metadata file written next to each data file.
pub const METADATA_EXTENSION: &str = "metadata";

/// Data and metadata of one file tree entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDataEntry {
    /// The entry payload.
    pub data: Value,
    /// Free-form metadata stored as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TreeDataEntry {
    /// Create an entry without metadata.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            metadata: None,
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Load an entry from disk.
    ///
    /// The data parser is chosen from the extension of `data_path`. A metadata
    /// file holding JSON `null` loads as no metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, the extension is unknown,
    /// or the contents do not parse.
    pub fn load(data_path: &Path, metadata_path: Option<&Path>) -> Result<Self> {
        let ext = data_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = DataFormat::from_extension(ext)?;

        let file = File::open(data_path).map_err(|e| Error::file_access(data_path, e))?;
        let data = format.read(BufReader::new(file))?;

        let metadata = match metadata_path {
            Some(path) => {
                let file = File::open(path).map_err(|e| Error::file_access(path, e))?;
                match serde_json::from_reader(BufReader::new(file))? {
                    Value::Null => None,
                    Value::Object(map) => Some(map),
                    other => {
                        return Err(Error::Encode {
                            format: "json",
                            message: format!(
                                "metadata in {} must be an object, got {other}",
                                path.display()
                            ),
                        })
                    }
                }
            }
            None => None,
        };

        Ok(Self { data, metadata })
    }

    /// Write the data to `path` with its extension replaced by the format's.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or encoding fails.
    pub fn write_data(&self, path: &Path, format: DataFormat) -> Result<PathBuf> {
        let target = path.with_extension(format.extension());
        let file = File::create(&target).map_err(|e| Error::file_access(&target, e))?;
        format.write(&self.data, BufWriter::new(file))?;
        Ok(target)
    }

    /// Write the metadata as JSON to `path` with a `.metadata` extension.
    ///
    /// Missing metadata is written as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or encoding fails.
    pub fn write_metadata(&self, path: &Path) -> Result<PathBuf> {
        let target = path.with_extension(METADATA_EXTENSION);
        let file = File::create(&target).map_err(|e| Error::file_access(&target, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.metadata)?;
        writer.flush()?;
        Ok(target)
    }

    /// Write the data, and the metadata when there is any.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn write(&self, basename: &Path, format: DataFormat) -> Result<()> {
        self.write_data(basename, format)?;
        if self.metadata.is_some() {
            self.write_metadata(basename)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TreeDataEntry {
        let mut meta = Map::new();
        meta.insert("source".to_string(), json!("sensor-4"));
        TreeDataEntry::new(json!([{"t": 0, "v": 1.5}, {"t": 1, "v": 2.5}])).with_metadata(meta)
    }

    #[test]
    fn test_write_replaces_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let written = sample()
            .write_data(&dir.path().join("7.txt"), DataFormat::Csv)
            .unwrap();
        assert_eq!(written, dir.path().join("7.csv"));
        assert!(written.exists());
    }

    #[test]
    fn test_write_then_load_each_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let entry = sample();
        for format in DataFormat::ALL {
            let base = dir.path().join(format!("entry_{format}"));
            entry.write(&base, format).unwrap();
            let loaded = TreeDataEntry::load(
                &base.with_extension(format.extension()),
                Some(&base.with_extension(METADATA_EXTENSION)),
            )
            .unwrap();
            assert_eq!(loaded, entry, "{format}");
        }
    }

    #[test]
    fn test_write_skips_missing_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("0");
        TreeDataEntry::new(json!({"a": 1}))
            .write(&base, DataFormat::Json)
            .unwrap();
        assert!(base.with_extension("json").exists());
        assert!(!base.with_extension(METADATA_EXTENSION).exists());
    }

    #[test]
    fn test_null_metadata_loads_as_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("3");
        let entry = TreeDataEntry::new(json!("plain"));
        let data = entry.write_data(&base, DataFormat::Yaml).unwrap();
        let meta = entry.write_metadata(&base).unwrap();
        assert_eq!(std::fs::read_to_string(&meta).unwrap(), "null");

        let loaded = TreeDataEntry::load(&data, Some(&meta)).unwrap();
        assert!(loaded.metadata.is_none());
        assert_eq!(loaded.data, json!("plain"));
    }

    #[test]
    fn test_load_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("1.pickle");
        std::fs::write(&path, b"\x80\x04").unwrap();
        assert!(matches!(
            TreeDataEntry::load(&path, None),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = TreeDataEntry::load(Path::new("/nonexistent/9.json"), None).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/9.json"));
    }
}
