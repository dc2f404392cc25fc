//! On-disk encodings for entry data.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// File format used for entry data files.
///
/// The variant name doubles as the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Comma separated records; the data must be an array of flat objects.
    Csv,
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML document.
    Yaml,
    /// `MessagePack`, the only binary format.
    Msgpack,
}

impl DataFormat {
    /// All supported formats.
    pub const ALL: [Self; 4] = [Self::Csv, Self::Json, Self::Yaml, Self::Msgpack];

    /// File extension without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Msgpack => "msgpack",
        }
    }

    /// Whether files of this format are binary rather than UTF-8 text.
    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Msgpack)
    }

    /// Look up the format for a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for unknown extensions.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "msgpack" | "mpk" => Ok(Self::Msgpack),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Decode a value from `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid for this format.
    pub fn read(self, reader: impl Read) -> Result<Value> {
        match self {
            Self::Csv => read_csv(reader),
            Self::Json => Ok(serde_json::from_reader(reader)?),
            Self::Yaml => Ok(serde_yaml::from_reader(reader)?),
            Self::Msgpack => Ok(rmp_serde::from_read(reader)?),
        }
    }

    /// Encode `value` into `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented in this format or
    /// writing fails.
    pub fn write(self, value: &Value, mut writer: impl Write) -> Result<()> {
        match self {
            Self::Csv => write_csv(value, writer),
            Self::Json => {
                serde_json::to_writer_pretty(&mut writer, value)?;
                writer.flush()?;
                Ok(())
            }
            Self::Yaml => {
                serde_yaml::to_writer(&mut writer, value)?;
                writer.flush()?;
                Ok(())
            }
            Self::Msgpack => {
                rmp_serde::encode::write(&mut writer, value)?;
                writer.flush()?;
                Ok(())
            }
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
    }
}

/// Parse a CSV cell the way a dataframe reader would guess its type.
fn infer_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = cell
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
    {
        return Value::Number(n);
    }
    match cell {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn read_csv(reader: impl Read) -> Result<Value> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut records = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.to_string(), infer_cell(cell)))
            .collect();
        records.push(Value::Object(row));
    }
    Ok(Value::Array(records))
}

fn csv_cell(value: &Value, row: usize, column: &str) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => Err(Error::Encode {
            format: "csv",
            message: format!("nested value in row {row}, column '{column}'"),
        }),
    }
}

fn write_csv(value: &Value, writer: impl Write) -> Result<()> {
    let not_records = || Error::Encode {
        format: "csv",
        message: "data must be an array of objects".to_string(),
    };
    let records = value.as_array().ok_or_else(not_records)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    let Some(first) = records.first() else {
        csv_writer.flush()?;
        return Ok(());
    };
    let headers: Vec<&String> = first.as_object().ok_or_else(not_records)?.keys().collect();
    csv_writer.write_record(&headers)?;

    for (i, record) in records.iter().enumerate() {
        let record = record.as_object().ok_or_else(not_records)?;
        if let Some(extra) = record.keys().find(|k| !headers.contains(k)) {
            return Err(Error::Encode {
                format: "csv",
                message: format!("row {i} has column '{extra}' missing from the header"),
            });
        }
        let cells = headers
            .iter()
            .map(|h| csv_cell(record.get(*h).unwrap_or(&Value::Null), i, h))
            .collect::<Result<Vec<_>>>()?;
        csv_writer.write_record(&cells)?;
    }
    csv_writer.flush()?;
    Ok(())
}
