//! Dense numeric matrix used as transformer input and output.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{Error, Result};

/// Row-major matrix of `f64` values with optional column names.
///
/// NaN marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    n_rows: usize,
    n_cols: usize,
    values: Vec<f64>,
    columns: Option<Vec<String>>,
}

impl Matrix {
    /// Build a matrix from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if `values.len()` is not `n_rows * n_cols`.
    pub fn from_shape_vec(n_rows: usize, n_cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_rows * n_cols {
            return Err(Error::ShapeMismatch {
                got: values.len(),
                expected: n_rows * n_cols,
                context: "rows x cols",
            });
        }
        Ok(Self {
            n_rows,
            n_cols,
            values,
            columns: None,
        })
    }

    /// Build a matrix from a list of rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have different lengths.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let n_cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for (row, r) in rows.iter().enumerate() {
            let r = r.as_ref();
            if r.len() != n_cols {
                return Err(Error::RaggedMatrix {
                    row,
                    got: r.len(),
                    expected: n_cols,
                });
            }
            values.extend_from_slice(r);
        }
        Ok(Self {
            n_rows: rows.len(),
            n_cols,
            values,
            columns: None,
        })
    }

    /// Attach column names.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of names differs from the column count.
    pub fn with_columns<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != self.n_cols {
            return Err(Error::ShapeMismatch {
                got: names.len(),
                expected: self.n_cols,
                context: "column names",
            });
        }
        self.columns = Some(names);
        Ok(self)
    }

    /// Drop column names.
    #[must_use]
    pub fn without_columns(mut self) -> Self {
        self.columns = None;
        self
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Column names, if any.
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Value at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.n_rows && col < self.n_cols, "index out of bounds");
        self.values[row * self.n_cols + col]
    }

    /// Iterate over rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics; an empty-width matrix has no row data.
        self.values.chunks_exact(self.n_cols.max(1)).take(self.n_rows)
    }

    /// Collect column `col` into a new vector.
    #[must_use]
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows).map(|r| self.get(r, col)).collect()
    }

    /// Index of the first column containing NaN, if any.
    #[must_use]
    pub fn first_nan_column(&self) -> Option<usize> {
        (0..self.n_cols).find(|&c| (0..self.n_rows).any(|r| self.get(r, c).is_nan()))
    }

    /// Apply `f(col, value)` to every element.
    #[must_use]
    pub(crate) fn map_columns(&self, f: impl Fn(usize, f64) -> f64) -> Self {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| f(i % self.n_cols.max(1), v))
            .collect();
        Self {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            values,
            columns: self.columns.clone(),
        }
    }

    /// Concatenate two matrices with the same row count side by side.
    ///
    /// # Errors
    ///
    /// Returns an error if the row counts differ.
    pub fn hstack(&self, other: &Self) -> Result<Self> {
        if self.n_rows != other.n_rows {
            return Err(Error::ShapeMismatch {
                got: other.n_rows,
                expected: self.n_rows,
                context: "row count for hstack",
            });
        }
        let n_cols = self.n_cols + other.n_cols;
        let mut values = Vec::with_capacity(self.n_rows * n_cols);
        for (left, right) in self.rows().zip(other.rows()) {
            values.extend_from_slice(left);
            values.extend_from_slice(right);
        }
        let columns = match (&self.columns, &other.columns) {
            (Some(a), Some(b)) => Some(a.iter().chain(b).cloned().collect()),
            _ => None,
        };
        Ok(Self {
            n_rows: self.n_rows,
            n_cols,
            values,
            columns,
        })
    }

    /// Read a matrix from CSV with a header row.
    ///
    /// Empty cells load as NaN.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV is malformed or a cell is not numeric.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let n_cols = columns.len();
        let mut values = Vec::new();
        let mut n_rows = 0;

        for record in csv_reader.records() {
            let record = record?;
            for cell in &record {
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>().map_err(|_| {
                        Error::invalid_parameter(format!(
                            "non-numeric value '{cell}' on data row {}",
                            n_rows + 1
                        ))
                    })?
                };
                values.push(value);
            }
            n_rows += 1;
        }

        debug!("Read {}x{} matrix from CSV", n_rows, n_cols);
        Self::from_shape_vec(n_rows, n_cols, values)?.with_columns(columns)
    }

    /// Write the matrix as CSV.
    ///
    /// Unnamed matrices get `x0, x1, ...` headers. NaN is written as an empty cell.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn to_csv_writer(&self, writer: impl Write) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        match &self.columns {
            Some(names) => csv_writer.write_record(names)?,
            None => csv_writer.write_record((0..self.n_cols).map(|c| format!("x{c}")))?,
        }
        for row in self.rows() {
            csv_writer.write_record(row.iter().map(|v| {
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            }))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
