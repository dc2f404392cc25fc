//! Column-wise numeric preprocessing.
//!
//! Transformers follow a fit/transform lifecycle: `fit` learns per-column
//! statistics from a training [`Matrix`], `transform` applies them to new data
//! with the same number of columns.

mod circular;
mod matrix;
mod winsorizer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use circular::CircularTransformer;
pub use matrix::Matrix;
pub use winsorizer::Winsorizer;

/// How transformers treat NaN values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanPolicy {
    /// NaN inputs flow through to NaN outputs.
    #[default]
    Propagate,
    /// Any NaN is an error.
    Raise,
    /// NaN is ignored when learning statistics and kept in the output.
    Omit,
}

impl NanPolicy {
    /// Fail with [`Error::NanEncountered`] if the policy is `Raise` and `x` has NaN.
    pub(crate) fn check(self, x: &Matrix) -> Result<()> {
        if self == Self::Raise {
            if let Some(column) = x.first_nan_column() {
                return Err(Error::NanEncountered { column });
            }
        }
        Ok(())
    }
}

impl fmt::Display for NanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagate => write!(f, "propagate"),
            Self::Raise => write!(f, "raise"),
            Self::Omit => write!(f, "omit"),
        }
    }
}

impl FromStr for NanPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "propagate" => Ok(Self::Propagate),
            "raise" => Ok(Self::Raise),
            "omit" => Ok(Self::Omit),
            other => Err(Error::invalid_parameter(format!(
                "unknown nan policy '{other}'"
            ))),
        }
    }
}

/// A column-wise transformer with a fit/transform lifecycle.
pub trait Transformer {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Learn statistics from `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if parameters are invalid or `x` violates the NaN policy.
    fn fit(&mut self, x: &Matrix) -> Result<&mut Self>;

    /// Apply the fitted statistics to `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFitted`] before `fit`, or [`Error::ShapeMismatch`]
    /// if the column count differs from the one seen in `fit`.
    fn transform(&self, x: &Matrix) -> Result<Matrix>;

    /// Fit on `x`, then transform it.
    ///
    /// # Errors
    ///
    /// Returns any error from `fit` or `transform`.
    fn fit_transform(&mut self, x: &Matrix) -> Result<Matrix> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Whether `fit` has completed.
    fn is_fitted(&self) -> bool;

    /// Column count seen in `fit`.
    fn n_features_in(&self) -> Option<usize>;

    /// Column count produced by `transform`.
    fn n_features_out(&self) -> Option<usize>;

    /// Output column names, when the fit input was named.
    fn feature_names_out(&self) -> Option<&[String]>;
}

/// Shape check shared by transformers before transform.
pub(crate) fn check_width(x: &Matrix, fitted: usize) -> Result<()> {
    if x.n_cols() == fitted {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            got: x.n_cols(),
            expected: fitted,
            context: "from fit",
        })
    }
}
