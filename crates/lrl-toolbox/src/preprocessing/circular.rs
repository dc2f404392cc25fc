//! Encoding of periodic features on the unit circle.

use std::f64::consts::TAU;

use tracing::{debug, warn};

use super::{check_width, Matrix, NanPolicy, Transformer};
use crate::error::{Error, Result};

/// Maps each periodic column `x` to `cos(2πx/p)` and `sin(2πx/p)`.
///
/// The output holds all cosine columns followed by all sine columns, so a
/// matrix with `n` columns becomes one with `2n`. When no period is given,
/// each column's period is learned as `max - min` of the training data.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularTransformer {
    period: Option<Vec<f64>>,
    nan_policy: NanPolicy,
    fitted: Option<Fitted>,
}

#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    period: Vec<f64>,
    feature_names: Option<Vec<String>>,
}

impl Default for CircularTransformer {
    fn default() -> Self {
        Self::new(None, NanPolicy::default())
    }
}

impl CircularTransformer {
    /// Create an unfitted transformer, optionally with explicit periods.
    #[must_use]
    pub fn new(period: Option<Vec<f64>>, nan_policy: NanPolicy) -> Self {
        Self {
            period,
            nan_policy,
            fitted: None,
        }
    }

    /// Period in use per column, once fitted.
    #[must_use]
    pub fn fitted_period(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.period.as_slice())
    }

    fn learn_period(&self, x: &Matrix) -> Vec<f64> {
        (0..x.n_cols())
            .map(|c| {
                let column = x.column(c);
                if self.nan_policy == NanPolicy::Propagate && column.iter().any(|v| v.is_nan()) {
                    return f64::NAN;
                }
                let (min, max) = column
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                if min > max {
                    f64::NAN
                } else {
                    max - min
                }
            })
            .collect()
    }
}

fn names_out(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| format!("cos_{n}"))
        .chain(names.iter().map(|n| format!("sin_{n}")))
        .collect()
}

impl Transformer for CircularTransformer {
    const NAME: &'static str = "CircularTransformer";

    fn fit(&mut self, x: &Matrix) -> Result<&mut Self> {
        self.nan_policy.check(x)?;

        let period = match &self.period {
            None => {
                let learned = self.learn_period(x);
                if let Some(c) = learned.iter().position(|p| *p == 0.0) {
                    warn!("Column {} is constant; its learned period is zero", c);
                }
                learned
            }
            Some(period) => {
                if period.len() != x.n_cols() {
                    return Err(Error::ShapeMismatch {
                        got: x.n_cols(),
                        expected: period.len(),
                        context: "period",
                    });
                }
                if let Some(p) = period.iter().find(|p| !p.is_finite() || **p == 0.0) {
                    return Err(Error::invalid_parameter(format!(
                        "period values must be finite and non-zero, got {p}"
                    )));
                }
                period.clone()
            }
        };

        debug!("Fitted circular transformer with period {:?}", period);
        self.fitted = Some(Fitted {
            period,
            feature_names: x.columns().map(names_out),
        });
        Ok(self)
    }

    fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted(Self::NAME))?;
        check_width(x, fitted.period.len())?;
        self.nan_policy.check(x)?;

        let angles = x.map_columns(|c, v| v / fitted.period[c] * TAU);
        let cos = angles.map_columns(|_, a| a.cos());
        let sin = angles.map_columns(|_, a| a.sin());
        let out = cos.hstack(&sin)?;

        match &fitted.feature_names {
            Some(names) => out.with_columns(names.iter().cloned()),
            None => Ok(out.without_columns()),
        }
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn n_features_in(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.period.len())
    }

    fn n_features_out(&self) -> Option<usize> {
        self.n_features_in().map(|n| n * 2)
    }

    fn feature_names_out(&self) -> Option<&[String]> {
        self.fitted.as_ref()?.feature_names.as_deref()
    }
}
