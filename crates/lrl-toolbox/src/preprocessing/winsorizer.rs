//! Quantile clipping of numeric columns.

use tracing::debug;

use super::{check_width, Matrix, NanPolicy, Transformer};
use crate::error::{Error, Result};

/// Clips every column to its fitted `[low, high]` quantiles.
///
/// Quantiles are computed ignoring NaN, with linear interpolation between
/// the two closest ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct Winsorizer {
    quantile_range: (f64, f64),
    nan_policy: NanPolicy,
    fitted: Option<Fitted>,
}

#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    lower: Vec<f64>,
    upper: Vec<f64>,
    feature_names: Option<Vec<String>>,
}

impl Default for Winsorizer {
    fn default() -> Self {
        Self::new((0.1, 0.9), NanPolicy::default())
    }
}

impl Winsorizer {
    /// Create an unfitted winsorizer.
    #[must_use]
    pub fn new(quantile_range: (f64, f64), nan_policy: NanPolicy) -> Self {
        Self {
            quantile_range,
            nan_policy,
            fitted: None,
        }
    }

    /// Configured quantile range.
    #[must_use]
    pub fn quantile_range(&self) -> (f64, f64) {
        self.quantile_range
    }

    /// Fitted lower and upper bounds per column.
    #[must_use]
    pub fn quantiles(&self) -> Option<(&[f64], &[f64])> {
        self.fitted
            .as_ref()
            .map(|f| (f.lower.as_slice(), f.upper.as_slice()))
    }

    fn validate_range(&self) -> Result<()> {
        let (low, high) = self.quantile_range;
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low > high {
            return Err(Error::invalid_parameter(format!(
                "quantile_range must satisfy 0 <= low <= high <= 1, got ({low}, {high})"
            )));
        }
        Ok(())
    }
}

/// Linear-interpolated quantile of the non-NaN values in `values`.
///
/// Returns NaN when no values remain.
pub(crate) fn nan_quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    #[allow(clippy::cast_precision_loss)]
    let pos = q * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
    #[allow(clippy::cast_precision_loss)]
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

impl Transformer for Winsorizer {
    const NAME: &'static str = "Winsorizer";

    fn fit(&mut self, x: &Matrix) -> Result<&mut Self> {
        self.validate_range()?;
        self.nan_policy.check(x)?;

        let (low, high) = self.quantile_range;
        let (lower, upper): (Vec<f64>, Vec<f64>) = (0..x.n_cols())
            .map(|c| {
                let column = x.column(c);
                (nan_quantile(&column, low), nan_quantile(&column, high))
            })
            .unzip();

        debug!(
            "Fitted winsorizer on {} columns with range ({}, {})",
            x.n_cols(),
            low,
            high
        );
        self.fitted = Some(Fitted {
            lower,
            upper,
            feature_names: x.columns().map(<[String]>::to_vec),
        });
        Ok(self)
    }

    fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted(Self::NAME))?;
        check_width(x, fitted.lower.len())?;
        self.nan_policy.check(x)?;

        Ok(x.map_columns(|c, v| {
            if v <= fitted.lower[c] {
                fitted.lower[c]
            } else if v >= fitted.upper[c] {
                fitted.upper[c]
            } else {
                v
            }
        }))
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn n_features_in(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.lower.len())
    }

    fn n_features_out(&self) -> Option<usize> {
        self.n_features_in()
    }

    fn feature_names_out(&self) -> Option<&[String]> {
        self.fitted.as_ref()?.feature_names.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    fn ramp() -> Matrix {
        // 0..=10 in the first column, 100..=110 in the second.
        let rows: Vec<[f64; 2]> = (0..=10)
            .map(|i| [f64::from(i), 100.0 + f64::from(i)])
            .collect();
        Matrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_nan_quantile_linear() {
        assert_close(nan_quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
        assert_close(nan_quantile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert_close(nan_quantile(&[4.0, 1.0, 3.0, 2.0], 1.0), 4.0);
        assert_close(nan_quantile(&[1.0, f64::NAN, 3.0], 0.5), 2.0);
        assert!(nan_quantile(&[f64::NAN], 0.5).is_nan());
        assert!(nan_quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_fit_quantiles() {
        let mut w = Winsorizer::default();
        w.fit(&ramp()).unwrap();
        let (lower, upper) = w.quantiles().unwrap();
        assert_close(lower[0], 1.0);
        assert_close(upper[0], 9.0);
        assert_close(lower[1], 101.0);
        assert_close(upper[1], 109.0);
    }

    #[test]
    fn test_transform_clips() {
        let mut w = Winsorizer::default();
        let out = w.fit_transform(&ramp()).unwrap();
        assert_close(out.get(0, 0), 1.0);
        assert_close(out.get(5, 0), 5.0);
        assert_close(out.get(10, 0), 9.0);
        assert_close(out.get(10, 1), 109.0);
        assert_eq!(w.n_features_out(), Some(2));
    }

    #[test]
    fn test_transform_keeps_nan() {
        let mut w = Winsorizer::default();
        w.fit(&ramp()).unwrap();
        let x = Matrix::from_rows(&[[f64::NAN, 200.0]]).unwrap();
        let out = w.transform(&x).unwrap();
        assert!(out.get(0, 0).is_nan());
        assert_close(out.get(0, 1), 109.0);
    }

    #[test]
    fn test_transform_before_fit() {
        let w = Winsorizer::default();
        assert!(matches!(
            w.transform(&ramp()),
            Err(Error::NotFitted("Winsorizer"))
        ));
    }

    #[test]
    fn test_transform_wrong_width() {
        let mut w = Winsorizer::default();
        w.fit(&ramp()).unwrap();
        let x = Matrix::from_rows(&[[1.0, 2.0, 3.0]]).unwrap();
        assert!(matches!(
            w.transform(&x),
            Err(Error::ShapeMismatch {
                got: 3,
                expected: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_range() {
        let mut w = Winsorizer::new((0.9, 0.1), NanPolicy::Propagate);
        assert!(matches!(w.fit(&ramp()), Err(Error::InvalidParameter(_))));

        let mut w = Winsorizer::new((-0.1, 0.5), NanPolicy::Propagate);
        assert!(w.fit(&ramp()).is_err());
    }

    #[test]
    fn test_raise_policy() {
        let x = Matrix::from_rows(&[[1.0], [f64::NAN]]).unwrap();
        let mut w = Winsorizer::new((0.1, 0.9), NanPolicy::Raise);
        assert!(matches!(
            w.fit(&x),
            Err(Error::NanEncountered { column: 0 })
        ));
    }

    #[test]
    fn test_feature_names_pass_through() {
        let x = ramp().with_columns(["a", "b"]).unwrap();
        let mut w = Winsorizer::default();
        let out = w.fit_transform(&x).unwrap();
        assert_eq!(w.feature_names_out().unwrap(), ["a", "b"]);
        assert_eq!(out.columns().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_all_nan_column_stays_nan() {
        let x = Matrix::from_rows(&[[f64::NAN, 1.0], [f64::NAN, 2.0]]).unwrap();
        let mut w = Winsorizer::default();
        let out = w.fit_transform(&x).unwrap();
        assert!(out.get(0, 0).is_nan());
        assert!(out.get(1, 0).is_nan());
    }

    proptest! {
        #[test]
        fn test_output_within_fitted_bounds(values in prop::collection::vec(-1e6f64..1e6, 1..64)) {
            let rows: Vec<[f64; 1]> = values.iter().map(|v| [*v]).collect();
            let x = Matrix::from_rows(&rows).unwrap();
            let mut w = Winsorizer::new((0.05, 0.95), NanPolicy::Propagate);
            let out = w.fit_transform(&x).unwrap();
            let (lower, upper) = w.quantiles().unwrap();
            for v in out.column(0) {
                prop_assert!(v >= lower[0] && v <= upper[0]);
            }
        }
    }
}
