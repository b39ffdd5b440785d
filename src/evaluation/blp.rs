//! Best Linear Predictor
//!
//! Weighted least squares of the doubly robust outcomes on an intercept and
//! the CATE predictions, with HC1 robust standard errors. A slope close to
//! one means the predictions capture the heterogeneity present in the data,
//! a slope close to zero means they capture none.
use crate::cate::CatePredictions;
use crate::errors::DRTesterError;
use crate::evaluation::check_shape;
use crate::evaluation::results::{BLPResults, BlpArm};
use crate::linalg::{invert_spd, sandwich};
use crate::tester::FitState;
use crate::utils::two_sided_p_value;
use log::warn;

/// Coefficients and HC1 standard errors of `y ~ 1 + x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    pub intercept_std_err: f64,
    pub slope_std_err: f64,
}

/// Weighted least squares of `y` on `[1, x]` with HC1 covariance.
///
/// Weights are replication counts: the bread is `sum w x x^T`, the meat
/// `sum w e^2 x x^T` and the degrees of freedom correction `N / (N - 2)`
/// uses `N = sum w`, which matches HC1 on the expanded sample.
pub(crate) fn wls_hc1(x: &[f64], y: &[f64], w: &[f64]) -> Result<LinearFit, DRTesterError> {
    let n: f64 = w.iter().sum();
    if n <= 2.0 {
        return Err(DRTesterError::SingularMatrix);
    }
    let mut bread = [0.0; 4];
    let mut xty = [0.0; 2];
    for ((&xi, &yi), &wi) in x.iter().zip(y).zip(w) {
        bread[0] += wi;
        bread[1] += wi * xi;
        bread[3] += wi * xi * xi;
        xty[0] += wi * yi;
        xty[1] += wi * xi * yi;
    }
    bread[2] = bread[1];
    let inv = invert_spd(&bread, 2)?;
    let intercept = inv[0] * xty[0] + inv[1] * xty[1];
    let slope = inv[2] * xty[0] + inv[3] * xty[1];

    let mut meat = [0.0; 4];
    for ((&xi, &yi), &wi) in x.iter().zip(y).zip(w) {
        let e = yi - intercept - slope * xi;
        let we2 = wi * e * e;
        meat[0] += we2;
        meat[1] += we2 * xi;
        meat[3] += we2 * xi * xi;
    }
    meat[2] = meat[1];
    let scale = n / (n - 2.0);
    let cov = sandwich(&inv, &meat, 2);
    Ok(LinearFit {
        intercept,
        slope,
        intercept_std_err: (scale * cov[0]).sqrt(),
        slope_std_err: (scale * cov[3]).sqrt(),
    })
}

/// Run the best linear predictor test on the validation sample.
///
/// A singular design, e.g. constant predictions, yields NaN statistics for
/// that arm.
pub fn evaluate_blp(state: &FitState, preds: &CatePredictions) -> Result<BLPResults, DRTesterError> {
    let n = state.dr_val.rows;
    let n_treat = state.treatments.n_treat();
    check_shape("validation CATE predictions", &preds.val, n, n_treat)?;
    let w = state.weights_val.as_slice();

    let arms = state
        .treatments
        .treated()
        .iter()
        .enumerate()
        .map(|(k, &treatment)| match wls_hc1(preds.val.col(k), state.dr_val.col(k), w) {
            Ok(fit) => BlpArm {
                treatment,
                intercept: fit.intercept,
                intercept_std_err: fit.intercept_std_err,
                slope: fit.slope,
                std_err: fit.slope_std_err,
                p_value: two_sided_p_value(fit.slope, fit.slope_std_err),
            },
            Err(_) => {
                warn!(
                    "Best linear predictor design for treatment {} is singular, predictions may be constant.",
                    treatment
                );
                BlpArm {
                    treatment,
                    intercept: f64::NAN,
                    intercept_std_err: f64::NAN,
                    slope: f64::NAN,
                    std_err: f64::NAN,
                    p_value: f64::NAN,
                }
            }
        })
        .collect();
    Ok(BLPResults { arms })
}
