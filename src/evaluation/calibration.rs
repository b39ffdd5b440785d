//! Calibration
//!
//! Validation units are grouped into bins cut at quantiles of the training
//! predictions. Within each bin the average doubly robust outcome (GATE) is
//! compared to the average prediction, and to the overall ATE:
//!
//! $$
//! R^2_{cal} = 1 - \frac{\sum_i \pi_i |GATE_i - \overline{CATE}_i|}{\sum_i \pi_i |GATE_i - ATE|}
//! $$
use crate::cate::CatePredictions;
use crate::config::CalibrationConfig;
use crate::errors::DRTesterError;
use crate::evaluation::check_shape;
use crate::evaluation::results::{CalibrationArm, CalibrationGroup, CalibrationResults};
use crate::tester::FitState;
use crate::utils::{linspace, weighted_mean, weighted_quantiles, weighted_se};
use log::{debug, warn};

/// Bin of `value` given ascending `cuts`, the last bin is closed.
fn bin_of(value: f64, cuts: &[f64]) -> Option<usize> {
    let n_groups = cuts.len() - 1;
    (0..n_groups).find(|&i| {
        let upper_ok = if i + 1 == n_groups {
            value <= cuts[i + 1]
        } else {
            value < cuts[i + 1]
        };
        value >= cuts[i] && upper_ok
    })
}

fn calibrate_arm(
    treatment: i64,
    ate: f64,
    dr_val: &[f64],
    cate_val: &[f64],
    w_val: &[f64],
    cuts: &[f64],
) -> CalibrationArm {
    let n_groups = cuts.len() - 1;
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_groups];
    for (i, &c) in cate_val.iter().enumerate() {
        if let Some(g) = bin_of(c, cuts) {
            members[g].push(i);
        }
    }
    let w_total: f64 = w_val.iter().sum();

    let mut grouped_error = 0.0;
    let mut overall_error = 0.0;
    let groups: Vec<CalibrationGroup> = members
        .iter()
        .enumerate()
        .map(|(index, rows)| {
            if rows.is_empty() {
                debug!("Calibration bin {} of treatment {} is empty.", index, treatment);
                return CalibrationGroup {
                    index,
                    probability: 0.0,
                    gate: 0.0,
                    se_gate: 0.0,
                    g_cate: 0.0,
                    se_g_cate: 0.0,
                };
            }
            let w: Vec<f64> = rows.iter().map(|&i| w_val[i]).collect();
            let dr: Vec<f64> = rows.iter().map(|&i| dr_val[i]).collect();
            let cate: Vec<f64> = rows.iter().map(|&i| cate_val[i]).collect();
            let probability = w.iter().sum::<f64>() / w_total;
            let gate = weighted_mean(&dr, &w);
            let g_cate = weighted_mean(&cate, &w);
            grouped_error += probability * (gate - g_cate).abs();
            overall_error += probability * (gate - ate).abs();
            CalibrationGroup {
                index,
                probability,
                gate,
                se_gate: weighted_se(&dr, &w),
                g_cate,
                se_g_cate: weighted_se(&cate, &w),
            }
        })
        .collect();

    let r_squared = if overall_error == 0.0 {
        warn!(
            "Group effects of treatment {} all equal the ATE, calibration score is undefined.",
            treatment
        );
        f64::NAN
    } else {
        1.0 - grouped_error / overall_error
    };
    CalibrationArm {
        treatment,
        r_squared,
        grouped_error,
        overall_error,
        groups,
    }
}

/// Run the calibration test.
///
/// Requires a fit on a separate training sample and CATE predictions on it,
/// see [`NuisanceMode::TrainApply`](crate::tester::NuisanceMode::TrainApply).
pub fn evaluate_calibration(
    state: &FitState,
    preds: &CatePredictions,
    config: &CalibrationConfig,
) -> Result<CalibrationResults, DRTesterError> {
    config.validate()?;
    let (_, weights_train) = state.train_or_err()?;
    let cate_train = preds.train_or_err()?;
    let n_treat = state.treatments.n_treat();
    check_shape("validation CATE predictions", &preds.val, state.dr_val.rows, n_treat)?;
    check_shape("training CATE predictions", cate_train, weights_train.len(), n_treat)?;

    let qs = linspace(0.0, 1.0, config.n_groups + 1);
    let arms = state
        .treatments
        .treated()
        .iter()
        .enumerate()
        .map(|(k, &treatment)| {
            let cuts = weighted_quantiles(cate_train.col(k), weights_train.as_slice(), &qs);
            calibrate_arm(
                treatment,
                state.ate_val[k],
                state.dr_val.col(k),
                preds.val.col(k),
                state.weights_val.as_slice(),
                &cuts,
            )
        })
        .collect();
    Ok(CalibrationResults { arms })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_of() {
        let cuts = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(bin_of(0.0, &cuts), Some(0));
        assert_eq!(bin_of(0.5, &cuts), Some(0));
        assert_eq!(bin_of(1.0, &cuts), Some(1));
        assert_eq!(bin_of(3.0, &cuts), Some(2));
        assert_eq!(bin_of(-0.1, &cuts), None);
        assert_eq!(bin_of(3.1, &cuts), None);
    }

    #[test]
    fn test_calibrate_arm_by_hand() {
        // two bins: [0, 1) and [1, 2]
        let cuts = [0.0, 1.0, 2.0];
        let cate = [0.5, 0.5, 1.5, 1.5];
        let dr = [1.0, 0.0, 2.0, 2.0];
        let arm = calibrate_arm(1, 1.25, &dr, &cate, &[1.0; 4], &cuts);
        assert_eq!(arm.groups.len(), 2);
        assert_eq!(arm.groups[0].probability, 0.5);
        assert_eq!(arm.groups[0].gate, 0.5);
        assert_eq!(arm.groups[1].gate, 2.0);
        // grouped: 0.5 * 0 + 0.5 * 0.5, overall: 0.5 * 0.75 + 0.5 * 0.75
        assert!((arm.grouped_error - 0.25).abs() < 1e-12);
        assert!((arm.overall_error - 0.75).abs() < 1e-12);
        assert!((arm.r_squared - (1.0 - 0.25 / 0.75)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_bin_contributes_nothing() {
        let cuts = [0.0, 1.0, 2.0, 3.0];
        let cate = [0.5, 2.5];
        let dr = [0.0, 3.0];
        let arm = calibrate_arm(1, 1.5, &dr, &cate, &[1.0; 2], &cuts);
        assert_eq!(arm.groups[1].probability, 0.0);
        assert_eq!(arm.groups[1].gate, 0.0);
        assert!((arm.groups[0].probability + arm.groups[2].probability - 1.0).abs() < 1e-12);
    }
}
