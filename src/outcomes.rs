//! Doubly Robust Outcomes
//!
//! Augmented inverse propensity weighted (AIPW) pseudo-outcomes. For arm `t`
//! against control `0`:
//!
//! $$
//! dr_t = \mu_t - \mu_0 + \frac{1\{D=t\}}{e_t}(y - \mu_t) - \frac{1\{D=0\}}{e_0}(y - \mu_0)
//! $$
//!
//! The mean of `dr_t` is consistent for the average effect if either the
//! outcome model or the propensity model is correct.
use crate::data::ArmMatrix;
use crate::errors::DRTesterError;
use log::warn;

/// Pseudo-outcomes, one column per non-control arm.
///
/// * `arms` - arm index of every row, `0` is control.
/// * `reg_preds` - predicted outcome under every arm.
/// * `prop_preds` - predicted probability of every arm.
/// * `propensity_clip` - floor applied to propensities used as a denominator,
///   `0.0` leaves them untouched.
pub fn dr_outcomes(
    arms: &[usize],
    y: &[f64],
    reg_preds: &ArmMatrix,
    prop_preds: &ArmMatrix,
    propensity_clip: f64,
) -> Result<ArmMatrix, DRTesterError> {
    let n = y.len();
    if arms.len() != n || reg_preds.rows != n || prop_preds.rows != n {
        return Err(DRTesterError::ShapeMismatch(format!(
            "{} treatments, {} outcomes, {} outcome predictions and {} propensities",
            arms.len(),
            n,
            reg_preds.rows,
            prop_preds.rows
        )));
    }
    if reg_preds.cols != prop_preds.cols || reg_preds.cols < 2 {
        return Err(DRTesterError::ShapeMismatch(format!(
            "outcome predictions for {} arms, propensities for {}",
            reg_preds.cols, prop_preds.cols
        )));
    }
    let n_arms = reg_preds.cols;
    if let Some(&bad) = arms.iter().find(|&&a| a >= n_arms) {
        return Err(DRTesterError::ShapeMismatch(format!("arm {} outside of {} arms", bad, n_arms)));
    }

    // residual term of the observed arm, shared by the arm's own column and control
    let mut clipped = 0usize;
    let ipw: Vec<f64> = (0..n)
        .map(|i| {
            let a = arms[i];
            let mut e = prop_preds.get(i, a);
            if e < propensity_clip {
                e = propensity_clip;
                clipped += 1;
            }
            (y[i] - reg_preds.get(i, a)) / e
        })
        .collect();
    if clipped > 0 {
        warn!(
            "{} propensities below {} were clipped when building doubly robust outcomes.",
            clipped, propensity_clip
        );
    }

    let mut dr = ArmMatrix::zeros(n, n_arms - 1);
    let mu0 = reg_preds.col(0);
    for t in 1..n_arms {
        let mu_t = reg_preds.col(t);
        let out = dr.col_mut(t - 1);
        for i in 0..n {
            let correction = match arms[i] {
                0 => -ipw[i],
                a if a == t => ipw[i],
                _ => 0.0,
            };
            out[i] = mu_t[i] - mu0[i] + correction;
        }
    }
    Ok(dr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    struct Simulated {
        arms: Vec<usize>,
        y: Vec<f64>,
        x: Vec<f64>,
        propensity: Vec<f64>,
    }

    // mu0 = x, mu1 = 1 + 2x, so the average effect is 1
    fn simulate(n: usize, seed: u64) -> Simulated {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut sim = Simulated {
            arms: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            x: Vec::with_capacity(n),
            propensity: Vec::with_capacity(n),
        };
        for _ in 0..n {
            let x: f64 = normal.sample(&mut rng);
            let p = 0.25 + 0.5 * sigmoid(x);
            let d = usize::from(rng.gen::<f64>() < p);
            let y = x + d as f64 * (1.0 + x) + normal.sample(&mut rng);
            sim.arms.push(d);
            sim.y.push(y);
            sim.x.push(x);
            sim.propensity.push(p);
        }
        sim
    }

    fn mean(v: &[f64]) -> f64 {
        v.iter().sum::<f64>() / v.len() as f64
    }

    #[test]
    fn test_dr_unbiased_with_correct_propensity() {
        let n = 50_000;
        let sim = simulate(n, 11);
        let reg = ArmMatrix::zeros(n, 2);
        let prop = ArmMatrix::from_columns(vec![
            sim.propensity.iter().map(|p| 1.0 - p).collect(),
            sim.propensity.clone(),
        ])
        .unwrap();
        let dr = dr_outcomes(&sim.arms, &sim.y, &reg, &prop, 1e-3).unwrap();
        assert!((mean(dr.col(0)) - 1.0).abs() < 0.1, "ate {}", mean(dr.col(0)));

        // ignoring the confounding gives a clearly biased difference in means
        let treated: Vec<f64> = (0..n).filter(|&i| sim.arms[i] == 1).map(|i| sim.y[i]).collect();
        let control: Vec<f64> = (0..n).filter(|&i| sim.arms[i] == 0).map(|i| sim.y[i]).collect();
        assert!((mean(&treated) - mean(&control) - 1.0).abs() > 0.3);
    }

    #[test]
    fn test_dr_unbiased_with_correct_regression() {
        let n = 50_000;
        let sim = simulate(n, 12);
        let reg = ArmMatrix::from_columns(vec![
            sim.x.clone(),
            sim.x.iter().map(|x| 1.0 + 2.0 * x).collect(),
        ])
        .unwrap();
        let prop = ArmMatrix::new(vec![0.5; 2 * n], n, 2).unwrap();
        let dr = dr_outcomes(&sim.arms, &sim.y, &reg, &prop, 1e-3).unwrap();
        assert!((mean(dr.col(0)) - 1.0).abs() < 0.1, "ate {}", mean(dr.col(0)));
    }

    #[test]
    fn test_dr_three_arms_by_hand() {
        // unit 0 in control, unit 1 in arm 1, unit 2 in arm 2
        let arms = [0, 1, 2];
        let y = [1.0, 4.0, 9.0];
        let reg = ArmMatrix::from_row_major(&[0.5, 2.0, 3.0, 1.0, 3.0, 5.0, 2.0, 4.0, 8.0], 3, 3).unwrap();
        let prop = ArmMatrix::from_row_major(&[0.5, 0.25, 0.25, 0.2, 0.4, 0.4, 0.1, 0.1, 0.8], 3, 3).unwrap();
        let dr = dr_outcomes(&arms, &y, &reg, &prop, 0.0).unwrap();
        assert_eq!((dr.rows, dr.cols), (3, 2));
        // control unit: mu_t - mu_0 - (y - mu_0) / e_0
        assert_abs_diff_eq!(dr.get(0, 0), 1.5 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dr.get(0, 1), 2.5 - 1.0, epsilon = 1e-12);
        // arm 1 unit only corrects its own column
        assert_abs_diff_eq!(dr.get(1, 0), 2.0 + 1.0 / 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(dr.get(1, 1), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dr.get(2, 0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dr.get(2, 1), 6.0 + 1.0 / 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_single_arm_is_two_dimensional() {
        let dr = dr_outcomes(
            &[0, 1],
            &[1.0, 2.0],
            &ArmMatrix::zeros(2, 2),
            &ArmMatrix::new(vec![0.5; 4], 2, 2).unwrap(),
            1e-3,
        )
        .unwrap();
        assert_eq!((dr.rows, dr.cols), (2, 1));
        assert_eq!(dr.col(0), &[-2.0, 4.0]);
    }

    #[test]
    fn test_propensity_clip() {
        let reg = ArmMatrix::zeros(2, 2);
        let prop = ArmMatrix::from_row_major(&[1.0, 0.0, 1.0, 0.0], 2, 2).unwrap();
        let clipped = dr_outcomes(&[1, 0], &[1.0, 1.0], &reg, &prop, 1e-3).unwrap();
        assert_abs_diff_eq!(clipped.get(0, 0), 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(clipped.get(1, 0), -1.0, epsilon = 1e-12);

        let raw = dr_outcomes(&[1, 0], &[1.0, 1.0], &reg, &prop, 0.0).unwrap();
        assert!(raw.get(0, 0).is_infinite());
    }

    #[test]
    fn test_shape_errors() {
        let reg = ArmMatrix::zeros(2, 2);
        let prop = ArmMatrix::zeros(3, 2);
        assert!(matches!(
            dr_outcomes(&[0, 1], &[1.0, 2.0], &reg, &prop, 0.0),
            Err(DRTesterError::ShapeMismatch(_))
        ));
        assert!(matches!(
            dr_outcomes(&[0, 2], &[1.0, 2.0], &reg, &ArmMatrix::zeros(2, 2), 0.0),
            Err(DRTesterError::ShapeMismatch(_))
        ));
    }
}
