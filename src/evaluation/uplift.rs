//! Uplift
//!
//! Targeting curves built by ranking validation units on their CATE
//! predictions. For a threshold `mu_q` at percentile `q` of the training
//! predictions, units predicted at or above it are targeted:
//!
//! * QINI: `cov(dr, 1{cate >= mu_q})`, the gain of targeting scaled by the
//!   share targeted.
//! * TOC: the same covariance divided by the share targeted, the excess
//!   effect of the targeted group over the ATE.
//!
//! The coefficient (QINI coefficient or AUTOC) is the trapezoidal integral of
//! the curve. Standard errors and uniform confidence bands come from a
//! weighted bootstrap of the validation sample with thresholds held fixed.
use crate::cate::CatePredictions;
use crate::config::{UpliftConfig, UpliftMetric};
use crate::errors::DRTesterError;
use crate::evaluation::check_shape;
use crate::evaluation::results::{UpliftArm, UpliftPoint, UpliftResults};
use crate::tester::FitState;
use crate::utils::{quantile, sample_std, trapezoid, two_sided_p_value, weighted_quantiles};
use crate::weights::SampleWeights;
use log::{info, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Curve values at every threshold, `weights` may contain zeros.
pub(crate) fn uplift_curve(
    dr: &[f64],
    cate: &[f64],
    weights: &[f64],
    thresholds: &[f64],
    metric: UpliftMetric,
) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    let ate = dr.iter().zip(weights).map(|(d, w)| d * w).sum::<f64>() / total;
    thresholds
        .iter()
        .map(|&mu| {
            let mut share = 0.0;
            let mut gain = 0.0;
            for ((&d, &c), &w) in dr.iter().zip(cate).zip(weights) {
                if c >= mu {
                    share += w;
                    gain += w * d;
                }
            }
            share /= total;
            gain /= total;
            let cov = gain - ate * share;
            match metric {
                UpliftMetric::Qini => cov,
                UpliftMetric::Toc => {
                    if share > 0.0 {
                        cov / share
                    } else {
                        0.0
                    }
                }
            }
        })
        .collect()
}

/// Replication counts of one weighted bootstrap resample.
///
/// Draws `sum(weights)` units with replacement, unit `i` with probability
/// `w_i / sum(weights)`.
fn resample_counts(sampler: &WeightedIndex<f64>, n_units: usize, n_draws: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts = vec![0.0; n_units];
    for _ in 0..n_draws {
        counts[sampler.sample(&mut rng)] += 1.0;
    }
    counts
}

/// Bootstrap inference for one arm given its point curve and resampled curves.
fn summarize_arm(treatment: i64, percentiles: &[f64], xs: &[f64], value: Vec<f64>, boot: &[Vec<f64>]) -> UpliftArm {
    let coefficient = trapezoid(&value, xs);
    let boot_coef: Vec<f64> = boot.iter().map(|c| trapezoid(c, xs)).collect();
    let std_err = sample_std(&boot_coef);
    let p_value = if std_err > 0.0 {
        two_sided_p_value(coefficient, std_err)
    } else {
        warn!(
            "Bootstrap coefficients for treatment {} have no spread, the p-value is undefined.",
            treatment
        );
        f64::NAN
    };

    let point_se: Vec<f64> = (0..value.len())
        .map(|q| sample_std(&boot.iter().map(|c| c[q]).collect::<Vec<f64>>()))
        .collect();

    // studentized deviations, points without bootstrap spread carry no information
    let mut max_abs = Vec::with_capacity(boot.len());
    let mut min_dev = Vec::with_capacity(boot.len());
    for curve in boot {
        let mut hi: f64 = 0.0;
        let mut lo = f64::INFINITY;
        for q in 0..value.len() {
            if point_se[q] > 0.0 {
                let t = (curve[q] - value[q]) / point_se[q];
                hi = hi.max(t.abs());
                lo = lo.min(t);
            }
        }
        max_abs.push(hi);
        min_dev.push(if lo.is_finite() { lo } else { 0.0 });
    }

    let curve = percentiles
        .iter()
        .zip(value.iter())
        .zip(point_se.iter())
        .map(|((&percentile, &v), &se)| UpliftPoint {
            percentile,
            percentage_treated: 100.0 - percentile,
            value: v,
            std_err: se,
        })
        .collect();

    UpliftArm {
        treatment,
        coefficient,
        std_err,
        p_value,
        critical_value_uniform: quantile(&max_abs, 0.95),
        critical_value_one_sided: quantile(&min_dev, 0.05).abs(),
        curve,
    }
}

/// Run the uplift test for the configured metric.
///
/// Requires CATE predictions on the training sample, which fix the curve
/// thresholds. Training weights come from the fitted state when it was fit in
/// [`NuisanceMode::TrainApply`](crate::tester::NuisanceMode::TrainApply) and
/// are uniform otherwise. Resample `b` is drawn from `StdRng::seed_from_u64(seed + b)`, so results
/// do not depend on `parallel`.
pub fn evaluate_uplift(
    state: &FitState,
    preds: &CatePredictions,
    config: &UpliftConfig,
    parallel: bool,
) -> Result<UpliftResults, DRTesterError> {
    config.validate()?;
    let cate_train = preds.train_or_err()?;
    let weights_train = match &state.weights_train {
        Some(w) => w.clone(),
        None => SampleWeights::uniform(cate_train.rows),
    };
    let n = state.dr_val.rows;
    let n_treat = state.treatments.n_treat();
    check_shape("validation CATE predictions", &preds.val, n, n_treat)?;
    check_shape("training CATE predictions", cate_train, weights_train.len(), n_treat)?;

    let w_val = state.weights_val.as_slice();
    let qs: Vec<f64> = config.percentiles.iter().map(|p| p / 100.0).collect();
    let thresholds: Vec<Vec<f64>> = (0..n_treat)
        .map(|k| weighted_quantiles(cate_train.col(k), weights_train.as_slice(), &qs))
        .collect();
    let values: Vec<Vec<f64>> = (0..n_treat)
        .map(|k| uplift_curve(state.dr_val.col(k), preds.val.col(k), w_val, &thresholds[k], config.metric))
        .collect();

    info!(
        "Bootstrapping {} uplift curves with {} resamples.",
        config.metric, config.n_bootstrap
    );
    let sampler = WeightedIndex::new(w_val).map_err(|e| {
        DRTesterError::InvalidParameter("sample_weight".to_string(), "positive weights".to_string(), e.to_string())
    })?;
    let n_draws = state.weights_val.total() as usize;
    let resample = |b: usize| -> Vec<Vec<f64>> {
        let counts = resample_counts(&sampler, n, n_draws, config.seed.wrapping_add(b as u64));
        (0..n_treat)
            .map(|k| uplift_curve(state.dr_val.col(k), preds.val.col(k), &counts, &thresholds[k], config.metric))
            .collect()
    };
    let boot: Vec<Vec<Vec<f64>>> = if parallel {
        (0..config.n_bootstrap).into_par_iter().map(resample).collect()
    } else {
        (0..config.n_bootstrap).map(resample).collect()
    };

    let arms = state
        .treatments
        .treated()
        .iter()
        .zip(values)
        .enumerate()
        .map(|(k, (&treatment, value))| {
            let boot_k: Vec<Vec<f64>> = boot.iter().map(|b| b[k].clone()).collect();
            summarize_arm(treatment, &config.percentiles, &qs, value, &boot_k)
        })
        .collect();
    Ok(UpliftResults {
        metric: config.metric,
        arms,
    })
}
