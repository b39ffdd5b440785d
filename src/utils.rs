//! Utils
//!
//! Weighted statistics shared by the validation tests. Weights are integer
//! replication counts (see [`crate::weights::SampleWeights`]), so every
//! function here returns what its unweighted counterpart returns on the
//! weight-expanded sample.
use crate::errors::DRTesterError;
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Create a string of all available items.
pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), DRTesterError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(DRTesterError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_min_usize_parameter(value: usize, min: usize, parameter: &str) -> Result<(), DRTesterError> {
    if value < min {
        Err(DRTesterError::InvalidParameter(
            parameter.to_string(),
            format!("integer >= {}", min),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Weighted arithmetic mean.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (v, w) in values.iter().zip(weights) {
        num += v * w;
        den += w;
    }
    num / den
}

/// Standard error of the weighted mean.
///
/// `sqrt(s^2 / N)` with `s^2` the sample variance (denominator `N - 1`) of
/// the expanded sample and `N` the total weight. NaN when `N <= 1`.
pub fn weighted_se(values: &[f64], weights: &[f64]) -> f64 {
    let n: f64 = weights.iter().sum();
    if n <= 1.0 {
        return f64::NAN;
    }
    let mean = weighted_mean(values, weights);
    let ss: f64 = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum();
    (ss / (n - 1.0) / n).sqrt()
}

/// Weighted quantiles, `qs` in `[0, 1]`.
///
/// Linear interpolation between order statistics of the expanded sample,
/// the same rule as numpy's default `quantile`. The expanded sample is
/// never materialized: positions are located through cumulative weights.
pub fn weighted_quantiles(values: &[f64], weights: &[f64], qs: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return vec![f64::NAN; qs.len()];
    }
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_unstable_by(|a, b| values[*a].total_cmp(&values[*b]));

    // cumulative[k] = number of expanded items up to and including sorted unit k
    let mut cumulative = Vec::with_capacity(idx.len());
    let mut running = 0.0;
    for i in idx.iter() {
        running += weights[*i];
        cumulative.push(running);
    }
    let total = running;

    // value at 0-based position `pos` of the expanded, sorted sample
    let at = |pos: f64| -> f64 {
        let k = cumulative.partition_point(|&c| c <= pos);
        values[idx[k.min(idx.len() - 1)]]
    };

    qs.iter()
        .map(|&q| {
            let h = q.clamp(0.0, 1.0) * (total - 1.0);
            let lo = h.floor();
            let frac = h - lo;
            let v_lo = at(lo);
            if frac > 0.0 {
                let v_hi = at(lo + 1.0);
                v_lo + frac * (v_hi - v_lo)
            } else {
                v_lo
            }
        })
        .collect()
}

/// Unweighted linear-interpolation quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let ones = vec![1.0; values.len()];
    weighted_quantiles(values, &ones, &[q])[0]
}

/// Sample standard deviation (denominator `n - 1`).
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Trapezoidal integral of `ys` over the grid `xs`.
pub fn trapezoid(ys: &[f64], xs: &[f64]) -> f64 {
    ys.windows(2)
        .zip(xs.windows(2))
        .map(|(y, x)| 0.5 * (y[0] + y[1]) * (x[1] - x[0]))
        .sum()
}

/// Standard normal survival function, `P(Z > x)`.
pub fn normal_sf(x: f64) -> f64 {
    0.5 * erfc(x / SQRT_2)
}

/// Two sided p-value of a z statistic, `2 * P(Z > |estimate / std_err|)`.
pub fn two_sided_p_value(estimate: f64, std_err: f64) -> f64 {
    2.0 * normal_sf((estimate / std_err).abs())
}
