//! Linear Regression
//!
//! Weighted (ridge) least squares, solved through the normal equations.
use crate::data::Matrix;
use crate::errors::DRTesterError;
use crate::linalg::solve_spd;
use crate::models::{design_row, Regressor};
use serde::{Deserialize, Serialize};

/// Weighted least squares regressor.
///
/// Minimizes $\sum_i w_i (y_i - x_i^T \beta)^2 + \alpha \lVert \beta_{-0} \rVert^2$,
/// the intercept is never penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Ridge penalty.
    pub alpha: f64,
    /// Whether to fit an intercept.
    pub fit_intercept: bool,
    /// Fitted coefficients, intercept first when fitted.
    pub coefficients: Vec<f64>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        LinearRegression {
            alpha: 0.0,
            fit_intercept: true,
            coefficients: Vec::new(),
        }
    }
}

impl LinearRegression {
    /// Set the ridge penalty.
    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set whether an intercept is fitted.
    pub fn set_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    fn n_params(&self, cols: usize) -> usize {
        cols + usize::from(self.fit_intercept)
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64], sample_weight: &[f64]) -> Result<(), DRTesterError> {
        if y.len() != x.rows || sample_weight.len() != x.rows {
            return Err(DRTesterError::ShapeMismatch(format!(
                "{} rows of features, {} outcomes and {} weights",
                x.rows,
                y.len(),
                sample_weight.len()
            )));
        }
        let d = self.n_params(x.cols);
        let mut xtwx = vec![0.0; d * d];
        let mut xtwy = vec![0.0; d];
        let mut row = Vec::with_capacity(d);
        for i in 0..x.rows {
            design_row(x, i, self.fit_intercept, &mut row);
            let w = sample_weight[i];
            for a in 0..d {
                let wa = w * row[a];
                xtwy[a] += wa * y[i];
                for b in 0..=a {
                    xtwx[a * d + b] += wa * row[b];
                }
            }
        }
        for a in 0..d {
            for b in 0..a {
                xtwx[b * d + a] = xtwx[a * d + b];
            }
        }
        let first_penalized = usize::from(self.fit_intercept);
        for a in first_penalized..d {
            xtwx[a * d + a] += self.alpha;
        }
        self.coefficients = solve_spd(&xtwx, &xtwy, d)?;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, DRTesterError> {
        if self.coefficients.is_empty() {
            return Err(DRTesterError::Precondition(
                "LinearRegression must be fit before predicting".to_string(),
            ));
        }
        if self.coefficients.len() != self.n_params(x.cols) {
            return Err(DRTesterError::ShapeMismatch(format!(
                "model fitted with {} parameters, got {} features",
                self.coefficients.len(),
                x.cols
            )));
        }
        let mut row = Vec::with_capacity(self.coefficients.len());
        Ok((0..x.rows)
            .map(|i| {
                design_row(x, i, self.fit_intercept, &mut row);
                row.iter().zip(self.coefficients.iter()).map(|(a, b)| a * b).sum()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_regression_exact_fit() {
        // y = 1 + 2 x0 - x1
        let x0 = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let x1 = [1.0, 0.0, 2.0, 1.0, 3.0, 0.5];
        let y: Vec<f64> = x0.iter().zip(x1.iter()).map(|(a, b)| 1.0 + 2.0 * a - b).collect();
        let data: Vec<f64> = x0.iter().chain(x1.iter()).copied().collect();
        let x = Matrix::new(&data, 6, 2);

        let mut model = LinearRegression::default();
        model.fit(&x, &y, &[1.0; 6]).unwrap();
        assert_abs_diff_eq!(model.coefficients[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.coefficients[1], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(model.coefficients[2], -1.0, epsilon = 1e-9);

        let preds = model.predict(&x).unwrap();
        for (p, t) in preds.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_linear_regression_weights_are_replications() {
        let data = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 2.0, 1.0, 5.0];
        let x = Matrix::new(&data, 4, 1);
        let mut weighted = LinearRegression::default();
        weighted.fit(&x, &y, &[1.0, 3.0, 1.0, 2.0]).unwrap();

        let data_e = [0.0, 1.0, 1.0, 1.0, 2.0, 3.0, 3.0];
        let y_e = [0.0, 2.0, 2.0, 2.0, 1.0, 5.0, 5.0];
        let x_e = Matrix::new(&data_e, 7, 1);
        let mut expanded = LinearRegression::default();
        expanded.fit(&x_e, &y_e, &[1.0; 7]).unwrap();

        for (a, b) in weighted.coefficients.iter().zip(expanded.coefficients.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_linear_regression_errors() {
        let data = [1.0, 1.0, 1.0];
        let x = Matrix::new(&data, 3, 1);
        let model = LinearRegression::default();
        assert!(matches!(model.predict(&x), Err(DRTesterError::Precondition(_))));

        // constant feature collinear with the intercept
        let mut model = LinearRegression::default();
        assert!(matches!(
            model.fit(&x, &[1.0, 2.0, 3.0], &[1.0; 3]),
            Err(DRTesterError::SingularMatrix)
        ));
    }
}
