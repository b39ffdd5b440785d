//! Models
//!
//! Capability interfaces for the models a [`DRTester`](crate::tester::DRTester)
//! works with, plus two reference nuisance models.
//!
//! * [`Regressor`] - outcome model, fit per treatment arm.
//! * [`Classifier`] - propensity model, predicts the probability of every arm.
//! * [`CateModel`] - the fitted treatment effect model under validation.
//!
//! Nuisance models are cloned from a prototype for every fold and arm, so a
//! fit never observes rows it later predicts.
use crate::cate::Effect;
use crate::data::{ArmMatrix, Matrix};
use crate::errors::DRTesterError;

pub mod linear;
pub mod logistic;

pub use linear::LinearRegression;
pub use logistic::LogisticRegression;

/// Weighted regression model.
pub trait Regressor: Clone + Send + Sync {
    /// Fit the model on `x`, `y` with replication weights.
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64], sample_weight: &[f64]) -> Result<(), DRTesterError>;
    /// Predict one value per row of `x`.
    fn predict(&self, x: &Matrix<f64>) -> Result<Vec<f64>, DRTesterError>;
}

/// Weighted probabilistic classifier.
pub trait Classifier: Clone + Send + Sync {
    /// Fit on class labels `0..n_classes`.
    ///
    /// A class may be absent from `labels`, the model must still return a
    /// column for it.
    fn fit(
        &mut self,
        x: &Matrix<f64>,
        labels: &[usize],
        n_classes: usize,
        sample_weight: &[f64],
    ) -> Result<(), DRTesterError>;
    /// Class probabilities, `rows x n_classes`.
    fn predict_proba(&self, x: &Matrix<f64>) -> Result<ArmMatrix, DRTesterError>;
}

/// A fitted conditional average treatment effect model.
pub trait CateModel: Sync {
    /// Predicted effect of moving each row of `x` from treatment `t0` to `t1`.
    fn effect(&self, x: &Matrix<f64>, t0: i64, t1: i64) -> Result<Effect, DRTesterError>;
}

/// Design matrix row `i`, with a leading one when `fit_intercept`.
pub(crate) fn design_row(x: &Matrix<f64>, i: usize, fit_intercept: bool, out: &mut Vec<f64>) {
    out.clear();
    if fit_intercept {
        out.push(1.0);
    }
    out.extend(x.get_row_iter(i).copied());
}
