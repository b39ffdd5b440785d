//! Logistic Regression
//!
//! One-vs-rest weighted logistic regression with an L2 penalty, fit by
//! Newton-Raphson. Used as a propensity model.
use crate::data::{ArmMatrix, Matrix};
use crate::errors::DRTesterError;
use crate::linalg::solve_spd;
use crate::models::{design_row, Classifier};
use serde::{Deserialize, Serialize};

/// Ridge added to the Hessian so that separable classes still solve.
const HESSIAN_JITTER: f64 = 1e-10;

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Per-class fit state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassFit {
    /// Class never observed in training, probability 0.
    Absent,
    /// Only class observed in training, probability 1.
    Certain,
    /// Fitted coefficients, intercept first.
    Coefficients(Vec<f64>),
}

/// Weighted one-vs-rest logistic regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// L2 penalty on the non-intercept coefficients.
    pub alpha: f64,
    /// Maximum number of Newton iterations per class.
    pub max_iter: usize,
    /// Convergence tolerance on the largest coefficient update.
    pub tol: f64,
    /// Fitted classes.
    pub classes: Vec<ClassFit>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        LogisticRegression {
            alpha: 1.0,
            max_iter: 100,
            tol: 1e-8,
            classes: Vec::new(),
        }
    }
}

impl LogisticRegression {
    /// Set the L2 penalty.
    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the maximum number of Newton iterations.
    pub fn set_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn fit_binary(&self, x: &Matrix<f64>, target: &[f64], sample_weight: &[f64]) -> Result<Vec<f64>, DRTesterError> {
        let d = x.cols + 1;
        let mut beta = vec![0.0; d];
        let mut row = Vec::with_capacity(d);
        for _ in 0..self.max_iter {
            let mut grad = vec![0.0; d];
            let mut hess = vec![0.0; d * d];
            for i in 0..x.rows {
                design_row(x, i, true, &mut row);
                let z: f64 = row.iter().zip(beta.iter()).map(|(a, b)| a * b).sum();
                let p = sigmoid(z);
                let w = sample_weight[i];
                let r = w * (p - target[i]);
                let h = w * p * (1.0 - p);
                for a in 0..d {
                    grad[a] += r * row[a];
                    for b in 0..=a {
                        hess[a * d + b] += h * row[a] * row[b];
                    }
                }
            }
            for a in 0..d {
                for b in 0..a {
                    hess[b * d + a] = hess[a * d + b];
                }
                hess[a * d + a] += HESSIAN_JITTER;
                if a > 0 {
                    grad[a] += self.alpha * beta[a];
                    hess[a * d + a] += self.alpha;
                }
            }
            let step = solve_spd(&hess, &grad, d)?;
            let mut max_step: f64 = 0.0;
            for (b, s) in beta.iter_mut().zip(step.iter()) {
                *b -= s;
                max_step = max_step.max(s.abs());
            }
            if max_step < self.tol {
                break;
            }
        }
        Ok(beta)
    }
}

impl Classifier for LogisticRegression {
    fn fit(
        &mut self,
        x: &Matrix<f64>,
        labels: &[usize],
        n_classes: usize,
        sample_weight: &[f64],
    ) -> Result<(), DRTesterError> {
        if labels.len() != x.rows || sample_weight.len() != x.rows {
            return Err(DRTesterError::ShapeMismatch(format!(
                "{} rows of features, {} labels and {} weights",
                x.rows,
                labels.len(),
                sample_weight.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(DRTesterError::ShapeMismatch(format!(
                "label {} outside of {} classes",
                bad, n_classes
            )));
        }
        let mut class_weight = vec![0.0; n_classes];
        for (&l, &w) in labels.iter().zip(sample_weight) {
            class_weight[l] += w;
        }
        let total: f64 = class_weight.iter().sum();

        let mut classes = Vec::with_capacity(n_classes);
        for (c, &cw) in class_weight.iter().enumerate() {
            if cw == 0.0 {
                classes.push(ClassFit::Absent);
            } else if cw == total {
                classes.push(ClassFit::Certain);
            } else {
                let target: Vec<f64> = labels.iter().map(|&l| if l == c { 1.0 } else { 0.0 }).collect();
                classes.push(ClassFit::Coefficients(self.fit_binary(x, &target, sample_weight)?));
            }
        }
        self.classes = classes;
        Ok(())
    }

    fn predict_proba(&self, x: &Matrix<f64>) -> Result<ArmMatrix, DRTesterError> {
        if self.classes.is_empty() {
            return Err(DRTesterError::Precondition(
                "LogisticRegression must be fit before predicting".to_string(),
            ));
        }
        let n_classes = self.classes.len();
        let mut out = ArmMatrix::zeros(x.rows, n_classes);
        let mut row = Vec::with_capacity(x.cols + 1);
        let mut scores = vec![0.0; n_classes];
        for i in 0..x.rows {
            design_row(x, i, true, &mut row);
            for (c, fit) in self.classes.iter().enumerate() {
                scores[c] = match fit {
                    ClassFit::Absent => 0.0,
                    ClassFit::Certain => 1.0,
                    ClassFit::Coefficients(beta) => {
                        if beta.len() != row.len() {
                            return Err(DRTesterError::ShapeMismatch(format!(
                                "model fitted on {} features, got {}",
                                beta.len() - 1,
                                x.cols
                            )));
                        }
                        sigmoid(row.iter().zip(beta.iter()).map(|(a, b)| a * b).sum())
                    }
                };
            }
            let sum: f64 = scores.iter().sum();
            for (c, s) in scores.iter().enumerate() {
                let p = if sum > 0.0 { s / sum } else { 1.0 / n_classes as f64 };
                out.set(i, c, p);
            }
        }
        Ok(out)
    }
}
