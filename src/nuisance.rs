//! Nuisance Estimation
//!
//! Out-of-sample outcome and propensity predictions feeding the doubly
//! robust outcomes. Two modes are supported:
//!
//! * **Cross-fit** - the sample is split into folds; for every fold the
//!   models are fit on the remaining folds and predict the held-out rows.
//!   The outcome model is fit separately for every arm (T-learner style) and
//!   predicts every held-out row, so each row gets a counterfactual outcome
//!   under every arm without being predicted by a model trained on itself.
//! * **Train/apply** - models are fit on a training sample and predict the
//!   whole validation sample.
use crate::data::{ArmMatrix, Matrix};
use crate::errors::DRTesterError;
use crate::folds::Fold;
use crate::models::{Classifier, Regressor};
use crate::treatments::Treatments;
use crate::weights::SampleWeights;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Features, treatment labels, outcomes and optional weights of one sample.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub x: Matrix<'a, f64>,
    pub d: &'a [i64],
    pub y: &'a [f64],
    pub weights: Option<&'a SampleWeights>,
}

impl<'a> Sample<'a> {
    /// Create an unweighted sample.
    pub fn new(x: Matrix<'a, f64>, d: &'a [i64], y: &'a [f64]) -> Self {
        Sample { x, d, y, weights: None }
    }

    /// Attach replication weights.
    pub fn with_weights(mut self, weights: &'a SampleWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.x.rows
    }

    /// Check that every component has one entry per row.
    pub fn validate(&self) -> Result<(), DRTesterError> {
        let n = self.x.rows;
        if self.d.len() != n || self.y.len() != n {
            return Err(DRTesterError::ShapeMismatch(format!(
                "{} rows of features, {} treatments and {} outcomes",
                n,
                self.d.len(),
                self.y.len()
            )));
        }
        if let Some(w) = self.weights {
            if w.len() != n {
                return Err(DRTesterError::ShapeMismatch(format!(
                    "{} sample weights provided for {} rows",
                    w.len(),
                    n
                )));
            }
        }
        Ok(())
    }
}

/// Nuisance predictions aligned to the predicted sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuisancePredictions {
    /// Predicted outcome under every arm, `n x n_arms`.
    pub reg_preds: ArmMatrix,
    /// Predicted probability of every arm, `n x n_arms`.
    pub prop_preds: ArmMatrix,
}

fn check_proba(proba: &ArmMatrix, rows: usize, n_arms: usize) -> Result<(), DRTesterError> {
    if proba.rows != rows || proba.cols != n_arms {
        return Err(DRTesterError::ShapeMismatch(format!(
            "propensity model returned {} x {} probabilities, expected {} x {}",
            proba.rows, proba.cols, rows, n_arms
        )));
    }
    Ok(())
}

fn check_predictions(preds: &[f64], rows: usize) -> Result<(), DRTesterError> {
    if preds.len() != rows {
        return Err(DRTesterError::ShapeMismatch(format!(
            "regression model returned {} predictions, expected {}",
            preds.len(),
            rows
        )));
    }
    Ok(())
}

/// Fit a fresh copy of the outcome model on `rows` and predict `x_pred`.
#[allow(clippy::too_many_arguments)]
fn fit_predict_arm<R: Regressor>(
    regression: &R,
    x: &Matrix<f64>,
    y: &[f64],
    weights: &SampleWeights,
    rows: &[usize],
    x_pred: &Matrix<f64>,
    arm: i64,
    fold: usize,
) -> Result<Vec<f64>, DRTesterError> {
    if rows.is_empty() {
        return Err(DRTesterError::EmptyArm { arm, fold });
    }
    let x_arm = x.select_rows(rows);
    let y_arm: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
    let w_arm = weights.select(rows);
    let mut model = regression.clone();
    model.fit(&Matrix::new(&x_arm, rows.len(), x.cols), &y_arm, w_arm.as_slice())?;
    let preds = model.predict(x_pred)?;
    check_predictions(&preds, x_pred.rows)?;
    Ok(preds)
}

/// Cross-fitted nuisance predictions on a single sample.
///
/// * `arms` - arm index of every row (see [`Treatments::encode`]).
/// * `folds` - splits holding out every row exactly once.
/// * `parallel` - fit the folds on the current rayon pool.
#[allow(clippy::too_many_arguments)]
pub fn cross_fit<R: Regressor, C: Classifier>(
    regression: &R,
    propensity: &C,
    x: &Matrix<f64>,
    arms: &[usize],
    y: &[f64],
    weights: &SampleWeights,
    treatments: &Treatments,
    folds: &[Fold],
    parallel: bool,
) -> Result<NuisancePredictions, DRTesterError> {
    let n = x.rows;
    let n_arms = treatments.n_arms();
    info!("Cross-fitting nuisance models on {} rows with {} folds.", n, folds.len());

    let fit_fold = |f: usize, fold: &Fold| -> Result<(ArmMatrix, ArmMatrix), DRTesterError> {
        debug!("Fold {}: {} train rows, {} test rows.", f, fold.train.len(), fold.test.len());
        let x_train_data = x.select_rows(&fold.train);
        let x_train = Matrix::new(&x_train_data, fold.train.len(), x.cols);
        let x_test_data = x.select_rows(&fold.test);
        let x_test = Matrix::new(&x_test_data, fold.test.len(), x.cols);

        let arms_train: Vec<usize> = fold.train.iter().map(|&i| arms[i]).collect();
        let w_train = weights.select(&fold.train);
        let mut prop_model = propensity.clone();
        prop_model.fit(&x_train, &arms_train, n_arms, w_train.as_slice())?;
        let proba = prop_model.predict_proba(&x_test)?;
        check_proba(&proba, fold.test.len(), n_arms)?;

        let columns = (0..n_arms)
            .map(|k| {
                let rows: Vec<usize> = fold.train.iter().copied().filter(|&i| arms[i] == k).collect();
                fit_predict_arm(regression, x, y, weights, &rows, &x_test, treatments.labels[k], f)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((ArmMatrix::from_columns(columns)?, proba))
    };

    let blocks: Vec<(ArmMatrix, ArmMatrix)> = if parallel {
        folds
            .par_iter()
            .enumerate()
            .map(|(f, fold)| fit_fold(f, fold))
            .collect::<Result<_, _>>()?
    } else {
        folds
            .iter()
            .enumerate()
            .map(|(f, fold)| fit_fold(f, fold))
            .collect::<Result<_, _>>()?
    };

    let mut reg_preds = ArmMatrix::zeros(n, n_arms);
    let mut prop_preds = ArmMatrix::zeros(n, n_arms);
    for (fold, (reg_block, prop_block)) in folds.iter().zip(blocks.iter()) {
        reg_preds.scatter_rows(&fold.test, reg_block);
        prop_preds.scatter_rows(&fold.test, prop_block);
    }
    info!("Finished cross-fitting nuisance models.");
    Ok(NuisancePredictions { reg_preds, prop_preds })
}

/// Fit nuisance models on a training sample and predict a validation sample.
///
/// The propensity model is fit once on all training rows; the outcome model
/// is fit on the training rows of each arm and predicts every validation row.
#[allow(clippy::too_many_arguments)]
pub fn train_apply<R: Regressor, C: Classifier>(
    regression: &R,
    propensity: &C,
    x_train: &Matrix<f64>,
    arms_train: &[usize],
    y_train: &[f64],
    weights_train: &SampleWeights,
    x_val: &Matrix<f64>,
    treatments: &Treatments,
    parallel: bool,
) -> Result<NuisancePredictions, DRTesterError> {
    let n_arms = treatments.n_arms();
    info!(
        "Fitting nuisance models on {} training rows, predicting {} validation rows.",
        x_train.rows, x_val.rows
    );
    if x_train.cols != x_val.cols {
        return Err(DRTesterError::ShapeMismatch(format!(
            "training sample has {} features, validation sample {}",
            x_train.cols, x_val.cols
        )));
    }

    let mut prop_model = propensity.clone();
    prop_model.fit(x_train, arms_train, n_arms, weights_train.as_slice())?;
    let prop_preds = prop_model.predict_proba(x_val)?;
    check_proba(&prop_preds, x_val.rows, n_arms)?;

    let fit_arm = |k: usize| -> Result<Vec<f64>, DRTesterError> {
        let rows: Vec<usize> = (0..x_train.rows).filter(|&i| arms_train[i] == k).collect();
        fit_predict_arm(
            regression,
            x_train,
            y_train,
            weights_train,
            &rows,
            x_val,
            treatments.labels[k],
            0,
        )
    };
    let columns: Vec<Vec<f64>> = if parallel {
        (0..n_arms).into_par_iter().map(fit_arm).collect::<Result<_, _>>()?
    } else {
        (0..n_arms).map(fit_arm).collect::<Result<_, _>>()?
    };

    Ok(NuisancePredictions {
        reg_preds: ArmMatrix::from_columns(columns)?,
        prop_preds,
    })
}
