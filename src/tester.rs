//! DRTester
//!
//! Validates a fitted CATE model with doubly robust outcomes.
//!
//! 1. [`DRTester::fit_nuisance`] fits outcome and propensity models and
//!    returns a [`FitState`] holding the doubly robust outcomes.
//! 2. [`DRTester::cate_predictions`] queries the CATE model once.
//! 3. Any of [`DRTester::evaluate_blp`], [`DRTester::evaluate_cal`],
//!    [`DRTester::evaluate_uplift`] or [`DRTester::evaluate_all`] run on the
//!    two values above. Neither is modified, so tests may run in any order
//!    or concurrently.
use crate::cate::{predict_effects, CatePredictions};
use crate::config::{CalibrationConfig, TesterConfig, UpliftConfig, UpliftMetric};
use crate::data::{ArmMatrix, Matrix};
use crate::errors::DRTesterError;
use crate::evaluation::{self, BLPResults, CalibrationResults, EvaluationResults, UpliftResults};
use crate::models::{CateModel, Classifier, Regressor};
use crate::nuisance::{cross_fit, train_apply, Sample};
use crate::outcomes::dr_outcomes;
use crate::treatments::Treatments;
use crate::utils::weighted_mean;
use crate::weights::SampleWeights;
use log::info;
use serde::{Deserialize, Serialize};

/// How nuisance predictions for the validation sample are obtained.
#[derive(Debug, Clone, Copy)]
pub enum NuisanceMode<'a> {
    /// Cross-fit on the validation sample alone.
    CrossFit,
    /// Fit on this training sample and predict the validation sample.
    /// Training outcomes are cross-fit as well, which the calibration and
    /// uplift tests require.
    TrainApply(Sample<'a>),
}

/// Mode a [`FitState`] was produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMode {
    CrossFit,
    TrainApply,
}

/// Doubly robust outcomes and weights of a nuisance fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitState {
    pub treatments: Treatments,
    pub mode: FitMode,
    /// `n_val x n_treat` doubly robust outcomes.
    pub dr_val: ArmMatrix,
    /// `n_train x n_treat` doubly robust outcomes, train/apply mode only.
    pub dr_train: Option<ArmMatrix>,
    /// Weighted mean of `dr_val` per arm.
    pub ate_val: Vec<f64>,
    pub weights_val: SampleWeights,
    pub weights_train: Option<SampleWeights>,
}

impl FitState {
    /// Build a state from doubly robust outcomes computed elsewhere.
    ///
    /// * `train` - training outcomes and weights; their presence sets the
    ///   mode to [`FitMode::TrainApply`].
    pub fn new(
        treatments: Treatments,
        dr_val: ArmMatrix,
        weights_val: SampleWeights,
        train: Option<(ArmMatrix, SampleWeights)>,
    ) -> Result<Self, DRTesterError> {
        let n_treat = treatments.n_treat();
        evaluation::check_shape("validation outcomes", &dr_val, weights_val.len(), n_treat)?;
        if let Some((dr_train, weights_train)) = &train {
            evaluation::check_shape("training outcomes", dr_train, weights_train.len(), n_treat)?;
        }
        let ate_val = (0..n_treat)
            .map(|k| weighted_mean(dr_val.col(k), weights_val.as_slice()))
            .collect();
        let (mode, dr_train, weights_train) = match train {
            Some((dr, w)) => (FitMode::TrainApply, Some(dr), Some(w)),
            None => (FitMode::CrossFit, None, None),
        };
        Ok(FitState {
            treatments,
            mode,
            dr_val,
            dr_train,
            ate_val,
            weights_val,
            weights_train,
        })
    }

    /// Training outcomes and weights, required by the calibration test.
    pub fn train_or_err(&self) -> Result<(&ArmMatrix, &SampleWeights), DRTesterError> {
        match (&self.dr_train, &self.weights_train) {
            (Some(dr), Some(w)) => Ok((dr, w)),
            _ => Err(DRTesterError::Precondition(
                "Must fit nuisance models on training sample data to use the calibration test".to_string(),
            )),
        }
    }
}

/// Doubly robust validation of a CATE model.
///
/// * `model_regression` - outcome model prototype, cloned for every fold and arm.
/// * `model_propensity` - propensity model prototype, cloned for every fold.
/// * `cate` - the fitted CATE model under validation.
#[derive(Debug, Clone)]
pub struct DRTester<R, C, M> {
    pub model_regression: R,
    pub model_propensity: C,
    pub cate: M,
    pub cfg: TesterConfig,
}

impl<R, C, M> DRTester<R, C, M>
where
    R: Regressor,
    C: Classifier,
    M: CateModel,
{
    /// Create a tester with the default configuration.
    pub fn new(model_regression: R, model_propensity: C, cate: M) -> Self {
        DRTester {
            model_regression,
            model_propensity,
            cate,
            cfg: TesterConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn set_config(mut self, cfg: TesterConfig) -> Self {
        self.cfg = cfg;
        self
    }

    fn pool(&self) -> Result<rayon::ThreadPool, DRTesterError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = self.cfg.num_threads {
            builder = builder.num_threads(num_threads);
        }
        builder.build().map_err(|e| {
            DRTesterError::InvalidParameter(
                "num_threads".to_string(),
                "a thread count the system can provide".to_string(),
                e.to_string(),
            )
        })
    }

    /// Cross-fit doubly robust outcomes on `sample`.
    fn cross_fit_outcomes(
        &self,
        sample: &Sample,
        treatments: &Treatments,
        weights: &SampleWeights,
    ) -> Result<ArmMatrix, DRTesterError> {
        let arms = treatments.encode(sample.d)?;
        let folds = self.cfg.cv.splits(&arms, self.cfg.seed)?;
        let preds = cross_fit(
            &self.model_regression,
            &self.model_propensity,
            &sample.x,
            &arms,
            sample.y,
            weights,
            treatments,
            &folds,
            self.cfg.parallel,
        )?;
        dr_outcomes(
            &arms,
            sample.y,
            &preds.reg_preds,
            &preds.prop_preds,
            self.cfg.propensity_clip,
        )
    }

    /// Fit the nuisance models and compute doubly robust outcomes.
    ///
    /// The treatment arms are the distinct labels of the validation sample,
    /// the smallest one being control. A training sample containing another
    /// label fails with [`DRTesterError::UnknownTreatment`].
    pub fn fit_nuisance(&self, val: &Sample, mode: NuisanceMode) -> Result<FitState, DRTesterError> {
        self.cfg.validate()?;
        val.validate()?;
        let treatments = Treatments::from_labels(val.d)?;
        let weights_val = SampleWeights::or_uniform(val.weights, val.rows())?;
        let pool = self.pool()?;

        pool.install(|| match mode {
            NuisanceMode::CrossFit => {
                info!(
                    "Cross-fitting nuisance models on the validation sample ({} treatments).",
                    treatments.n_treat()
                );
                let dr_val = self.cross_fit_outcomes(val, &treatments, &weights_val)?;
                FitState::new(treatments, dr_val, weights_val, None)
            }
            NuisanceMode::TrainApply(train) => {
                info!(
                    "Fitting nuisance models on the training sample ({} treatments).",
                    treatments.n_treat()
                );
                train.validate()?;
                let weights_train = SampleWeights::or_uniform(train.weights, train.rows())?;
                let dr_train = self.cross_fit_outcomes(&train, &treatments, &weights_train)?;

                let arms_train = treatments.encode(train.d)?;
                let arms_val = treatments.encode(val.d)?;
                let preds = train_apply(
                    &self.model_regression,
                    &self.model_propensity,
                    &train.x,
                    &arms_train,
                    train.y,
                    &weights_train,
                    &val.x,
                    &treatments,
                    self.cfg.parallel,
                )?;
                let dr_val = dr_outcomes(
                    &arms_val,
                    val.y,
                    &preds.reg_preds,
                    &preds.prop_preds,
                    self.cfg.propensity_clip,
                )?;
                FitState::new(treatments, dr_val, weights_val, Some((dr_train, weights_train)))
            }
        })
    }

    /// Predicted effects of every arm on the validation and, optionally, the
    /// training features.
    pub fn cate_predictions(
        &self,
        state: &FitState,
        x_val: &Matrix<f64>,
        x_train: Option<&Matrix<f64>>,
    ) -> Result<CatePredictions, DRTesterError> {
        if x_val.rows != state.dr_val.rows {
            return Err(DRTesterError::ShapeMismatch(format!(
                "{} validation rows for {} doubly robust outcomes",
                x_val.rows, state.dr_val.rows
            )));
        }
        let val = predict_effects(&self.cate, x_val, &state.treatments)?;
        let train = match x_train {
            Some(x) => {
                if let Some(w) = &state.weights_train {
                    if x.rows != w.len() {
                        return Err(DRTesterError::ShapeMismatch(format!(
                            "{} training rows for {} training weights",
                            x.rows,
                            w.len()
                        )));
                    }
                }
                Some(predict_effects(&self.cate, x, &state.treatments)?)
            }
            None => None,
        };
        Ok(CatePredictions::new(val, train))
    }

    /// Best linear predictor test.
    pub fn evaluate_blp(&self, state: &FitState, preds: &CatePredictions) -> Result<BLPResults, DRTesterError> {
        evaluation::evaluate_blp(state, preds)
    }

    /// Calibration test with `n_groups` quantile bins.
    pub fn evaluate_cal(
        &self,
        state: &FitState,
        preds: &CatePredictions,
        n_groups: usize,
    ) -> Result<CalibrationResults, DRTesterError> {
        evaluation::evaluate_calibration(state, preds, &CalibrationConfig::default().set_n_groups(n_groups))
    }

    /// Uplift test, bootstrapped on the tester's thread pool.
    pub fn evaluate_uplift(
        &self,
        state: &FitState,
        preds: &CatePredictions,
        config: &UpliftConfig,
    ) -> Result<UpliftResults, DRTesterError> {
        let pool = self.pool()?;
        pool.install(|| evaluation::evaluate_uplift(state, preds, config, self.cfg.parallel))
    }

    /// Every test on the same outcomes, weights and predictions.
    pub fn evaluate_all(
        &self,
        state: &FitState,
        preds: &CatePredictions,
        n_groups: usize,
        n_bootstrap: usize,
    ) -> Result<EvaluationResults, DRTesterError> {
        let uplift = UpliftConfig::default().set_n_bootstrap(n_bootstrap);
        Ok(EvaluationResults {
            blp: self.evaluate_blp(state, preds)?,
            cal: self.evaluate_cal(state, preds, n_groups)?,
            qini: self.evaluate_uplift(state, preds, &uplift.clone().set_metric(UpliftMetric::Qini))?,
            toc: self.evaluate_uplift(state, preds, &uplift.set_metric(UpliftMetric::Toc))?,
        })
    }
}
