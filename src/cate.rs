//! CATE Predictions
//!
//! Queries the model under validation for the effect of every treatment arm
//! against control and stacks the answers into one column per arm.
use crate::data::{ArmMatrix, Matrix};
use crate::errors::DRTesterError;
use crate::models::CateModel;
use crate::treatments::Treatments;
use log::debug;
use serde::{Deserialize, Serialize};

/// Output of a [`CateModel::effect`] query.
///
/// Models may answer with any array whose non-singleton dimensions reduce
/// to one value per row, e.g. `[n]`, `[n, 1]` or `[n, 1, 1]`. `values` are
/// in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub values: Vec<f64>,
    pub shape: Vec<usize>,
}

impl Effect {
    /// One effect per row.
    pub fn vector(values: Vec<f64>) -> Self {
        let shape = vec![values.len()];
        Effect { values, shape }
    }

    /// An effect with an explicit shape.
    pub fn with_shape(values: Vec<f64>, shape: Vec<usize>) -> Result<Self, DRTesterError> {
        let size: usize = shape.iter().product();
        if size != values.len() {
            return Err(DRTesterError::ShapeMismatch(format!(
                "shape {:?} holds {} values, got {}",
                shape,
                size,
                values.len()
            )));
        }
        Ok(Effect { values, shape })
    }

    /// Drop singleton dimensions and check one value per row remains.
    pub fn squeeze(self, rows: usize) -> Result<Vec<f64>, DRTesterError> {
        let squeezed: Vec<usize> = self.shape.iter().copied().filter(|&s| s != 1).collect();
        let ok = match squeezed.as_slice() {
            [] => rows == 1 && self.values.len() == 1,
            [n] => *n == rows && self.values.len() == rows,
            _ => false,
        };
        if !ok {
            return Err(DRTesterError::ShapeMismatch(format!(
                "effect of shape {:?} does not reduce to {} rows",
                self.shape, rows
            )));
        }
        Ok(self.values)
    }
}

/// CATE predictions on the validation and, optionally, the training sample.
///
/// Computed once and shared by every test, see
/// [`DRTester::cate_predictions`](crate::tester::DRTester::cate_predictions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatePredictions {
    /// `n_val x n_treat` predicted effects.
    pub val: ArmMatrix,
    /// `n_train x n_treat` predicted effects.
    pub train: Option<ArmMatrix>,
}

impl CatePredictions {
    /// Wrap predictions computed elsewhere.
    pub fn new(val: ArmMatrix, train: Option<ArmMatrix>) -> Self {
        CatePredictions { val, train }
    }

    /// Training predictions, required by the calibration and uplift tests.
    pub fn train_or_err(&self) -> Result<&ArmMatrix, DRTesterError> {
        self.train.as_ref().ok_or_else(|| {
            DRTesterError::Precondition(
                "CATE predictions not yet calculated on the training sample - must provide training features"
                    .to_string(),
            )
        })
    }
}

/// Predicted effect of every treatment arm against control, `n x n_treat`.
pub fn predict_effects<M: CateModel + ?Sized>(
    model: &M,
    x: &Matrix<f64>,
    treatments: &Treatments,
) -> Result<ArmMatrix, DRTesterError> {
    let control = treatments.control();
    let columns = treatments
        .treated()
        .iter()
        .map(|&t| {
            debug!("Querying CATE model for treatment {} against {} on {} rows", t, control, x.rows);
            model.effect(x, control, t)?.squeeze(x.rows)
        })
        .collect::<Result<Vec<_>, _>>()?;
    ArmMatrix::from_columns(columns)
}
