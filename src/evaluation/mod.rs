//! Evaluation
//!
//! Validation tests run on doubly robust outcomes and CATE predictions.
//!
//! * [`blp`] - best linear predictor of the DR outcomes given the predictions.
//! * [`calibration`] - predicted against realized effects within quantile bins.
//! * [`uplift`] - TOC and QINI curves with bootstrap inference.
//!
//! Every test reads a [`FitState`](crate::tester::FitState) and a
//! [`CatePredictions`](crate::cate::CatePredictions) and returns a new,
//! immutable results value.
use crate::data::ArmMatrix;
use crate::errors::DRTesterError;

pub mod blp;
pub mod calibration;
pub mod results;
pub mod uplift;


pub use blp::evaluate_blp;
pub use calibration::evaluate_calibration;
pub use results::{
    BLPResults, BlpArm, CalibrationArm, CalibrationGroup, CalibrationResults, EvaluationResults, ResultsIO,
    SummaryRow, UpliftArm, UpliftPoint, UpliftResults,
};
pub use uplift::evaluate_uplift;

pub(crate) fn check_shape(what: &str, m: &ArmMatrix, rows: usize, cols: usize) -> Result<(), DRTesterError> {
    if m.rows != rows || m.cols != cols {
        return Err(DRTesterError::ShapeMismatch(format!(
            "{} is {} x {}, expected {} x {}",
            what, m.rows, m.cols, rows, cols
        )));
    }
    Ok(())
}
