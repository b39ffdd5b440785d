mod constants;

// Modules
pub mod cate;
pub mod config;
pub mod data;
pub mod errors;
pub mod evaluation;
pub mod folds;
pub mod linalg;
pub mod models;
pub mod nuisance;
pub mod outcomes;
pub mod tester;
pub mod treatments;
pub mod utils;
pub mod weights;

// Individual classes, and functions
pub use cate::{CatePredictions, Effect};
pub use config::{CalibrationConfig, ConfigIO, TesterConfig, UpliftConfig, UpliftMetric};
pub use data::{ArmMatrix, Matrix};
pub use errors::DRTesterError;
pub use evaluation::{BLPResults, CalibrationResults, EvaluationResults, ResultsIO, UpliftResults};
pub use folds::{CvSpec, Fold};
pub use models::{CateModel, Classifier, LinearRegression, LogisticRegression, Regressor};
pub use nuisance::Sample;
pub use tester::{DRTester, FitMode, FitState, NuisanceMode};
pub use treatments::Treatments;
pub use weights::SampleWeights;
