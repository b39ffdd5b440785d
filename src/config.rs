//! Configuration
//!
//! Settings for the nuisance fit and for the calibration and uplift tests.
//! Every configuration has a `Default`, builder style `set_*` setters and a
//! JSON representation, see [`ConfigIO`].
use crate::constants::{
    DEFAULT_N_BOOTSTRAP, DEFAULT_N_GROUPS, DEFAULT_N_PERCENTILES, DEFAULT_PERCENTILE_HIGH, DEFAULT_PERCENTILE_LOW,
    DEFAULT_PROPENSITY_CLIP, DEFAULT_SEED,
};
use crate::errors::DRTesterError;
use crate::folds::CvSpec;
use crate::utils::{items_to_strings, linspace, validate_float_parameter, validate_min_usize_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Uplift curve flavour.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum UpliftMetric {
    /// Targeting operator characteristic: mean gain of the targeted group
    /// over the population.
    Toc,
    /// QINI: the TOC gain scaled by the share of units targeted.
    #[default]
    Qini,
}

fn get_parse_error(s: &str) -> DRTesterError {
    DRTesterError::ParseString(
        s.to_string(),
        "UpliftMetric".to_string(),
        items_to_strings(vec!["toc", "qini"]),
    )
}

impl FromStr for UpliftMetric {
    type Err = DRTesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toc" => Ok(UpliftMetric::Toc),
            "qini" => Ok(UpliftMetric::Qini),
            _ => Err(get_parse_error(s)),
        }
    }
}

impl fmt::Display for UpliftMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpliftMetric::Toc => write!(f, "toc"),
            UpliftMetric::Qini => write!(f, "qini"),
        }
    }
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}
fn default_propensity_clip() -> f64 {
    DEFAULT_PROPENSITY_CLIP
}
fn default_parallel() -> bool {
    true
}
fn default_n_groups() -> usize {
    DEFAULT_N_GROUPS
}
fn default_percentiles() -> Vec<f64> {
    linspace(DEFAULT_PERCENTILE_LOW, DEFAULT_PERCENTILE_HIGH, DEFAULT_N_PERCENTILES)
}
fn default_n_bootstrap() -> usize {
    DEFAULT_N_BOOTSTRAP
}

/// Configuration of the nuisance fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TesterConfig {
    /// Cross-fitting splits, used when the tester is fit on a single sample.
    #[serde(default)]
    pub cv: CvSpec,
    /// Seed for fold shuffling.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Floor applied to propensities in the doubly robust outcomes, `0.0`
    /// disables clipping.
    #[serde(default = "default_propensity_clip")]
    pub propensity_clip: f64,
    /// Fit folds and bootstrap resamples in parallel.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Size of the thread pool, all cores when `None`.
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        TesterConfig {
            cv: CvSpec::default(),
            seed: default_seed(),
            propensity_clip: default_propensity_clip(),
            parallel: default_parallel(),
            num_threads: None,
        }
    }
}

impl TesterConfig {
    /// Set the cross-fitting splits.
    pub fn set_cv(mut self, cv: CvSpec) -> Self {
        self.cv = cv;
        self
    }

    /// Set the fold shuffling seed.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the propensity floor.
    pub fn set_propensity_clip(mut self, propensity_clip: f64) -> Self {
        self.propensity_clip = propensity_clip;
        self
    }

    /// Set whether work is spread over a thread pool.
    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the thread pool size.
    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn validate(&self) -> Result<(), DRTesterError> {
        validate_float_parameter(self.propensity_clip, 0.0, 0.5, "propensity_clip")?;
        if let CvSpec::Folds(k) = self.cv {
            validate_min_usize_parameter(k, 2, "cv")?;
        }
        if let Some(n) = self.num_threads {
            validate_min_usize_parameter(n, 1, "num_threads")?;
        }
        Ok(())
    }
}

/// Configuration of the calibration test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Number of quantile bins of the training predictions.
    #[serde(default = "default_n_groups")]
    pub n_groups: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            n_groups: default_n_groups(),
        }
    }
}

impl CalibrationConfig {
    /// Set the number of bins.
    pub fn set_n_groups(mut self, n_groups: usize) -> Self {
        self.n_groups = n_groups;
        self
    }

    pub fn validate(&self) -> Result<(), DRTesterError> {
        validate_min_usize_parameter(self.n_groups, 1, "n_groups")
    }
}

/// Configuration of the uplift test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpliftConfig {
    /// Percentiles of the training predictions used as targeting thresholds.
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    /// Curve to compute.
    #[serde(default)]
    pub metric: UpliftMetric,
    /// Number of bootstrap resamples.
    #[serde(default = "default_n_bootstrap")]
    pub n_bootstrap: usize,
    /// Seed of the first resample, resample `b` uses `seed + b`.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for UpliftConfig {
    fn default() -> Self {
        UpliftConfig {
            percentiles: default_percentiles(),
            metric: UpliftMetric::default(),
            n_bootstrap: default_n_bootstrap(),
            seed: default_seed(),
        }
    }
}

impl UpliftConfig {
    /// Set the percentile grid.
    pub fn set_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = percentiles;
        self
    }

    /// Set the curve flavour.
    pub fn set_metric(mut self, metric: UpliftMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the number of bootstrap resamples.
    pub fn set_n_bootstrap(mut self, n_bootstrap: usize) -> Self {
        self.n_bootstrap = n_bootstrap;
        self
    }

    /// Set the bootstrap seed.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), DRTesterError> {
        validate_min_usize_parameter(self.n_bootstrap, 2, "n_bootstrap")?;
        validate_min_usize_parameter(self.percentiles.len(), 2, "percentiles")?;
        for &q in &self.percentiles {
            validate_float_parameter(q, 0.0, 100.0, "percentiles")?;
        }
        if self.percentiles.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DRTesterError::InvalidParameter(
                "percentiles".to_string(),
                "strictly increasing values".to_string(),
                format!("{:?}", self.percentiles),
            ));
        }
        Ok(())
    }
}

/// JSON persistence for configurations.
pub trait ConfigIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save the configuration.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DRTesterError> {
        fs::write(path, self.json_dump()?).map_err(|e| DRTesterError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object.
    fn json_dump(&self) -> Result<String, DRTesterError> {
        serde_json::to_string(self).map_err(|e| DRTesterError::UnableToWrite(e.to_string()))
    }

    /// Load from a json string.
    fn from_json(json_str: &str) -> Result<Self, DRTesterError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| DRTesterError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load the configuration from.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, DRTesterError> {
        let json_str = fs::read_to_string(path).map_err(|e| DRTesterError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConfigIO for TesterConfig {}
impl ConfigIO for CalibrationConfig {}
impl ConfigIO for UpliftConfig {}
