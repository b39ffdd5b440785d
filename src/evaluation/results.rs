//! Results
//!
//! Immutable records returned by the validation tests. Statistics that are
//! undefined for a given sample (a singular BLP design, a calibration test
//! without spread around the ATE) are NaN; they are written to JSON as
//! `null` and read back as NaN.
use crate::config::UpliftMetric;
use crate::errors::DRTesterError;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub(crate) fn parse_nan<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(d).map(|x: Option<_>| x.unwrap_or(f64::NAN))
}

/// One row of a results summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub treatment: i64,
    #[serde(deserialize_with = "parse_nan")]
    pub estimate: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub std_err: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub p_value: f64,
}

fn write_summary(f: &mut fmt::Formatter<'_>, title: &str, estimate: &str, rows: &[SummaryRow]) -> fmt::Result {
    writeln!(f, "{}", title)?;
    writeln!(f, "{:<10} {:>14} {:>14} {:>14}", "treatment", estimate, "std_err", "p_value")?;
    for r in rows {
        writeln!(
            f,
            "{:<10} {:>14.6} {:>14.6} {:>14.6}",
            r.treatment, r.estimate, r.std_err, r.p_value
        )?;
    }
    Ok(())
}

/// Best linear predictor fit of one arm, `dr ~ intercept + slope * cate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlpArm {
    pub treatment: i64,
    #[serde(deserialize_with = "parse_nan")]
    pub intercept: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub intercept_std_err: f64,
    /// Slope on the CATE predictions, close to 1 for a well scaled model.
    #[serde(deserialize_with = "parse_nan")]
    pub slope: f64,
    /// HC1 robust standard error of the slope.
    #[serde(deserialize_with = "parse_nan")]
    pub std_err: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub p_value: f64,
}

/// Results of the best linear predictor test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BLPResults {
    pub arms: Vec<BlpArm>,
}

impl BLPResults {
    /// Slope, standard error and p-value of every arm.
    pub fn summary(&self) -> Vec<SummaryRow> {
        self.arms
            .iter()
            .map(|a| SummaryRow {
                treatment: a.treatment,
                estimate: a.slope,
                std_err: a.std_err,
                p_value: a.p_value,
            })
            .collect()
    }
}

impl fmt::Display for BLPResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, "Best linear predictor", "blp_est", &self.summary())
    }
}

/// One quantile bin of the calibration test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationGroup {
    pub index: usize,
    /// Share of the validation weight falling in the bin.
    #[serde(deserialize_with = "parse_nan")]
    pub probability: f64,
    /// Weighted mean doubly robust outcome of the bin.
    #[serde(deserialize_with = "parse_nan")]
    pub gate: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub se_gate: f64,
    /// Weighted mean CATE prediction of the bin.
    #[serde(deserialize_with = "parse_nan")]
    pub g_cate: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub se_g_cate: f64,
}

/// Calibration of one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArm {
    pub treatment: i64,
    /// `1 - grouped_error / overall_error`.
    #[serde(deserialize_with = "parse_nan")]
    pub r_squared: f64,
    /// Distance between bin outcomes and bin predictions.
    #[serde(deserialize_with = "parse_nan")]
    pub grouped_error: f64,
    /// Distance between bin outcomes and the ATE.
    #[serde(deserialize_with = "parse_nan")]
    pub overall_error: f64,
    pub groups: Vec<CalibrationGroup>,
}

/// Results of the calibration test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResults {
    pub arms: Vec<CalibrationArm>,
}

impl CalibrationResults {
    /// Calibration score of every arm, no standard errors are computed.
    pub fn summary(&self) -> Vec<SummaryRow> {
        self.arms
            .iter()
            .map(|a| SummaryRow {
                treatment: a.treatment,
                estimate: a.r_squared,
                std_err: f64::NAN,
                p_value: f64::NAN,
            })
            .collect()
    }
}

impl fmt::Display for CalibrationResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, "Calibration", "cal_r_squared", &self.summary())
    }
}

/// One point of an uplift curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpliftPoint {
    /// Percentile of the training predictions used as threshold.
    pub percentile: f64,
    /// `100 - percentile`.
    pub percentage_treated: f64,
    #[serde(deserialize_with = "parse_nan")]
    pub value: f64,
    /// Bootstrap standard error of `value`.
    #[serde(deserialize_with = "parse_nan")]
    pub std_err: f64,
}

/// Uplift curve of one arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpliftArm {
    pub treatment: i64,
    /// Integral of the curve over the percentile grid (QINI or AUTOC).
    #[serde(deserialize_with = "parse_nan")]
    pub coefficient: f64,
    /// Bootstrap standard deviation of the coefficient.
    #[serde(deserialize_with = "parse_nan")]
    pub std_err: f64,
    /// NaN when the bootstrap coefficients have no spread (`std_err == 0`).
    #[serde(deserialize_with = "parse_nan")]
    pub p_value: f64,
    /// Critical value of a two-sided uniform 95% band.
    #[serde(deserialize_with = "parse_nan")]
    pub critical_value_uniform: f64,
    /// Critical value of a one-sided uniform 95% lower band.
    #[serde(deserialize_with = "parse_nan")]
    pub critical_value_one_sided: f64,
    pub curve: Vec<UpliftPoint>,
}

impl UpliftArm {
    /// Uniform confidence band `(lower, upper)` at every curve point.
    ///
    /// The one-sided band has no upper bound.
    pub fn band(&self, one_sided: bool) -> Vec<(f64, f64)> {
        self.curve
            .iter()
            .map(|p| {
                if one_sided {
                    (p.value - self.critical_value_one_sided * p.std_err, f64::INFINITY)
                } else {
                    let half = self.critical_value_uniform * p.std_err;
                    (p.value - half, p.value + half)
                }
            })
            .collect()
    }
}

/// Results of the uplift test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpliftResults {
    pub metric: UpliftMetric,
    pub arms: Vec<UpliftArm>,
}

impl UpliftResults {
    /// Coefficient, standard error and p-value of every arm.
    pub fn summary(&self) -> Vec<SummaryRow> {
        self.arms
            .iter()
            .map(|a| SummaryRow {
                treatment: a.treatment,
                estimate: a.coefficient,
                std_err: a.std_err,
                p_value: a.p_value,
            })
            .collect()
    }
}

impl fmt::Display for UpliftResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (title, estimate) = match self.metric {
            UpliftMetric::Qini => ("QINI", "qini_coef"),
            UpliftMetric::Toc => ("TOC", "autoc_coef"),
        };
        write_summary(f, title, estimate, &self.summary())
    }
}

/// Every validation test computed on the same fit and predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub blp: BLPResults,
    pub cal: CalibrationResults,
    pub qini: UpliftResults,
    pub toc: UpliftResults,
}

impl fmt::Display for EvaluationResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.blp)?;
        writeln!(f, "{}", self.cal)?;
        writeln!(f, "{}", self.qini)?;
        write!(f, "{}", self.toc)
    }
}

/// JSON persistence for results.
pub trait ResultsIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
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
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, DRTesterError> {
        let json_str = fs::read_to_string(path).map_err(|e| DRTesterError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ResultsIO for BLPResults {}
impl ResultsIO for CalibrationResults {}
impl ResultsIO for UpliftResults {}
impl ResultsIO for EvaluationResults {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn blp() -> BLPResults {
        BLPResults {
            arms: vec![
                BlpArm {
                    treatment: 1,
                    intercept: 0.1,
                    intercept_std_err: 0.05,
                    slope: 0.98,
                    std_err: 0.1,
                    p_value: 1e-20,
                },
                BlpArm {
                    treatment: 2,
                    intercept: f64::NAN,
                    intercept_std_err: f64::NAN,
                    slope: f64::NAN,
                    std_err: f64::NAN,
                    p_value: f64::NAN,
                },
            ],
        }
    }

    fn uplift() -> UpliftResults {
        UpliftResults {
            metric: UpliftMetric::Toc,
            arms: vec![UpliftArm {
                treatment: 1,
                coefficient: 0.5,
                std_err: 0.1,
                p_value: 0.01,
                critical_value_uniform: 2.5,
                critical_value_one_sided: 2.0,
                curve: vec![
                    UpliftPoint {
                        percentile: 10.0,
                        percentage_treated: 90.0,
                        value: 0.2,
                        std_err: 0.1,
                    },
                    UpliftPoint {
                        percentile: 90.0,
                        percentage_treated: 10.0,
                        value: 1.0,
                        std_err: 0.2,
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_nan_round_trip() {
        let results = blp();
        let json = results.json_dump().unwrap();
        assert!(json.contains("null"));
        let back = BLPResults::from_json(&json).unwrap();
        assert_eq!(back.arms[0], results.arms[0]);
        assert!(back.arms[1].slope.is_nan());
        assert!(back.arms[1].p_value.is_nan());
    }

    #[test]
    fn test_results_io_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("toc.json");
        let results = uplift();
        results.save(&file_path).unwrap();
        assert_eq!(UpliftResults::load(&file_path).unwrap(), results);
        assert!(UpliftResults::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_summary_and_display() {
        let rows = blp().summary();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].estimate, 0.98);
        let text = blp().to_string();
        assert!(text.starts_with("Best linear predictor"));
        assert!(text.contains("blp_est"));
        assert!(uplift().to_string().contains("autoc_coef"));
    }

    #[test]
    fn test_uplift_band() {
        let arm = &uplift().arms[0];
        let two_sided = arm.band(false);
        assert!((two_sided[0].0 - (0.2 - 0.25)).abs() < 1e-12);
        assert!((two_sided[1].1 - 1.5).abs() < 1e-12);
        let one_sided = arm.band(true);
        assert!((one_sided[1].0 - 0.6).abs() < 1e-12);
        assert!(one_sided[1].1.is_infinite());
    }
}
