//! Sample Weights
//!
//! Weights are replication multiplicities: a unit with weight 3 counts
//! exactly like three copies of that unit. Every statistic computed with
//! weights is equal to the unweighted statistic on the expanded sample.
use crate::errors::DRTesterError;
use serde::{Deserialize, Serialize};

/// Validated integer sample weights, each `>= 1`.
///
/// Deserialization runs the same validation as [`SampleWeights::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct SampleWeights(Vec<f64>);

impl TryFrom<Vec<f64>> for SampleWeights {
    type Error = DRTesterError;

    fn try_from(weights: Vec<f64>) -> Result<Self, Self::Error> {
        SampleWeights::new(weights)
    }
}

impl SampleWeights {
    /// Validate and wrap a vector of weights.
    ///
    /// Fails with [`DRTesterError::InvalidWeight`] on the first value that is
    /// not finite, not integral, or smaller than one.
    pub fn new(weights: Vec<f64>) -> Result<Self, DRTesterError> {
        for (index, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value.fract() != 0.0 || value < 1.0 {
                return Err(DRTesterError::InvalidWeight { index, value });
            }
        }
        Ok(SampleWeights(weights))
    }

    /// Unit weights for `n` rows.
    pub fn uniform(n: usize) -> Self {
        SampleWeights(vec![1.0; n])
    }

    /// Use the given weights, or unit weights when none were provided.
    pub fn or_uniform(weights: Option<&SampleWeights>, n: usize) -> Result<Self, DRTesterError> {
        match weights {
            Some(w) if w.len() != n => Err(DRTesterError::ShapeMismatch(format!(
                "{} sample weights provided for {} rows",
                w.len(),
                n
            ))),
            Some(w) => Ok(w.clone()),
            None => Ok(SampleWeights::uniform(n)),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Size of the expanded sample.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Weights of a subset of rows.
    pub fn select(&self, rows: &[usize]) -> SampleWeights {
        SampleWeights(rows.iter().map(|&i| self.0[i]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_weights() {
        let w = SampleWeights::new(vec![1.0, 2.0, 5.0]).unwrap();
        assert_eq!(w.total(), 8.0);
        assert_eq!(w.select(&[2, 0]).as_slice(), &[5.0, 1.0]);
    }

    #[test]
    fn test_invalid_weights() {
        for bad in [0.0, 0.5, 1.5, -1.0, f64::NAN, f64::INFINITY] {
            match SampleWeights::new(vec![1.0, bad]) {
                Err(DRTesterError::InvalidWeight { index, .. }) => assert_eq!(index, 1),
                other => panic!("expected invalid weight for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let w: SampleWeights = serde_json::from_str("[1.0, 3.0]").unwrap();
        assert_eq!(w.as_slice(), &[1.0, 3.0]);
        assert_eq!(serde_json::to_string(&w).unwrap(), "[1.0,3.0]");
        assert!(serde_json::from_str::<SampleWeights>("[1.0, 0.5]").is_err());
        assert!(serde_json::from_str::<SampleWeights>("[0.0]").is_err());
    }

    #[test]
    fn test_or_uniform() {
        let w = SampleWeights::or_uniform(None, 3).unwrap();
        assert_eq!(w.as_slice(), &[1.0, 1.0, 1.0]);
        let given = SampleWeights::new(vec![2.0, 3.0]).unwrap();
        assert!(SampleWeights::or_uniform(Some(&given), 3).is_err());
        assert_eq!(SampleWeights::or_uniform(Some(&given), 2).unwrap(), given);
    }
}
