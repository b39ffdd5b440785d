//! Treatments
//!
//! Sorted treatment labels of a validation sample. The smallest label is
//! the control arm, every other label is a treatment arm compared against it.
use crate::errors::DRTesterError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatments {
    /// Unique labels in ascending order, control first.
    pub labels: Vec<i64>,
    index: HashMap<i64, usize>,
}

impl Treatments {
    /// Collect the sorted unique labels of `d`.
    ///
    /// At least two distinct labels are required, one control and one
    /// treatment arm.
    pub fn from_labels(d: &[i64]) -> Result<Self, DRTesterError> {
        let mut labels = d.to_vec();
        labels.sort_unstable();
        labels.dedup();
        if labels.len() < 2 {
            return Err(DRTesterError::InvalidParameter(
                "treatment".to_string(),
                "at least two distinct treatment values".to_string(),
                labels.len().to_string(),
            ));
        }
        let index = labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        Ok(Treatments { labels, index })
    }

    /// The control label.
    pub fn control(&self) -> i64 {
        self.labels[0]
    }

    /// Labels of the non-control arms, in arm order.
    pub fn treated(&self) -> &[i64] {
        &self.labels[1..]
    }

    /// Number of arms, control included.
    pub fn n_arms(&self) -> usize {
        self.labels.len()
    }

    /// Number of non-control arms.
    pub fn n_treat(&self) -> usize {
        self.labels.len() - 1
    }

    /// Arm index of a label.
    pub fn arm_of(&self, label: i64) -> Result<usize, DRTesterError> {
        self.index.get(&label).copied().ok_or(DRTesterError::UnknownTreatment(label))
    }

    /// Map every label to its arm index.
    pub fn encode(&self, d: &[i64]) -> Result<Vec<usize>, DRTesterError> {
        d.iter().map(|&l| self.arm_of(l)).collect()
    }
}
