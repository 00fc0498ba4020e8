use crate::error::{LakeError, LakeResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Binary classification scores, label 1 as the positive class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `[[tn, fp], [fn, tp]]`, rows are true labels
    pub confusion: [[usize; 2]; 2],
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Metrics {
    pub fn evaluate(truth: &Array1<u8>, predicted: &Array1<u8>) -> LakeResult<Self> {
        if truth.len() != predicted.len() {
            return Err(LakeError::Model(format!(
                "{} labels but {} predictions",
                truth.len(),
                predicted.len()
            )));
        }

        let mut confusion = [[0usize; 2]; 2];
        for (t, p) in truth.iter().zip(predicted.iter()) {
            let (t, p) = (usize::from(*t).min(1), usize::from(*p).min(1));
            confusion[t][p] += 1;
        }
        let [[tn, fp], [fn_, tp]] = confusion;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Ok(Self {
            accuracy: ratio(tp + tn, truth.len()),
            precision,
            recall,
            f1,
            confusion,
            support: truth.len(),
        })
    }
}
