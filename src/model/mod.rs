//! Binary classifiers for the campaign outcome
//!
//! Labels are `0` (not subscribed) and `1` (subscribed). Every classifier works
//! on a dense feature matrix with one row per example.

pub mod artifact;
pub mod knn;
pub mod logistic;
pub mod metrics;
pub mod sampling;

pub use artifact::ModelArtifact;
pub use knn::KNearestNeighbors;
pub use logistic::LogisticRegression;
pub use metrics::Metrics;

use crate::error::{LakeError, LakeResult};
use ndarray::{Array1, Array2};

/// Trainable binary classifier
pub trait Classifier: Send {
    /// Short algorithm tag used in model file names
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> LakeResult<()>;

    fn predict(&self, x: &Array2<f64>) -> LakeResult<Array1<u8>>;

    /// Fitted parameters in a form that can be saved
    fn parameters(&self) -> serde_json::Value;
}

pub(crate) fn check_training_input(x: &Array2<f64>, y: &Array1<u8>) -> LakeResult<()> {
    if x.nrows() == 0 {
        return Err(LakeError::Model("no training examples".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(LakeError::Model(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if y.iter().any(|label| *label > 1) {
        return Err(LakeError::Model("labels must be 0 or 1".to_string()));
    }
    Ok(())
}

/// Evaluation of one fitted classifier on held-out data
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub name: &'static str,
    pub metrics: Metrics,
    pub parameters: serde_json::Value,
}

/// Fit every candidate and score it on the test split
pub fn evaluate_candidates(
    candidates: &mut [Box<dyn Classifier>],
    train_x: &Array2<f64>,
    train_y: &Array1<u8>,
    test_x: &Array2<f64>,
    test_y: &Array1<u8>,
) -> LakeResult<Vec<CandidateResult>> {
    let mut results = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter_mut() {
        candidate.fit(train_x, train_y)?;
        let predicted = candidate.predict(test_x)?;
        let metrics = Metrics::evaluate(test_y, &predicted)?;
        tracing::info!(
            model = candidate.name(),
            accuracy = metrics.accuracy,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            confusion = ?metrics.confusion,
            "Model evaluated"
        );
        results.push(CandidateResult {
            name: candidate.name(),
            metrics,
            parameters: candidate.parameters(),
        });
    }
    Ok(results)
}

/// Highest F1 wins; the earlier candidate wins ties
pub fn best_by_f1(results: &[CandidateResult]) -> Option<&CandidateResult> {
    results.iter().fold(None, |best: Option<&CandidateResult>, r| match best {
        Some(b) if b.metrics.f1 >= r.metrics.f1 => Some(b),
        _ => Some(r),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<u8>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [3.0, 3.1],
            [3.2, 2.9],
            [2.8, 3.3],
            [3.1, 3.0]
        ];
        let y = array![0, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_candidates_learn_separable_data() {
        let (x, y) = separable();
        let mut candidates: Vec<Box<dyn Classifier>> = vec![
            Box::new(LogisticRegression::new(0.1, 500)),
            Box::new(KNearestNeighbors::new(3)),
        ];
        let results = evaluate_candidates(&mut candidates, &x, &y, &x, &y).unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            assert_eq!(r.metrics.accuracy, 1.0, "{}", r.name);
        }
        assert_eq!(best_by_f1(&results).unwrap().name, "LR");
    }

    #[test]
    fn test_check_training_input() {
        let (x, _) = separable();
        assert!(check_training_input(&x, &array![0, 1]).is_err());
        assert!(check_training_input(&x, &Array1::from_elem(8, 2)).is_err());
        assert!(check_training_input(&Array2::zeros((0, 2)), &Array1::zeros(0)).is_err());
    }
}
