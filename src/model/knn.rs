use super::{check_training_input, Classifier};
use crate::error::{LakeError, LakeResult};
use ndarray::{Array1, Array2, ArrayView1};
use serde_json::json;

/// Majority vote of the `k` nearest training rows by Euclidean distance
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    k: usize,
    train: Option<(Array2<f64>, Array1<u8>)>,
}

impl KNearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            train: None,
        }
    }
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

impl Classifier for KNearestNeighbors {
    fn name(&self) -> &'static str {
        "KNN"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> LakeResult<()> {
        check_training_input(x, y)?;
        self.train = Some((x.clone(), y.clone()));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> LakeResult<Array1<u8>> {
        let (train_x, train_y) = self
            .train
            .as_ref()
            .ok_or_else(|| LakeError::Model("k-nearest neighbors is not fitted".to_string()))?;
        if x.ncols() != train_x.ncols() {
            return Err(LakeError::Model(format!(
                "expected {} features, got {}",
                train_x.ncols(),
                x.ncols()
            )));
        }
        let k = self.k.min(train_x.nrows());

        let predictions = x
            .rows()
            .into_iter()
            .map(|row| {
                let mut neighbours: Vec<(f64, usize)> = train_x
                    .rows()
                    .into_iter()
                    .enumerate()
                    .map(|(i, t)| (distance(row, t), i))
                    .collect();
                neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let nearest = &neighbours[..k];

                let positives = nearest.iter().filter(|(_, i)| train_y[*i] == 1).count();
                let negatives = k - positives;
                match positives.cmp(&negatives) {
                    std::cmp::Ordering::Greater => 1,
                    std::cmp::Ordering::Less => 0,
                    // Tie: the single nearest neighbour decides
                    std::cmp::Ordering::Equal => train_y[nearest[0].1],
                }
            })
            .collect::<Vec<u8>>();
        Ok(Array1::from(predictions))
    }

    fn parameters(&self) -> serde_json::Value {
        match &self.train {
            Some((x, y)) => json!({
                "k": self.k,
                "train_x": x.rows().into_iter().map(|r| r.to_vec()).collect::<Vec<_>>(),
                "train_y": y.to_vec(),
            }),
            None => json!({ "k": self.k }),
        }
    }
}
