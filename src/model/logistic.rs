use super::{check_training_input, Classifier};
use crate::error::{LakeError, LakeResult};
use ndarray::{Array1, Array2, Axis};
use serde_json::json;

/// Logistic regression on standardized inputs, fitted by batch gradient descent
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    learning_rate: f64,
    epochs: usize,
    fitted: Option<Fitted>,
}

#[derive(Debug, Clone)]
struct Fitted {
    mean: Array1<f64>,
    scale: Array1<f64>,
    weights: Array1<f64>,
    bias: f64,
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, epochs: usize) -> Self {
        Self {
            learning_rate,
            epochs,
            fitted: None,
        }
    }

    /// Probability of label 1 for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> LakeResult<Array1<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| LakeError::Model("logistic regression is not fitted".to_string()))?;
        if x.ncols() != fitted.weights.len() {
            return Err(LakeError::Model(format!(
                "expected {} features, got {}",
                fitted.weights.len(),
                x.ncols()
            )));
        }
        let z = standardize(x, &fitted.mean, &fitted.scale).dot(&fitted.weights) + fitted.bias;
        Ok(z.mapv(sigmoid))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn standardize(x: &Array2<f64>, mean: &Array1<f64>, scale: &Array1<f64>) -> Array2<f64> {
    (x - mean) / scale
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "LR"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> LakeResult<()> {
        check_training_input(x, y)?;
        let n = x.nrows() as f64;

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| LakeError::Model("empty feature matrix".to_string()))?;
        // Constant columns keep scale 1 so they contribute nothing after centering
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        let xs = standardize(x, &mean, &scale);
        let target = y.mapv(f64::from);

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;
        for _ in 0..self.epochs {
            let predicted = (xs.dot(&weights) + bias).mapv(sigmoid);
            let error = &predicted - &target;
            let grad_w = xs.t().dot(&error) / n;
            let grad_b = error.sum() / n;
            weights = weights - grad_w * self.learning_rate;
            bias -= grad_b * self.learning_rate;
        }

        self.fitted = Some(Fitted {
            mean,
            scale,
            weights,
            bias,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> LakeResult<Array1<u8>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1 } else { 0 }))
    }

    fn parameters(&self) -> serde_json::Value {
        match &self.fitted {
            Some(f) => json!({
                "learning_rate": self.learning_rate,
                "epochs": self.epochs,
                "mean": f.mean.to_vec(),
                "scale": f.scale.to_vec(),
                "weights": f.weights.to_vec(),
                "bias": f.bias,
            }),
            None => json!({
                "learning_rate": self.learning_rate,
                "epochs": self.epochs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_single_feature_threshold() {
        let x = array![[1.0], [2.0], [3.0], [7.0], [8.0], [9.0]];
        let y = array![0, 0, 0, 1, 1, 1];
        let mut model = LogisticRegression::new(0.5, 1000);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&array![[0.0], [10.0]]).unwrap(), array![0u8, 1]);
        let p = model.predict_proba(&array![[5.0]]).unwrap();
        assert!((p[0] - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_constant_feature_is_harmless() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [8.0, 5.0], [9.0, 5.0]];
        let y = array![0, 0, 1, 1];
        let mut model = LogisticRegression::new(0.5, 500);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = LogisticRegression::new(0.1, 10);
        assert!(model.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_parameters_after_fit() {
        let mut model = LogisticRegression::new(0.1, 10);
        model.fit(&array![[0.0], [1.0]], &array![0, 1]).unwrap();
        let params = model.parameters();
        assert_eq!(params["weights"].as_array().unwrap().len(), 1);
    }
}
