//! Ridge regression on second-order polynomial features of the normalized
//! parameter values, fitted to log execution times.

use crate::error::ModelError;
use crate::features::{with_bias_and_products, Normalizer};
use crate::model::{check_samples, gradient_descent, GradientDescent, Model};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::info;

#[derive(Debug, Clone)]
pub struct LinearRegression {
    iterations: usize,
    learning_rate: f64,
    lambda: f64,
    normalizer: Option<Normalizer>,
    theta: Array1<f64>,
}

impl LinearRegression {
    pub fn new(iterations: usize, learning_rate: f64, lambda: f64) -> Self {
        Self {
            iterations,
            learning_rate,
            lambda,
            normalizer: None,
            theta: Array1::zeros(0),
        }
    }

    pub fn theta(&self) -> &Array1<f64> {
        &self.theta
    }

    fn design(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let normalizer = self.normalizer.as_ref().ok_or(ModelError::NotTrained)?;
        if x.ncols() != normalizer.features() {
            return Err(ModelError::InvalidFeatureCount {
                expected: normalizer.features(),
                found: x.ncols(),
            });
        }
        Ok(with_bias_and_products(normalizer.apply(x).view()))
    }

    fn regularization(&self) -> f64 {
        if self.theta.len() < 2 {
            return 0.0;
        }
        let weights = self.theta.slice(s![1..]);
        self.lambda * weights.dot(&weights)
    }
}

impl GradientDescent for LinearRegression {
    fn initialize_theta(&mut self, features: usize) -> Result<(), ModelError> {
        self.theta = Array1::zeros(features);
        Ok(())
    }

    fn cost(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        let m = x.nrows() as f64;
        let error = x.dot(&self.theta) - y;
        (error.dot(&error) + self.regularization()) / (2.0 * m)
    }

    fn descend(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alpha: f64) {
        let m = x.nrows() as f64;
        let error = x.dot(&self.theta) - y;
        let mut gradient = x.t().dot(&error) / m;
        // The bias weight is not regularized.
        gradient
            .slice_mut(s![1..])
            .scaled_add(self.lambda / m, &self.theta.slice(s![1..]));
        self.theta.scaled_add(-alpha, &gradient);
    }
}

impl Model for LinearRegression {
    fn name(&self) -> &str {
        "linear-regression"
    }

    fn train(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        check_samples(x, y, None)?;
        self.normalizer = Some(Normalizer::fit(x));
        let design = self.design(x)?;
        let targets = y.mapv(f64::ln);

        let (alpha, iterations) = (self.learning_rate, self.iterations);
        gradient_descent(self, design.view(), targets.view(), alpha, iterations)?;

        let cost = self.cost(design.view(), targets.view());
        info!(model = self.name(), samples = x.nrows(), cost, "training cost");
        Ok(cost)
    }

    fn validate(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        check_samples(x, y, None)?;
        let design = self.design(x)?;
        let cost = self.cost(design.view(), y.mapv(f64::ln).view());
        info!(model = self.name(), samples = x.nrows(), cost, "validation cost");
        Ok(cost)
    }

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        let design = self.design(x.insert_axis(Axis(0)))?;
        Ok(design.row(0).dot(&self.theta).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn reproduces_log_linear_targets() {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for a in 0..8 {
            for b in 0..4 {
                let (a, b) = (a as f64, b as f64);
                rows.extend_from_slice(&[a, b]);
                targets.push((0.2 + 0.1 * a + 0.05 * b).exp());
            }
        }
        let x = Array2::from_shape_vec((32, 2), rows).unwrap();
        let y = Array1::from(targets);

        let mut model = LinearRegression::new(20_000, 1.0, 0.0);
        let cost = model.train(x.view(), y.view()).unwrap();
        assert!(cost < 1e-8, "cost {cost}");

        for (row, &expected) in x.rows().into_iter().zip(y.iter()) {
            assert_relative_eq!(model.predict(row).unwrap(), expected, max_relative = 1e-3);
        }
    }

    #[test]
    fn predict_before_training_fails() {
        let model = LinearRegression::new(10, 0.1, 0.0);
        assert_eq!(
            model.predict(array![1.0, 2.0].view()),
            Err(ModelError::NotTrained)
        );
    }

    #[test]
    fn rejects_wrong_feature_count() {
        let mut model = LinearRegression::new(10, 0.1, 0.0);
        let x = array![[1.0, 2.0], [2.0, 1.0]];
        model.train(x.view(), array![1.0, 2.0].view()).unwrap();
        assert_eq!(
            model.predict(array![1.0].view()),
            Err(ModelError::InvalidFeatureCount {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let mut model = LinearRegression::new(10, 0.1, 0.0);
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert_eq!(model.train(x.view(), y.view()), Err(ModelError::EmptyTrainingSet));
    }

    #[test]
    fn regularization_skips_bias() {
        let mut model = LinearRegression::new(0, 0.1, 2.0);
        model.theta = array![10.0, 1.0, 2.0];
        assert_relative_eq!(model.regularization(), 2.0 * 5.0);
    }
}
