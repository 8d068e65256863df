//! The model contract and the shared gradient-descent driver.

use crate::error::ModelError;
use ndarray::{ArrayView1, ArrayView2};
use tracing::debug;

/// An execution-time regressor over parameter-value vectors.
pub trait Model: Send {
    fn name(&self) -> &str;

    /// Fits the model; returns the final training cost.
    fn train(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64, ModelError>;

    /// Cost of the trained model on held-out samples.
    fn validate(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64, ModelError>;

    /// Predicted execution time for one sample.
    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError>;
}

/// Percentage of samples whose prediction lies strictly within
/// `y * (1 ± margin)`.
pub fn success_rate(
    model: &dyn Model,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    margin: f64,
) -> Result<f64, ModelError> {
    if x.nrows() == 0 {
        return Ok(0.0);
    }
    let mut correct = 0usize;
    for (row, &actual) in x.rows().into_iter().zip(y.iter()) {
        let predicted = model.predict(row)?;
        if predicted < actual * (1.0 + margin) && predicted > actual * (1.0 - margin) {
            correct += 1;
        }
    }
    Ok(100.0 * correct as f64 / x.nrows() as f64)
}

/// Variant-specific pieces of batch gradient descent.
pub(crate) trait GradientDescent {
    fn initialize_theta(&mut self, features: usize) -> Result<(), ModelError>;

    fn cost(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> f64;

    /// Computes the gradient over the whole batch and applies
    /// `theta -= alpha * gradient`.
    fn descend(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alpha: f64);
}

pub(crate) fn gradient_descent<M: GradientDescent>(
    model: &mut M,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    alpha: f64,
    iterations: usize,
) -> Result<(), ModelError> {
    model.initialize_theta(x.ncols())?;
    let cadence = (iterations / 10).max(1);
    for iter in 0..iterations {
        if (iter + 1) % cadence == 0 {
            let cost = model.cost(x, y);
            debug!(iteration = iter + 1, iterations, cost, "gradient descent");
        }
        model.descend(x, y, alpha);
    }
    Ok(())
}

pub(crate) fn check_samples(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    expected: Option<usize>,
) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::MismatchedSamples {
            samples: x.nrows(),
            targets: y.len(),
        });
    }
    if let Some(expected) = expected {
        if x.ncols() != expected {
            return Err(ModelError::InvalidFeatureCount {
                expected,
                found: x.ncols(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Predicts twice the first feature.
    struct Doubler;

    impl Model for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn train(&mut self, _: ArrayView2<'_, f64>, _: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
            Ok(0.0)
        }

        fn validate(&self, _: ArrayView2<'_, f64>, _: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
            Ok(0.0)
        }

        fn predict(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
            Ok(2.0 * x[0])
        }
    }

    #[test]
    fn success_rate_counts_predictions_inside_margin() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        // Predictions: 2, 4, 6, 8.
        let y = array![2.1, 4.0, 9.0, 5.0];
        let rate = success_rate(&Doubler, x.view(), y.view(), 0.1).unwrap();
        assert_relative_eq!(rate, 50.0);
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        assert_eq!(
            check_samples(x.view(), y.view(), None),
            Err(ModelError::MismatchedSamples {
                samples: 2,
                targets: 1
            })
        );
    }
}
