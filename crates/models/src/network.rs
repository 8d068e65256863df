//! A three-layer perceptron: bias-augmented input, one sigmoid hidden layer
//! and a single linear output, trained with full-batch backpropagation on log
//! execution times.

use crate::error::ModelError;
use crate::features::{with_bias, Normalizer};
use crate::model::{check_samples, gradient_descent, GradientDescent, Model};
use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};
use tracing::info;

pub struct NeuralNetwork {
    iterations: usize,
    learning_rate: f64,
    lambda: f64,
    layers: [usize; 3],
    normalizer: Option<Normalizer>,
    /// Hidden weights, `hidden x (inputs + 1)`; column 0 is the bias.
    theta1: Array2<f64>,
    /// Output weights, `1 x (hidden + 1)`; column 0 is the bias.
    theta2: Array2<f64>,
    rng: fastrand::Rng,
}

struct Activations {
    a0: Array2<f64>,
    z1: Array2<f64>,
    a1: Array2<f64>,
    a2: Array2<f64>,
}

impl NeuralNetwork {
    /// `layers` must list exactly three sizes: inputs, hidden units and one output.
    pub fn new(
        iterations: usize,
        learning_rate: f64,
        lambda: f64,
        layers: &[usize],
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        let layers: [usize; 3] = layers.try_into().map_err(|_| {
            ModelError::InvalidLayers(format!(
                "only networks with 3 layers are supported, got {}",
                layers.len()
            ))
        })?;
        if layers[2] != 1 {
            return Err(ModelError::InvalidLayers(format!(
                "output layer must have size 1, got {}",
                layers[2]
            )));
        }
        if layers[1] == 0 {
            return Err(ModelError::InvalidLayers("hidden layer is empty".into()));
        }
        let rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Ok(Self {
            iterations,
            learning_rate,
            lambda,
            layers,
            normalizer: None,
            theta1: Array2::zeros((0, 0)),
            theta2: Array2::zeros((0, 0)),
            rng,
        })
    }

    pub fn layers(&self) -> [usize; 3] {
        self.layers
    }

    fn forward(&self, x: ArrayView2<'_, f64>) -> Activations {
        let a0 = with_bias(x);
        let z1 = a0.dot(&self.theta1.t());
        let a1 = with_bias(z1.mapv(sigmoid).view());
        let a2 = a1.dot(&self.theta2.t());
        Activations { a0, z1, a1, a2 }
    }

    fn prepare(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let normalizer = self.normalizer.as_ref().ok_or(ModelError::NotTrained)?;
        if x.ncols() != normalizer.features() {
            return Err(ModelError::InvalidFeatureCount {
                expected: normalizer.features(),
                found: x.ncols(),
            });
        }
        Ok(normalizer.apply(x))
    }

    fn uniform(&mut self, shape: (usize, usize), epsilon: f64) -> Array2<f64> {
        let rng = &mut self.rng;
        Array2::from_shape_fn(shape, |_| (rng.f64() * 2.0 - 1.0) * epsilon)
    }
}

impl GradientDescent for NeuralNetwork {
    fn initialize_theta(&mut self, features: usize) -> Result<(), ModelError> {
        let [inputs, hidden, outputs] = self.layers;
        if inputs != features {
            return Err(ModelError::InvalidFeatureCount {
                expected: inputs,
                found: features,
            });
        }
        let epsilon1 = 6f64.sqrt() / ((inputs + hidden) as f64).sqrt();
        let epsilon2 = 6f64.sqrt() / ((hidden + outputs) as f64).sqrt();
        self.theta1 = self.uniform((hidden, inputs + 1), epsilon1);
        self.theta2 = self.uniform((outputs, hidden + 1), epsilon2);
        Ok(())
    }

    fn cost(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        let m = x.nrows() as f64;
        let output = self.forward(x).a2;
        let error = &output.column(0) - &y;
        let squared = error.dot(&error) / m;

        let w1 = self.theta1.slice(s![.., 1..]);
        let w2 = self.theta2.slice(s![.., 1..]);
        let penalty = w1.iter().chain(w2.iter()).map(|w| w * w).sum::<f64>();
        squared + self.lambda * penalty / (2.0 * m)
    }

    fn descend(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alpha: f64) {
        let m = x.nrows() as f64;
        let Activations { a0, z1, a1, a2 } = self.forward(x);

        let d2 = &a2 - &y.insert_axis(Axis(1));
        let d1 = d2.dot(&self.theta2.slice(s![.., 1..])) * z1.mapv(sigmoid_gradient);

        let mut gradient1 = d1.t().dot(&a0);
        let mut gradient2 = d2.t().dot(&a1);
        gradient1
            .slice_mut(s![.., 1..])
            .scaled_add(self.lambda, &self.theta1.slice(s![.., 1..]));
        gradient2
            .slice_mut(s![.., 1..])
            .scaled_add(self.lambda, &self.theta2.slice(s![.., 1..]));

        self.theta1.scaled_add(-alpha / m, &gradient1);
        self.theta2.scaled_add(-alpha / m, &gradient2);
    }
}

impl Model for NeuralNetwork {
    fn name(&self) -> &str {
        "neural-network"
    }

    fn train(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        check_samples(x, y, Some(self.layers[0]))?;
        self.normalizer = Some(Normalizer::fit(x));
        let inputs = self.prepare(x)?;
        let targets = y.mapv(f64::ln);

        let (alpha, iterations) = (self.learning_rate, self.iterations);
        gradient_descent(self, inputs.view(), targets.view(), alpha, iterations)?;

        let cost = self.cost(inputs.view(), targets.view());
        info!(model = self.name(), samples = x.nrows(), cost, "training cost");
        Ok(cost)
    }

    fn validate(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        check_samples(x, y, Some(self.layers[0]))?;
        let inputs = self.prepare(x)?;
        let cost = self.cost(inputs.view(), y.mapv(f64::ln).view());
        info!(model = self.name(), samples = x.nrows(), cost, "validation cost");
        Ok(cost)
    }

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        let inputs = self.prepare(x.insert_axis(Axis(0)))?;
        let output = self.forward(inputs.view()).a2;
        Ok(output[[0, 0]].exp())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn sigmoid_gradient(z: f64) -> f64 {
    let s = sigmoid(z);
    s * (1.0 - s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn only_three_layers_are_supported() {
        assert!(matches!(
            NeuralNetwork::new(10, 0.1, 0.0, &[2, 4], None),
            Err(ModelError::InvalidLayers(_))
        ));
        assert!(matches!(
            NeuralNetwork::new(10, 0.1, 0.0, &[2, 4, 4, 1], None),
            Err(ModelError::InvalidLayers(_))
        ));
        assert!(matches!(
            NeuralNetwork::new(10, 0.1, 0.0, &[2, 4, 2], None),
            Err(ModelError::InvalidLayers(_))
        ));
    }

    #[test]
    fn input_layer_must_match_features() {
        let mut net = NeuralNetwork::new(10, 0.1, 0.0, &[3, 4, 1], Some(1)).unwrap();
        let x = array![[1.0, 2.0], [2.0, 3.0]];
        assert_eq!(
            net.train(x.view(), array![1.0, 2.0].view()),
            Err(ModelError::InvalidFeatureCount {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn sigmoid_is_centered() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert_relative_eq!(sigmoid_gradient(0.0), 0.25);
    }

    #[test]
    fn training_reduces_cost() {
        let x = Array2::from_shape_fn((24, 2), |(i, j)| ((i * (j + 3)) % 7) as f64 + 1.0);
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| (0.3 + 0.2 * r[0] - 0.05 * r[1]).exp())
            .collect();

        let mut net = NeuralNetwork::new(0, 0.1, 0.0, &[2, 8, 1], Some(3)).unwrap();
        let untrained = net.train(x.view(), y.view()).unwrap();

        let mut net = NeuralNetwork::new(2000, 0.1, 0.0, &[2, 8, 1], Some(3)).unwrap();
        let trained = net.train(x.view(), y.view()).unwrap();
        assert!(trained < untrained, "{trained} >= {untrained}");

        let validation = net.validate(x.view(), y.view()).unwrap();
        assert_relative_eq!(validation, trained, max_relative = 1e-9);
        assert!(net.predict(x.row(0)).unwrap().is_finite());
    }
}
