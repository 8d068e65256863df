use crate::error::ModelError;
use crate::linear::LinearRegression;
use crate::model::Model;
use crate::network::NeuralNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    LinearRegression,
    NeuralNetwork,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear-regression",
            ModelKind::NeuralNetwork => "neural-network",
        }
    }

    /// Hyper-parameters that work reasonably for tuning data.
    pub fn default_options(&self) -> ModelOptions {
        match self {
            ModelKind::LinearRegression => ModelOptions {
                iterations: 800,
                learning_rate: 0.05,
                lambda: 0.2,
                hidden_units: 0,
                seed: None,
            },
            ModelKind::NeuralNetwork => ModelOptions {
                iterations: 800,
                learning_rate: 0.1,
                lambda: 0.005,
                hidden_units: 20,
                seed: None,
            },
        }
    }

    /// Builds an untrained model for samples with `features` values each.
    pub fn build(
        &self,
        options: &ModelOptions,
        features: usize,
    ) -> Result<Box<dyn Model>, ModelError> {
        match self {
            ModelKind::LinearRegression => Ok(Box::new(LinearRegression::new(
                options.iterations,
                options.learning_rate,
                options.lambda,
            ))),
            ModelKind::NeuralNetwork => Ok(Box::new(NeuralNetwork::new(
                options.iterations,
                options.learning_rate,
                options.lambda,
                &[features, options.hidden_units, 1],
                options.seed,
            )?)),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "linear-regression" | "linear" => Ok(ModelKind::LinearRegression),
            "neural-network" | "network" | "nn" => Ok(ModelKind::NeuralNetwork),
            _ => Err(ModelError::UnsupportedModel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    pub iterations: usize,
    pub learning_rate: f64,
    pub lambda: f64,
    /// Hidden layer size; ignored by linear regression.
    pub hidden_units: usize,
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_names() {
        assert_eq!("linear".parse::<ModelKind>(), Ok(ModelKind::LinearRegression));
        assert_eq!(
            "Neural_Network".parse::<ModelKind>(),
            Ok(ModelKind::NeuralNetwork)
        );
        assert_eq!(
            "svm".parse::<ModelKind>(),
            Err(ModelError::UnsupportedModel("svm".into()))
        );
    }

    #[test]
    fn builds_with_defaults() {
        for kind in [ModelKind::LinearRegression, ModelKind::NeuralNetwork] {
            let model = kind.build(&kind.default_options(), 3).unwrap();
            assert_eq!(model.name(), kind.as_str());
        }
    }

    #[test]
    fn network_without_hidden_units_is_rejected() {
        let mut options = ModelKind::NeuralNetwork.default_options();
        options.hidden_units = 0;
        assert!(matches!(
            ModelKind::NeuralNetwork.build(&options, 2),
            Err(ModelError::InvalidLayers(_))
        ));
    }
}
