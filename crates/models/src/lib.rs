//! Execution-time prediction models.
//!
//! Models are trained on the parameter values of measured configurations and
//! predict the time of configurations that were never run, so the tuner can
//! spend real executions only on the most promising ones.

pub mod error;
pub mod features;
pub mod kind;
pub mod linear;
pub mod model;
pub mod network;

pub use error::ModelError;
pub use features::Normalizer;
pub use kind::{ModelKind, ModelOptions};
pub use linear::LinearRegression;
pub use model::{success_rate, Model};
pub use network::NeuralNetwork;
