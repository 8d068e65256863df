use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unsupported model type `{0}`")]
    UnsupportedModel(String),

    #[error("invalid network layers: {0}")]
    InvalidLayers(String),

    #[error("expected {expected} features per sample, found {found}")]
    InvalidFeatureCount { expected: usize, found: usize },

    #[error("{samples} samples but {targets} targets")]
    MismatchedSamples { samples: usize, targets: usize },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("model has not been trained")]
    NotTrained,
}
