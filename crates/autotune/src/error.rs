use kerneltune_models::ModelError;
use kerneltune_space::SpaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuneError {
    #[error("unknown kernel id {0}")]
    UnknownKernel(usize),

    #[error("kernel `{kernel}` has no parameter `{name}`")]
    UnknownParameter { kernel: String, name: String },

    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no usable measurements for kernel `{0}`")]
    NoMeasurements(String),
}
