//! kerneltune: an autotuner for compute kernels.
//!
//! Declare the tunable parameters of a kernel, let a searcher walk the legal
//! configurations on an execution backend, and keep the fastest result that
//! matches a reference kernel. A trained model can extend a partial search
//! by predicting the configurations that were never run.

pub use kerneltune_autotune as autotune;
pub use kerneltune_backend_cpu as backend_cpu;
pub use kerneltune_models as models;
pub use kerneltune_search as search;
pub use kerneltune_space as space;

pub use kerneltune_autotune::{
    ConsoleTags, ExecutionBackend, TuneError, Tuner, TunerOptions, TuningReport, TuningResult,
};
pub use kerneltune_models::ModelKind;
pub use kerneltune_search::SearchMethod;
pub use kerneltune_space::{Configuration, DeviceInfo, ParameterSpace, Setting};
