//! Tuning orchestration for kerneltune.
//!
//! A [`Tuner`] owns the registered kernels and their parameter spaces, drives
//! a searcher over each kernel's legal configurations through an
//! [`ExecutionBackend`], checks outputs against a reference kernel and keeps
//! the results in execution order.

pub mod backend;
pub mod error;
pub mod kernel;
pub mod predict;
pub mod report;
pub mod result;
pub mod tuner;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use backend::{ExecutionBackend, ExecutionOutcome, KernelLaunch, OutputBuffer};
pub use error::TuneError;
pub use kernel::KernelInfo;
pub use predict::SUCCESS_MARGIN;
pub use report::{ConsoleTags, TuningReport};
pub use result::{best_result, TuningResult};
pub use tuner::{TunePhase, Tuner, TunerOptions};
pub use verifier::{l2_distance, Verification, Verifier, DEFAULT_THRESHOLD};
