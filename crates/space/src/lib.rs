//! Configuration-space model for kerneltune.
//!
//! A [`ParameterSpace`] owns the tuning parameters of one kernel, the user
//! constraints over them, the thread-size modifiers that reshape the launch
//! geometry and an optional local-memory estimator. [`ParameterSpace::enumerate`]
//! turns all of that into the deterministic list of legal configurations the
//! searchers index into.

pub mod config;
pub mod constraint;
pub mod device;
pub mod error;
pub mod geometry;
pub mod space;

pub use config::{Configuration, Parameter, Setting};
pub use constraint::{Constraint, LocalMemoryEstimator};
pub use device::{DeviceInfo, DeviceLimits};
pub use error::SpaceError;
pub use geometry::{LaunchGeometry, ModifierKind, ThreadSizeModifier};
pub use space::ParameterSpace;
