//! Host execution backend for kerneltune.
//!
//! Kernels are Rust functions looked up by name. The `#define` lines the
//! tuner injects into a launch source are parsed back into integers and
//! select the variant to run, the way a device compiler would specialise
//! an OpenCL or CUDA source.

pub mod defines;
pub mod kernel;
pub mod matmul;
pub mod runtime;

pub use defines::Defines;
pub use kernel::{DynHostKernel, HostKernel, KernelRegistry, LaunchContext};
pub use matmul::{MatmulProblem, MatmulTiling, ReferenceMatmul, TiledMatmul};
pub use runtime::{host_device, CpuBackend, CpuOptions};
