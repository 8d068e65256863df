//! The device-facing side of tuning: compile, launch, read back.

use anyhow::Result;
use kerneltune_space::{DeviceLimits, LaunchGeometry};
use serde::{Deserialize, Serialize};

/// Everything a backend needs to run one kernel variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelLaunch {
    pub kernel_name: String,
    /// Kernel source with the configuration's `#define` lines prepended.
    pub source: String,
    pub geometry: LaunchGeometry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionOutcome {
    pub elapsed_ms: f64,
    pub local_threads: usize,
}

/// Contents of one output argument, downloaded after a launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum OutputBuffer {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Float2(Vec<[f32; 2]>),
    Double2(Vec<[f64; 2]>),
}

impl OutputBuffer {
    pub fn len(&self) -> usize {
        match self {
            OutputBuffer::Int(v) => v.len(),
            OutputBuffer::Float(v) => v.len(),
            OutputBuffer::Double(v) => v.len(),
            OutputBuffer::Float2(v) => v.len(),
            OutputBuffer::Double2(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            OutputBuffer::Int(_) => "int",
            OutputBuffer::Float(_) => "float",
            OutputBuffer::Double(_) => "double",
            OutputBuffer::Float2(_) => "float2",
            OutputBuffer::Double2(_) => "double2",
        }
    }
}

/// Compiles and runs kernels on some device.
///
/// Errors are per-launch: the tuner records them as failed results and moves
/// on to the next configuration.
pub trait ExecutionBackend {
    fn device(&self) -> &dyn DeviceLimits;

    /// Local memory, in bytes, the compiled kernel needs per work-group.
    fn local_memory_usage(&mut self, launch: &KernelLaunch) -> Result<u64>;

    /// Resets the outputs, runs the kernel and reports its timing.
    fn execute(&mut self, launch: &KernelLaunch) -> Result<ExecutionOutcome>;

    /// Output buffers produced by the most recent [`execute`](Self::execute).
    fn read_outputs(&mut self) -> Result<Vec<OutputBuffer>>;
}
