//! The host [`ExecutionBackend`].

use crate::defines::Defines;
use crate::kernel::{DynHostKernel, KernelRegistry, LaunchContext};
use anyhow::{anyhow, bail, Result};
use kerneltune_autotune::{ExecutionBackend, ExecutionOutcome, KernelLaunch, OutputBuffer};
use kerneltune_space::{DeviceInfo, DeviceLimits};
use ndarray::Array2;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuOptions {
    /// Untimed runs before measuring.
    pub warmup_runs: usize,
    /// Timed runs; the fastest is reported.
    pub runs: usize,
}

impl Default for CpuOptions {
    fn default() -> Self {
        Self {
            warmup_runs: 1,
            runs: 1,
        }
    }
}

/// Limits the host backend advertises: work-groups of up to 1024 threads
/// and 32 KiB of staged tile memory.
pub fn host_device() -> DeviceInfo {
    DeviceInfo {
        name: "host-cpu".into(),
        max_local_dims: 3,
        max_local_threads: 1024,
        max_local_sizes: vec![1024, 1024, 64],
        local_memory_bytes: 32 * 1024,
    }
}

/// Runs registered host kernels on a fixed set of input buffers.
pub struct CpuBackend {
    device: DeviceInfo,
    registry: KernelRegistry,
    options: CpuOptions,
    inputs: Vec<Array2<f32>>,
    outputs: Vec<OutputBuffer>,
}

impl CpuBackend {
    pub fn new(registry: KernelRegistry, inputs: Vec<Array2<f32>>) -> Self {
        Self {
            device: host_device(),
            registry,
            options: CpuOptions::default(),
            inputs,
            outputs: Vec::new(),
        }
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn with_options(mut self, options: CpuOptions) -> Self {
        self.options = CpuOptions {
            runs: options.runs.max(1),
            ..options
        };
        self
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn options(&self) -> &CpuOptions {
        &self.options
    }

    pub fn registry_mut(&mut self) -> &mut KernelRegistry {
        &mut self.registry
    }

    pub fn set_inputs(&mut self, inputs: Vec<Array2<f32>>) {
        self.inputs = inputs;
    }

    fn resolve(&self, launch: &KernelLaunch) -> Result<DynHostKernel> {
        self.registry
            .find(&launch.kernel_name)
            .ok_or_else(|| anyhow!("no host kernel named `{}`", launch.kernel_name))
    }
}

impl ExecutionBackend for CpuBackend {
    fn device(&self) -> &dyn DeviceLimits {
        &self.device
    }

    fn local_memory_usage(&mut self, launch: &KernelLaunch) -> Result<u64> {
        let kernel = self.resolve(launch)?;
        kernel.local_memory_usage(&Defines::parse(&launch.source))
    }

    fn execute(&mut self, launch: &KernelLaunch) -> Result<ExecutionOutcome> {
        self.outputs.clear();
        let kernel = self.resolve(launch)?;
        let defines = Defines::parse(&launch.source);
        let ctx = LaunchContext {
            defines: &defines,
            geometry: &launch.geometry,
            inputs: &self.inputs,
        };

        for _ in 0..self.options.warmup_runs {
            kernel.run(&ctx)?;
        }

        let mut best_ms = f64::INFINITY;
        let mut outputs = Vec::new();
        for _ in 0..self.options.runs.max(1) {
            let start = Instant::now();
            outputs = kernel.run(&ctx)?;
            best_ms = best_ms.min(start.elapsed().as_secs_f64() * 1000.0);
        }
        if outputs.is_empty() {
            bail!("kernel `{}` produced no outputs", launch.kernel_name);
        }

        debug!(
            kernel = %launch.kernel_name,
            defines = defines.len(),
            time_ms = best_ms,
            "host kernel finished"
        );
        self.outputs = outputs
            .into_iter()
            .map(|output| OutputBuffer::Float(output.iter().copied().collect()))
            .collect();

        Ok(ExecutionOutcome {
            elapsed_ms: best_ms,
            local_threads: launch.geometry.local_threads(),
        })
    }

    fn read_outputs(&mut self) -> Result<Vec<OutputBuffer>> {
        if self.outputs.is_empty() {
            bail!("no kernel has produced outputs yet");
        }
        Ok(self.outputs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matmul::MatmulProblem;
    use kerneltune_space::LaunchGeometry;

    fn backend() -> CpuBackend {
        CpuBackend::new(
            KernelRegistry::with_matmul_kernels(),
            MatmulProblem::new(16, 16, 8).inputs(),
        )
        .with_options(CpuOptions {
            warmup_runs: 0,
            runs: 2,
        })
    }

    fn tiled(source: &str, global: Vec<usize>) -> KernelLaunch {
        KernelLaunch {
            kernel_name: "matmul_tiled".into(),
            source: source.into(),
            geometry: LaunchGeometry::new(global, vec![4, 1]),
        }
    }

    #[test]
    fn runs_and_exposes_outputs() {
        let mut backend = backend();
        let outcome = backend
            .execute(&tiled("#define TILE_M 4\n#define TILE_N 8\n#define TILE_K 8\n", vec![16, 16]))
            .unwrap();
        assert!(outcome.elapsed_ms >= 0.0);
        assert_eq!(outcome.local_threads, 4);

        let outputs = backend.read_outputs().unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].len(), 16 * 16);
    }

    #[test]
    fn failed_launch_clears_outputs() {
        let mut backend = backend();
        backend
            .execute(&tiled("#define TILE_M 4\n#define TILE_N 8\n#define TILE_K 8\n", vec![16, 16]))
            .unwrap();
        assert!(backend.execute(&tiled("#define TILE_M 4\n", vec![16, 16])).is_err());
        assert!(backend.read_outputs().is_err());
    }

    #[test]
    fn reports_local_memory_of_the_compiled_tiles() {
        let mut backend = backend();
        let launch = tiled("#define TILE_M 64\n#define TILE_N 64\n#define TILE_K 128\n", vec![1, 1]);
        let bytes = backend.local_memory_usage(&launch).unwrap();
        assert_eq!(bytes, (64 * 128 + 128 * 64) * 4);
        assert!(!backend.device().is_local_memory_valid(bytes));
    }

    #[test]
    fn unknown_kernel_is_an_error() {
        let mut backend = backend();
        let launch = KernelLaunch {
            kernel_name: "conv".into(),
            source: String::new(),
            geometry: LaunchGeometry::new(vec![1], vec![1]),
        };
        assert!(backend.execute(&launch).is_err());
        assert!(backend.local_memory_usage(&launch).is_err());
    }

    #[test]
    fn runs_are_at_least_one() {
        let backend = CpuBackend::new(KernelRegistry::new(), Vec::new()).with_options(CpuOptions {
            warmup_runs: 0,
            runs: 0,
        });
        assert_eq!(backend.options().runs, 1);
    }
}
