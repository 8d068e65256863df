//! Host kernels and the registry the backend resolves launches against.

use crate::defines::Defines;
use crate::matmul::{ReferenceMatmul, TiledMatmul};
use anyhow::Result;
use kerneltune_space::LaunchGeometry;
use ndarray::Array2;
use std::sync::Arc;

/// What a host kernel sees of one launch.
pub struct LaunchContext<'a> {
    pub defines: &'a Defines,
    pub geometry: &'a LaunchGeometry,
    pub inputs: &'a [Array2<f32>],
}

/// A kernel implemented on the host, specialised by the `#define` values of
/// the launch source.
pub trait HostKernel: Send + Sync {
    fn name(&self) -> &str;

    /// Local memory one work-group would stage, in bytes.
    fn local_memory_usage(&self, _defines: &Defines) -> Result<u64> {
        Ok(0)
    }

    fn run(&self, ctx: &LaunchContext<'_>) -> Result<Vec<Array2<f32>>>;
}

pub type DynHostKernel = Arc<dyn HostKernel>;

#[derive(Default, Clone)]
pub struct KernelRegistry {
    kernels: Vec<DynHostKernel>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matmul_kernels() -> Self {
        let mut registry = Self::new();
        registry.register(ReferenceMatmul);
        registry.register(TiledMatmul);
        registry
    }

    /// Adds a kernel; a later registration shadows an earlier one of the
    /// same name.
    pub fn register<K>(&mut self, kernel: K)
    where
        K: HostKernel + 'static,
    {
        self.kernels.push(Arc::new(kernel));
    }

    pub fn kernels(&self) -> &[DynHostKernel] {
        &self.kernels
    }

    pub fn find(&self, name: &str) -> Option<DynHostKernel> {
        self.kernels
            .iter()
            .rev()
            .find(|kernel| kernel.name() == name)
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, u64);

    impl HostKernel for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn local_memory_usage(&self, _defines: &Defines) -> Result<u64> {
            Ok(self.1)
        }

        fn run(&self, _ctx: &LaunchContext<'_>) -> Result<Vec<Array2<f32>>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn finds_registered_kernels() {
        let registry = KernelRegistry::with_matmul_kernels();
        assert!(registry.find("matmul_reference").is_some());
        assert!(registry.find("matmul_tiled").is_some());
        assert!(registry.find("conv").is_none());
    }

    #[test]
    fn later_registration_shadows() {
        let mut registry = KernelRegistry::new();
        registry.register(Named("k", 1));
        registry.register(Named("k", 2));
        let defines = Defines::default();
        assert_eq!(registry.find("k").unwrap().local_memory_usage(&defines).unwrap(), 2);
        assert_eq!(registry.kernels().len(), 2);
    }
}
