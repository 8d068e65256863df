//! Device capability queries used to drop configurations a device cannot launch.

use serde::{Deserialize, Serialize};

/// Capability checks the enumeration and the launch path depend on.
pub trait DeviceLimits {
    fn is_local_work_size_valid(&self, local: &[usize]) -> bool;
    fn is_local_memory_valid(&self, bytes: u64) -> bool;
}

/// Static description of a device's work-group and local-memory limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub max_local_dims: usize,
    pub max_local_threads: usize,
    pub max_local_sizes: Vec<usize>,
    pub local_memory_bytes: u64,
}

impl DeviceInfo {
    /// A device that accepts any geometry and any amount of local memory.
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_local_dims: 3,
            max_local_threads: usize::MAX,
            max_local_sizes: vec![usize::MAX; 3],
            local_memory_bytes: u64::MAX,
        }
    }

    /// Limits typical of a discrete GPU (1024 threads, 48 KiB shared memory).
    pub fn typical_gpu(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_local_dims: 3,
            max_local_threads: 1024,
            max_local_sizes: vec![1024, 1024, 64],
            local_memory_bytes: 48 * 1024,
        }
    }
}

impl DeviceLimits for DeviceInfo {
    fn is_local_work_size_valid(&self, local: &[usize]) -> bool {
        if local.len() > self.max_local_dims {
            return false;
        }
        let mut total: usize = 1;
        for (dim, &size) in local.iter().enumerate() {
            let limit = self.max_local_sizes.get(dim).copied().unwrap_or(0);
            if size > limit {
                return false;
            }
            total = match total.checked_mul(size) {
                Some(total) => total,
                None => return false,
            };
        }
        total <= self.max_local_threads
    }

    fn is_local_memory_valid(&self, bytes: u64) -> bool {
        bytes <= self.local_memory_bytes
    }
}
