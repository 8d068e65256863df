//! In-memory backend for the tuner's unit tests.

use crate::backend::{ExecutionBackend, ExecutionOutcome, KernelLaunch, OutputBuffer};
use anyhow::{anyhow, Result};
use kerneltune_space::{DeviceInfo, DeviceLimits};

pub(crate) type Timing = fn(&KernelLaunch) -> Result<f64>;
pub(crate) type Outputs = fn(&KernelLaunch) -> Vec<OutputBuffer>;

/// Value of a `#define NAME VALUE` line in a launch source.
pub(crate) fn define(launch: &KernelLaunch, name: &str) -> Option<usize> {
    launch.source.lines().find_map(|line| {
        let mut parts = line.strip_prefix("#define ")?.split_whitespace();
        (parts.next()? == name).then_some(())?;
        parts.next()?.parse().ok()
    })
}

pub(crate) struct ScriptedBackend {
    pub device: DeviceInfo,
    pub timing: Timing,
    pub outputs: Outputs,
    pub local_bytes: u64,
    pub launches: Vec<KernelLaunch>,
    last: Vec<OutputBuffer>,
}

impl ScriptedBackend {
    pub fn new(timing: Timing) -> Self {
        Self {
            device: DeviceInfo::typical_gpu("scripted"),
            timing,
            outputs: |_| vec![OutputBuffer::Float(vec![1.0])],
            local_bytes: 0,
            launches: Vec::new(),
            last: Vec::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: Outputs) -> Self {
        self.outputs = outputs;
        self
    }
}

impl ExecutionBackend for ScriptedBackend {
    fn device(&self) -> &dyn DeviceLimits {
        &self.device
    }

    fn local_memory_usage(&mut self, _launch: &KernelLaunch) -> Result<u64> {
        Ok(self.local_bytes)
    }

    fn execute(&mut self, launch: &KernelLaunch) -> Result<ExecutionOutcome> {
        self.launches.push(launch.clone());
        self.last.clear();
        let elapsed_ms = (self.timing)(launch)?;
        self.last = (self.outputs)(launch);
        Ok(ExecutionOutcome {
            elapsed_ms,
            local_threads: launch.geometry.local_threads(),
        })
    }

    fn read_outputs(&mut self) -> Result<Vec<OutputBuffer>> {
        if self.last.is_empty() {
            return Err(anyhow!("no outputs"));
        }
        Ok(self.last.clone())
    }
}
