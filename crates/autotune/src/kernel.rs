use kerneltune_space::{Configuration, LaunchGeometry, ParameterSpace};
use std::sync::Arc;

/// A registered kernel: its source, base launch geometry and tuning space.
#[derive(Debug, Clone)]
pub struct KernelInfo {
    pub name: String,
    pub source: String,
    pub geometry: LaunchGeometry,
    pub space: ParameterSpace,
    configurations: Arc<[Configuration]>,
}

impl KernelInfo {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            geometry: LaunchGeometry::new(global, local),
            space: ParameterSpace::new(),
            configurations: Vec::<Configuration>::new().into(),
        }
    }

    /// Legal configurations computed by the last tuning run.
    pub fn configurations(&self) -> &Arc<[Configuration]> {
        &self.configurations
    }

    pub(crate) fn set_configurations(&mut self, configurations: Arc<[Configuration]>) {
        self.configurations = configurations;
    }
}
