//! The configuration space of one kernel.

use crate::config::{Configuration, Parameter, Setting};
use crate::constraint::{Constraint, LocalMemoryEstimator};
use crate::device::DeviceLimits;
use crate::error::SpaceError;
use crate::geometry::{LaunchGeometry, ModifierKind, ThreadSizeModifier};
use tracing::debug;

/// Declared parameters plus everything that decides which of their
/// combinations are legal.
#[derive(Debug, Clone, Default)]
pub struct ParameterSpace {
    parameters: Vec<Parameter>,
    constraints: Vec<Constraint>,
    modifiers: Vec<ThreadSizeModifier>,
    local_memory: LocalMemoryEstimator,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        values: Vec<usize>,
    ) -> Result<(), SpaceError> {
        let name = name.into();
        if self.parameter_exists(&name) {
            return Err(SpaceError::DuplicateParameter(name));
        }
        self.parameters.push(Parameter::new(name, values));
        Ok(())
    }

    pub fn parameter_exists(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Registers a constraint. Parameter names are resolved lazily during
    /// enumeration.
    pub fn add_constraint<F>(&mut self, predicate: F, parameters: Vec<String>)
    where
        F: Fn(&[usize]) -> bool + Send + Sync + 'static,
    {
        self.constraints.push(Constraint::new(predicate, parameters));
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn add_modifier<S: Into<String>>(
        &mut self,
        range: impl IntoIterator<Item = S>,
        kind: ModifierKind,
    ) {
        self.modifiers.push(ThreadSizeModifier::new(range, kind));
    }

    pub fn modifiers(&self) -> &[ThreadSizeModifier] {
        &self.modifiers
    }

    pub fn set_local_memory_usage<F>(&mut self, amount: F, parameters: Vec<String>)
    where
        F: Fn(&[usize]) -> u64 + Send + Sync + 'static,
    {
        self.local_memory = LocalMemoryEstimator::new(amount, parameters);
    }

    pub fn local_memory_usage(&self, config: &Configuration) -> Result<u64, SpaceError> {
        self.local_memory.estimate(config)
    }

    /// Effective launch geometry of `config`.
    pub fn geometry_for(
        &self,
        base: &LaunchGeometry,
        config: &Configuration,
    ) -> Result<LaunchGeometry, SpaceError> {
        base.modified(&self.modifiers, config)
    }

    /// Whether `config` satisfies every constraint, stopping at the first failure.
    pub fn satisfies_constraints(&self, config: &Configuration) -> Result<bool, SpaceError> {
        for constraint in &self.constraints {
            if !constraint.is_satisfied(config)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Enumerates every legal configuration.
    ///
    /// Parameters are bound in declaration order and values in declared
    /// order, so the result is the lexicographic order of the Cartesian
    /// product with the last parameter varying fastest. A configuration is
    /// kept when it satisfies every constraint and the device accepts both its
    /// local work size and its estimated local memory usage.
    pub fn enumerate(
        &self,
        base: &LaunchGeometry,
        device: &dyn DeviceLimits,
    ) -> Result<Vec<Configuration>, SpaceError> {
        if self.parameters.is_empty() {
            return Ok(vec![Configuration::empty()]);
        }
        if self.parameters.iter().any(|p| p.values.is_empty()) {
            return Ok(Vec::new());
        }

        let mut configurations = Vec::new();
        let mut considered = 0usize;
        // Odometer over value indices; one slot per parameter.
        let mut cursor = vec![0usize; self.parameters.len()];

        loop {
            considered += 1;
            let config = self.bind(&cursor);
            if self.is_legal(&config, base, device)? {
                configurations.push(config);
            }
            if !self.advance(&mut cursor) {
                break;
            }
        }

        debug!(
            considered,
            legal = configurations.len(),
            "enumerated configuration space"
        );
        Ok(configurations)
    }

    fn bind(&self, cursor: &[usize]) -> Configuration {
        Configuration::new(
            self.parameters
                .iter()
                .zip(cursor)
                .map(|(param, &idx)| Setting::new(param.name.clone(), param.values[idx]))
                .collect(),
        )
    }

    fn advance(&self, cursor: &mut [usize]) -> bool {
        for pos in (0..cursor.len()).rev() {
            cursor[pos] += 1;
            if cursor[pos] < self.parameters[pos].values.len() {
                return true;
            }
            cursor[pos] = 0;
        }
        false
    }

    fn is_legal(
        &self,
        config: &Configuration,
        base: &LaunchGeometry,
        device: &dyn DeviceLimits,
    ) -> Result<bool, SpaceError> {
        if !self.satisfies_constraints(config)? {
            return Ok(false);
        }
        let geometry = self.geometry_for(base, config)?;
        if !device.is_local_work_size_valid(&geometry.local) {
            return Ok(false);
        }
        let bytes = self.local_memory_usage(config)?;
        Ok(device.is_local_memory_valid(bytes))
    }
}
