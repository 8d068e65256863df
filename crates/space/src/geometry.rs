//! Launch geometry and the thread-size modifiers that reshape it per configuration.

use crate::config::Configuration;
use crate::error::SpaceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierKind {
    GlobalMultiply,
    GlobalDivide,
    LocalMultiply,
    LocalDivide,
}

/// Multiplies or divides one dimension of the global or local size by a
/// parameter value. `range` holds one parameter name per dimension; an empty
/// name leaves that dimension alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSizeModifier {
    pub range: Vec<String>,
    pub kind: ModifierKind,
}

impl ThreadSizeModifier {
    pub fn new<S: Into<String>>(range: impl IntoIterator<Item = S>, kind: ModifierKind) -> Self {
        Self {
            range: range.into_iter().map(Into::into).collect(),
            kind,
        }
    }

    /// Parameter names this modifier refers to (empty entries excluded).
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.range
            .iter()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    fn name_for(&self, dim: usize) -> &str {
        self.range.get(dim).map(String::as_str).unwrap_or("")
    }
}

/// Global and local work sizes of a kernel launch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchGeometry {
    pub global: Vec<usize>,
    pub local: Vec<usize>,
}

impl LaunchGeometry {
    pub fn new(global: Vec<usize>, local: Vec<usize>) -> Self {
        Self { global, local }
    }

    pub fn dimensions(&self) -> usize {
        self.global.len()
    }

    /// Total number of threads in one work-group.
    pub fn local_threads(&self) -> usize {
        self.local.iter().product()
    }

    pub fn global_threads(&self) -> usize {
        self.global.iter().product()
    }

    /// Applies `modifiers` in declaration order, resolving parameter names
    /// against `config`.
    pub fn modified(
        &self,
        modifiers: &[ThreadSizeModifier],
        config: &Configuration,
    ) -> Result<LaunchGeometry, SpaceError> {
        if self.global.len() != self.local.len() {
            return Err(SpaceError::MismatchedDimensions {
                global: self.global.len(),
                local: self.local.len(),
            });
        }

        let mut global = self.global.clone();
        let mut local = self.local.clone();

        for dim in 0..global.len() {
            for modifier in modifiers {
                let name = modifier.name_for(dim);
                if name.is_empty() {
                    continue;
                }
                let value = config
                    .value_of(name)
                    .ok_or_else(|| SpaceError::UnresolvedModifier(name.to_string()))?;

                let target = match modifier.kind {
                    ModifierKind::GlobalMultiply | ModifierKind::GlobalDivide => &mut global[dim],
                    ModifierKind::LocalMultiply | ModifierKind::LocalDivide => &mut local[dim],
                };
                *target = match modifier.kind {
                    ModifierKind::GlobalMultiply | ModifierKind::LocalMultiply => target
                        .checked_mul(value)
                        .ok_or_else(|| SpaceError::SizeOverflow(name.to_string()))?,
                    ModifierKind::GlobalDivide | ModifierKind::LocalDivide => target
                        .checked_div(value)
                        .ok_or_else(|| SpaceError::ZeroDivisor(name.to_string()))?,
                };
            }
        }

        Ok(LaunchGeometry { global, local })
    }
}
