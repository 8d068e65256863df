//! User constraints and the local-memory estimator.

use crate::config::Configuration;
use crate::error::SpaceError;
use std::fmt;
use std::sync::Arc;

pub type ConstraintFn = Arc<dyn Fn(&[usize]) -> bool + Send + Sync>;
pub type LocalMemoryFn = Arc<dyn Fn(&[usize]) -> u64 + Send + Sync>;

/// A predicate over the values of a fixed list of parameters.
#[derive(Clone)]
pub struct Constraint {
    predicate: ConstraintFn,
    parameters: Vec<String>,
}

impl Constraint {
    pub fn new<F>(predicate: F, parameters: Vec<String>) -> Self
    where
        F: Fn(&[usize]) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            parameters,
        }
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Evaluates the predicate on the configuration's values for the
    /// referenced parameters, in the order the names were supplied.
    pub fn is_satisfied(&self, config: &Configuration) -> Result<bool, SpaceError> {
        let values = resolve(config, &self.parameters)?;
        Ok((self.predicate)(&values))
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Estimates a kernel's local memory usage in bytes from parameter values.
#[derive(Clone)]
pub struct LocalMemoryEstimator {
    amount: LocalMemoryFn,
    parameters: Vec<String>,
}

impl LocalMemoryEstimator {
    pub fn new<F>(amount: F, parameters: Vec<String>) -> Self
    where
        F: Fn(&[usize]) -> u64 + Send + Sync + 'static,
    {
        Self {
            amount: Arc::new(amount),
            parameters,
        }
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn estimate(&self, config: &Configuration) -> Result<u64, SpaceError> {
        let values = resolve(config, &self.parameters)?;
        Ok((self.amount)(&values))
    }
}

impl Default for LocalMemoryEstimator {
    fn default() -> Self {
        Self::new(|_| 0, Vec::new())
    }
}

impl fmt::Debug for LocalMemoryEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMemoryEstimator")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

fn resolve(config: &Configuration, names: &[String]) -> Result<Vec<usize>, SpaceError> {
    let values = config.lookup(names);
    if values.len() != names.len() {
        return Err(SpaceError::MalformedConstraint {
            expected: names.len(),
            found: values.len(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Setting;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn constraint_sees_values_in_supplied_order() {
        let config = Configuration::new(vec![Setting::new("A", 2), Setting::new("B", 8)]);
        let ordered = Constraint::new(|v| v[0] > v[1], names(&["B", "A"]));
        assert!(ordered.is_satisfied(&config).unwrap());
    }

    #[test]
    fn unresolved_parameter_is_malformed() {
        let config = Configuration::new(vec![Setting::new("A", 2)]);
        let constraint = Constraint::new(|_| true, names(&["A", "MISSING"]));
        assert_eq!(
            constraint.is_satisfied(&config),
            Err(SpaceError::MalformedConstraint {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn default_estimator_is_zero() {
        let config = Configuration::new(vec![Setting::new("A", 64)]);
        assert_eq!(LocalMemoryEstimator::default().estimate(&config).unwrap(), 0);

        let tiles = LocalMemoryEstimator::new(|v| (v[0] * v[0] * 4) as u64, names(&["A"]));
        assert_eq!(tiles.estimate(&config).unwrap(), 64 * 64 * 4);
    }
}
