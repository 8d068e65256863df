//! Simulated annealing over the neighbour graph of the configuration list.

use crate::searcher::{fraction_of, rng_from, SearchState, Searcher};
use kerneltune_space::Configuration;
use std::sync::Arc;
use tracing::trace;

/// Re-samples allowed when the chosen neighbour has already been measured.
pub const DEFAULT_RETRY_BUDGET: usize = 10;

pub struct Annealing {
    state: SearchState,
    fraction: f64,
    max_temperature: f64,
    retry_budget: usize,
    visited: usize,
    current: usize,
    neighbour: usize,
    rng: fastrand::Rng,
}

impl Annealing {
    pub fn new(
        configurations: Arc<[Configuration]>,
        fraction: f64,
        max_temperature: f64,
        seed: Option<u64>,
    ) -> Self {
        Self {
            state: SearchState::new(configurations),
            fraction,
            max_temperature,
            retry_budget: DEFAULT_RETRY_BUDGET,
            visited: 0,
            current: 0,
            neighbour: 0,
            rng: rng_from(seed),
        }
    }

    pub fn with_retry_budget(mut self, retry_budget: usize) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn current_state(&self) -> usize {
        self.current
    }

    fn temperature(&self) -> f64 {
        let total = self.num_configurations().max(1) as f64;
        let progress = self.visited as f64 / total;
        self.max_temperature * (1.0 - progress)
    }

    fn random_neighbour(&mut self) -> usize {
        let neighbours = neighbours_of(self.state.configurations(), self.current);
        if neighbours.is_empty() {
            // Isolated state: jump anywhere.
            return self.rng.usize(..self.state.len().max(1));
        }
        neighbours[self.rng.usize(..neighbours.len())]
    }
}

impl Searcher for Annealing {
    fn name(&self) -> &str {
        "annealing"
    }

    fn configuration(&mut self) -> Configuration {
        self.visited += 1;
        self.state.current()
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        self.state.record(time_ms);
    }

    fn calculate_next_index(&mut self) {
        let temperature = self.temperature();
        let probability = acceptance_probability(
            self.state.time_of(self.current),
            self.state.time_of(self.neighbour),
            temperature,
        );
        if probability > self.rng.f64() {
            self.current = self.neighbour;
        }

        let mut candidate = self.random_neighbour();
        let mut retries = 0;
        while self.state.is_explored(candidate) && retries < self.retry_budget {
            retries += 1;
            candidate = self.random_neighbour();
        }
        trace!(
            current = self.current,
            next = candidate,
            retries,
            temperature,
            "annealing step"
        );

        self.neighbour = candidate;
        self.state.set_index(candidate);
    }

    fn num_configurations(&self) -> usize {
        fraction_of(self.state.len(), self.fraction)
    }

    fn state(&self) -> &SearchState {
        &self.state
    }
}

/// Kirkpatrick acceptance: always move to a strictly better neighbour,
/// otherwise with probability `exp(-(neighbour - current) / temperature)`.
/// Comparisons involving two failed measurements yield NaN, which never
/// exceeds a drawn probability.
pub fn acceptance_probability(current: f64, neighbour: f64, temperature: f64) -> f64 {
    if neighbour < current {
        return 1.0;
    }
    if temperature <= 0.0 {
        return 0.0;
    }
    (-(neighbour - current) / temperature).exp()
}

/// Indices of the configurations that differ from `configurations[reference]`
/// in exactly one parameter value.
pub fn neighbours_of(configurations: &[Configuration], reference: usize) -> Vec<usize> {
    let Some(origin) = configurations.get(reference) else {
        return Vec::new();
    };
    configurations
        .iter()
        .enumerate()
        .filter(|(_, other)| origin.differences(other) == 1)
        .map(|(index, _)| index)
        .collect()
}
