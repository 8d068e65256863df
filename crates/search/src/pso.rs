//! Discrete particle-swarm optimisation.
//!
//! Each particle sits on a configuration index. When it moves, every
//! parameter position independently jumps to the swarm's best value, the
//! particle's own best value, a random candidate value, or stays put. The
//! resulting value vector must be a member of the legal configuration list;
//! illegal moves are re-drawn a bounded number of times.

use crate::searcher::{rng_from, SearchState, Searcher};
use kerneltune_space::{Configuration, Parameter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Probabilities of each move kind, tested in order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Influences {
    pub global: f64,
    pub local: f64,
    pub random: f64,
}

impl Default for Influences {
    fn default() -> Self {
        Self {
            global: 0.4,
            local: 0.0,
            random: 0.4,
        }
    }
}

pub struct Pso {
    state: SearchState,
    parameters: Vec<Parameter>,
    lookup: HashMap<Vec<usize>, usize>,
    fraction: f64,
    influences: Influences,
    positions: Vec<usize>,
    particle: usize,
    retry_budget: usize,
    global_best: Option<(f64, Configuration)>,
    local_best: Vec<Option<(f64, Configuration)>>,
    rng: fastrand::Rng,
}

impl Pso {
    pub fn new(
        configurations: Arc<[Configuration]>,
        parameters: Vec<Parameter>,
        fraction: f64,
        swarm_size: usize,
        influences: Influences,
        seed: Option<u64>,
    ) -> Self {
        let swarm_size = swarm_size.max(1);
        let mut rng = rng_from(seed);
        let len = configurations.len();
        let positions: Vec<usize> = (0..swarm_size)
            .map(|_| if len == 0 { 0 } else { rng.usize(..len) })
            .collect();
        let lookup = configurations
            .iter()
            .enumerate()
            .map(|(index, config)| (config.values(), index))
            .collect();

        let mut state = SearchState::new(configurations);
        state.set_index(positions[0]);
        let retry_budget = (2 * len).max(16);

        Self {
            state,
            parameters,
            lookup,
            fraction,
            influences,
            positions,
            particle: 0,
            retry_budget,
            global_best: None,
            local_best: vec![None; swarm_size],
            rng,
        }
    }

    /// Illegal moves re-drawn before a particle stays put; defaults to
    /// twice the list length, at least 16.
    pub fn with_retry_budget(mut self, retry_budget: usize) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn retry_budget(&self) -> usize {
        self.retry_budget
    }

    pub fn swarm_size(&self) -> usize {
        self.positions.len()
    }

    pub fn global_best_time(&self) -> f64 {
        self.global_best
            .as_ref()
            .map(|(time, _)| *time)
            .unwrap_or(f64::INFINITY)
    }

    pub fn global_best_configuration(&self) -> Option<&Configuration> {
        self.global_best.as_ref().map(|(_, config)| config)
    }

    fn propose(&mut self, from: &Configuration) -> Vec<usize> {
        let mut values = from.values();
        let global = self.global_best.as_ref().map(|(_, c)| c.values());
        let local = self.local_best[self.particle]
            .as_ref()
            .map(|(_, c)| c.values());

        for (pos, value) in values.iter_mut().enumerate() {
            if self.rng.f64() <= self.influences.global {
                if let Some(best) = global.as_ref().and_then(|g| g.get(pos)) {
                    *value = *best;
                }
            } else if self.rng.f64() <= self.influences.local {
                if let Some(best) = local.as_ref().and_then(|l| l.get(pos)) {
                    *value = *best;
                }
            } else if self.rng.f64() <= self.influences.random {
                if let Some(param) = self.parameters.get(pos) {
                    if !param.values.is_empty() {
                        *value = param.values[self.rng.usize(..param.values.len())];
                    }
                }
            }
        }
        values
    }
}

impl Searcher for Pso {
    fn name(&self) -> &str {
        "pso"
    }

    fn configuration(&mut self) -> Configuration {
        self.state.current()
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        self.state.record(time_ms);
        let config = self.state.current();

        let local = &mut self.local_best[self.particle];
        if time_ms < local.as_ref().map_or(f64::INFINITY, |(t, _)| *t) {
            *local = Some((time_ms, config.clone()));
        }
        if time_ms < self.global_best_time() {
            self.global_best = Some((time_ms, config));
        }
    }

    fn calculate_next_index(&mut self) {
        if self.state.is_empty() {
            return;
        }
        let from = self.state.current();
        let mut moved = None;
        for _ in 0..self.retry_budget {
            let values = self.propose(&from);
            if let Some(&index) = self.lookup.get(&values) {
                moved = Some(index);
                break;
            }
        }
        match moved {
            Some(index) => self.positions[self.particle] = index,
            None => debug!(particle = self.particle, "no legal move found, particle stays"),
        }

        self.particle = (self.particle + 1) % self.positions.len();
        self.state.set_index(self.positions[self.particle]);
    }

    fn num_configurations(&self) -> usize {
        let len = self.state.len();
        if len == 0 {
            return 0;
        }
        ((len as f64 * self.fraction.max(0.0)).floor() as usize).clamp(1, len)
    }

    fn state(&self) -> &SearchState {
        &self.state
    }
}
