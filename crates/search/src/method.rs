use crate::annealing::Annealing;
use crate::full::FullSearch;
use crate::pso::{Influences, Pso};
use crate::random::RandomSearch;
use crate::searcher::Searcher;
use kerneltune_space::{Configuration, Parameter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which strategy the tuner instantiates for each kernel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SearchMethod {
    #[default]
    FullSearch,
    RandomSearch {
        fraction: f64,
    },
    Annealing {
        fraction: f64,
        max_temperature: f64,
    },
    Pso {
        fraction: f64,
        swarm_size: usize,
        influence_global: f64,
        influence_local: f64,
        influence_random: f64,
    },
}

impl SearchMethod {
    pub fn build(
        &self,
        configurations: Arc<[Configuration]>,
        parameters: &[Parameter],
        seed: Option<u64>,
    ) -> Box<dyn Searcher> {
        match *self {
            SearchMethod::FullSearch => Box::new(FullSearch::new(configurations)),
            SearchMethod::RandomSearch { fraction } => {
                Box::new(RandomSearch::new(configurations, fraction, seed))
            }
            SearchMethod::Annealing {
                fraction,
                max_temperature,
            } => Box::new(Annealing::new(
                configurations,
                fraction,
                max_temperature,
                seed,
            )),
            SearchMethod::Pso {
                fraction,
                swarm_size,
                influence_global,
                influence_local,
                influence_random,
            } => Box::new(Pso::new(
                configurations,
                parameters.to_vec(),
                fraction,
                swarm_size,
                Influences {
                    global: influence_global,
                    local: influence_local,
                    random: influence_random,
                },
                seed,
            )),
        }
    }

    /// Whether the strategy may leave configurations unexplored.
    pub fn is_partial(&self) -> bool {
        !matches!(self, SearchMethod::FullSearch)
    }
}
