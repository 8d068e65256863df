use crate::searcher::{SearchState, Searcher};
use kerneltune_space::Configuration;
use std::sync::Arc;

/// Visits every configuration once, in list order.
#[derive(Debug, Clone)]
pub struct FullSearch {
    state: SearchState,
}

impl FullSearch {
    pub fn new(configurations: Arc<[Configuration]>) -> Self {
        Self {
            state: SearchState::new(configurations),
        }
    }
}

impl Searcher for FullSearch {
    fn name(&self) -> &str {
        "full-search"
    }

    fn configuration(&mut self) -> Configuration {
        self.state.current()
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        self.state.record(time_ms);
    }

    fn calculate_next_index(&mut self) {
        let next = self.state.index() + 1;
        self.state.set_index(next);
    }

    fn num_configurations(&self) -> usize {
        self.state.len()
    }

    fn state(&self) -> &SearchState {
        &self.state
    }
}
