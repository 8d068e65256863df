use crate::searcher::{fraction_of, rng_from, SearchState, Searcher};
use kerneltune_space::Configuration;
use std::sync::Arc;

/// Visits a fraction of the configurations in an order shuffled once at
/// construction.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    state: SearchState,
    order: Vec<usize>,
    step: usize,
    fraction: f64,
}

impl RandomSearch {
    pub fn new(configurations: Arc<[Configuration]>, fraction: f64, seed: Option<u64>) -> Self {
        let mut order: Vec<usize> = (0..configurations.len()).collect();
        rng_from(seed).shuffle(&mut order);

        let mut state = SearchState::new(configurations);
        if let Some(&first) = order.first() {
            state.set_index(first);
        }
        Self {
            state,
            order,
            step: 0,
            fraction,
        }
    }
}

impl Searcher for RandomSearch {
    fn name(&self) -> &str {
        "random-search"
    }

    fn configuration(&mut self) -> Configuration {
        self.state.current()
    }

    fn push_execution_time(&mut self, time_ms: f64) {
        self.state.record(time_ms);
    }

    fn calculate_next_index(&mut self) {
        self.step += 1;
        if let Some(&next) = self.order.get(self.step) {
            self.state.set_index(next);
        }
    }

    fn num_configurations(&self) -> usize {
        fraction_of(self.state.len(), self.fraction)
    }

    fn state(&self) -> &SearchState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kerneltune_space::Setting;
    use std::collections::HashSet;

    fn list(n: usize) -> Arc<[Configuration]> {
        (0..n)
            .map(|v| Configuration::new(vec![Setting::new("A", v)]))
            .collect()
    }

    fn visit(search: &mut RandomSearch) -> Vec<usize> {
        for _ in 0..search.num_configurations() {
            search.configuration();
            search.push_execution_time(1.0);
            search.calculate_next_index();
        }
        search.state().log().iter().map(|(i, _)| *i).collect()
    }

    #[test]
    fn full_fraction_visits_everything_once() {
        let mut search = RandomSearch::new(list(17), 1.0, Some(7));
        let visited = visit(&mut search);
        assert_eq!(visited.len(), 17);
        let unique: HashSet<usize> = visited.into_iter().collect();
        assert_eq!(unique, (0..17).collect());
    }

    #[test]
    fn half_fraction_visits_distinct_floor() {
        let mut search = RandomSearch::new(list(9), 0.5, Some(3));
        assert_eq!(search.num_configurations(), 4);
        let visited = visit(&mut search);
        let unique: HashSet<usize> = visited.iter().copied().collect();
        assert_eq!(visited.len(), 4);
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn same_seed_same_order() {
        let a = visit(&mut RandomSearch::new(list(12), 1.0, Some(42)));
        let b = visit(&mut RandomSearch::new(list(12), 1.0, Some(42)));
        assert_eq!(a, b);
    }
}
