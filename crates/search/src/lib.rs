//! Search strategies for kerneltune.
//!
//! Every strategy is built from the same shared configuration list and
//! implements [`Searcher`], so the tuner drives them identically.

pub mod annealing;
pub mod full;
pub mod method;
pub mod pso;
pub mod random;
pub mod searcher;

pub use annealing::{acceptance_probability, neighbours_of, Annealing, DEFAULT_RETRY_BUDGET};
pub use full::FullSearch;
pub use method::SearchMethod;
pub use pso::{Influences, Pso};
pub use random::RandomSearch;
pub use searcher::{SearchState, Searcher, FAILED_TIME};
