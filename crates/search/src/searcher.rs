//! The searcher contract and the bookkeeping every strategy shares.

use kerneltune_space::Configuration;
use std::io::{self, Write};
use std::sync::Arc;

/// Time recorded for a configuration that failed to execute or verify.
pub const FAILED_TIME: f64 = f64::INFINITY;

/// A strategy that walks a fixed configuration list.
///
/// The tuner calls [`configuration`](Searcher::configuration),
/// [`push_execution_time`](Searcher::push_execution_time) and
/// [`calculate_next_index`](Searcher::calculate_next_index) once per step, for
/// [`num_configurations`](Searcher::num_configurations) steps.
pub trait Searcher: Send {
    fn name(&self) -> &str;

    /// Configuration at the current cursor.
    fn configuration(&mut self) -> Configuration;

    /// Records the measured time of the configuration at the cursor.
    /// [`FAILED_TIME`] marks a configuration to avoid.
    fn push_execution_time(&mut self, time_ms: f64);

    fn calculate_next_index(&mut self);

    /// Number of steps the tuner should take.
    fn num_configurations(&self) -> usize;

    fn state(&self) -> &SearchState;
}

/// Cursor, per-slot times and exploration log of one searcher instance.
#[derive(Debug, Clone)]
pub struct SearchState {
    configurations: Arc<[Configuration]>,
    times: Vec<Option<f64>>,
    log: Vec<(usize, f64)>,
    index: usize,
}

impl SearchState {
    pub fn new(configurations: Arc<[Configuration]>) -> Self {
        let times = vec![None; configurations.len()];
        Self {
            configurations,
            times,
            log: Vec::new(),
            index: 0,
        }
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Configuration at the cursor, or the empty configuration when the
    /// list is empty.
    pub fn current(&self) -> Configuration {
        self.configurations
            .get(self.index)
            .cloned()
            .unwrap_or_default()
    }

    /// Records a measurement for the slot at the cursor. A slot keeps the
    /// best time it has seen; failures are recorded as infinity.
    pub fn record(&mut self, time_ms: f64) {
        let time = if time_ms.is_nan() { FAILED_TIME } else { time_ms };
        if let Some(slot) = self.times.get_mut(self.index) {
            *slot = Some(match *slot {
                Some(previous) => previous.min(time),
                None => time,
            });
            self.log.push((self.index, time));
        }
    }

    /// Best known time of a slot; unknown slots compare as infinity.
    pub fn time_of(&self, index: usize) -> f64 {
        self.times
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(f64::INFINITY)
    }

    pub fn is_explored(&self, index: usize) -> bool {
        matches!(self.times.get(index), Some(Some(_)))
    }

    /// Explored indices with their measured times, in exploration order.
    pub fn log(&self) -> &[(usize, f64)] {
        &self.log
    }

    /// Writes the exploration log as `step;index;time` lines.
    pub fn write_log<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (step, (index, time)) in self.log.iter().enumerate() {
            writeln!(out, "{};{};{}", step, index, time)?;
        }
        Ok(())
    }
}

pub(crate) fn rng_from(seed: Option<u64>) -> fastrand::Rng {
    match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    }
}

/// Number of steps a fractional strategy takes over `len` configurations.
pub(crate) fn fraction_of(len: usize, fraction: f64) -> usize {
    let steps = (len as f64 * fraction.max(0.0)).floor() as usize;
    steps.min(len)
}
