use kerneltune_space::Configuration;
use serde::{Deserialize, Serialize};

/// Outcome of running one configuration of one kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub kernel_name: String,
    /// Measured time in milliseconds; `None` when the launch failed.
    pub time_ms: Option<f64>,
    /// Threads per work-group of the launch.
    pub local_threads: usize,
    pub correct: bool,
    pub configuration: Configuration,
}

impl TuningResult {
    pub fn failed(kernel_name: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            time_ms: None,
            local_threads: 0,
            correct: false,
            configuration,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.time_ms.is_none()
    }

    /// Time for a correct, finished run.
    pub fn valid_time(&self) -> Option<f64> {
        match self.time_ms {
            Some(t) if self.correct && t.is_finite() => Some(t),
            _ => None,
        }
    }
}

/// Correct result with the lowest time; the first one wins ties.
pub fn best_result<'a, I>(results: I) -> Option<&'a TuningResult>
where
    I: IntoIterator<Item = &'a TuningResult>,
{
    let mut best: Option<(f64, &TuningResult)> = None;
    for result in results {
        let Some(time) = result.valid_time() else {
            continue;
        };
        match best {
            Some((best_time, _)) if time >= best_time => {}
            _ => best = Some((time, result)),
        }
    }
    best.map(|(_, result)| result)
}
