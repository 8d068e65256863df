//! Output comparison against the reference kernel.

use crate::backend::OutputBuffer;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest accepted summed absolute difference between outputs.
pub const DEFAULT_THRESHOLD: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Verification {
    /// No reference captured; nothing to compare against.
    Skipped,
    Passed { l2_norm: f64 },
    Failed { reason: String },
}

impl Verification {
    pub fn is_correct(&self) -> bool {
        !matches!(self, Verification::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Verifier {
    threshold: f64,
    reference: Option<Vec<OutputBuffer>>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Verifier {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            reference: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn capture_reference(&mut self, outputs: Vec<OutputBuffer>) {
        self.reference = Some(outputs);
    }

    pub fn clear_reference(&mut self) {
        self.reference = None;
    }

    /// Compares each output buffer with the captured reference.
    pub fn compare(&self, outputs: &[OutputBuffer]) -> Verification {
        let Some(reference) = &self.reference else {
            return Verification::Skipped;
        };
        if reference.len() != outputs.len() {
            return Verification::Failed {
                reason: format!(
                    "expected {} output buffers, got {}",
                    reference.len(),
                    outputs.len()
                ),
            };
        }

        let mut worst = 0.0f64;
        for (index, (expected, actual)) in reference.iter().zip(outputs).enumerate() {
            let l2_norm = match l2_distance(expected, actual) {
                Ok(l2_norm) => l2_norm,
                Err(reason) => {
                    return Verification::Failed {
                        reason: format!("output {index}: {reason}"),
                    }
                }
            };
            if l2_norm.is_nan() || l2_norm > self.threshold {
                warn!(output = index, l2_norm, "results differ from reference");
                return Verification::Failed {
                    reason: format!("output {index}: L2 norm is {l2_norm:.2e}"),
                };
            }
            worst = worst.max(l2_norm);
        }
        Verification::Passed { l2_norm: worst }
    }
}

/// Sum of absolute element differences. Complex elements contribute
/// `|re| + |im|`.
pub fn l2_distance(expected: &OutputBuffer, actual: &OutputBuffer) -> Result<f64, String> {
    if expected.len() != actual.len() {
        return Err(format!(
            "expected {} elements, got {}",
            expected.len(),
            actual.len()
        ));
    }
    let sum = match (expected, actual) {
        (OutputBuffer::Int(a), OutputBuffer::Int(b)) => sum_abs(a, b, |x, y| {
            (f64::from(*x) - f64::from(*y)).abs()
        }),
        (OutputBuffer::Float(a), OutputBuffer::Float(b)) => sum_abs(a, b, |x, y| {
            (f64::from(*x) - f64::from(*y)).abs()
        }),
        (OutputBuffer::Double(a), OutputBuffer::Double(b)) => sum_abs(a, b, |x, y| (x - y).abs()),
        (OutputBuffer::Float2(a), OutputBuffer::Float2(b)) => sum_abs(a, b, |x, y| {
            (f64::from(x[0]) - f64::from(y[0])).abs() + (f64::from(x[1]) - f64::from(y[1])).abs()
        }),
        (OutputBuffer::Double2(a), OutputBuffer::Double2(b)) => sum_abs(a, b, |x, y| {
            (x[0] - y[0]).abs() + (x[1] - y[1]).abs()
        }),
        _ => {
            return Err(format!(
                "type mismatch: expected {}, got {}",
                expected.type_name(),
                actual.type_name()
            ))
        }
    };
    Ok(sum)
}

fn sum_abs<T>(a: &[T], b: &[T], diff: impl Fn(&T, &T) -> f64) -> f64 {
    a.iter().zip(b).map(|(x, y)| diff(x, y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn passes_without_reference() {
        let verifier = Verifier::default();
        assert_eq!(
            verifier.compare(&[OutputBuffer::Float(vec![1.0])]),
            Verification::Skipped
        );
        assert!(Verification::Skipped.is_correct());
    }

    #[test]
    fn accepts_small_differences() {
        let mut verifier = Verifier::default();
        verifier.capture_reference(vec![OutputBuffer::Double(vec![1.0, 2.0])]);
        let verdict = verifier.compare(&[OutputBuffer::Double(vec![1.0, 2.00001])]);
        assert!(verdict.is_correct());
    }

    #[test]
    fn rejects_large_differences_and_nan() {
        let mut verifier = Verifier::default();
        verifier.capture_reference(vec![OutputBuffer::Float(vec![1.0, 2.0])]);
        assert!(!verifier
            .compare(&[OutputBuffer::Float(vec![1.0, 2.1])])
            .is_correct());
        assert!(!verifier
            .compare(&[OutputBuffer::Float(vec![f32::NAN, 2.0])])
            .is_correct());
    }

    #[test]
    fn rejects_shape_and_type_mismatches() {
        let mut verifier = Verifier::default();
        verifier.capture_reference(vec![OutputBuffer::Int(vec![1, 2])]);
        assert!(!verifier.compare(&[OutputBuffer::Int(vec![1])]).is_correct());
        assert!(!verifier
            .compare(&[OutputBuffer::Float(vec![1.0, 2.0])])
            .is_correct());
        assert!(!verifier.compare(&[]).is_correct());
    }

    #[test]
    fn complex_difference_sums_components() {
        let a = OutputBuffer::Double2(vec![[1.0, 1.0], [0.0, 0.0]]);
        let b = OutputBuffer::Double2(vec![[1.5, 0.0], [0.0, -0.25]]);
        assert_relative_eq!(l2_distance(&a, &b).unwrap(), 1.75);
    }
}
