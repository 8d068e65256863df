//! Feature scaling and expansion shared by the models.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};

/// Per-feature mean and range captured from a training set.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    means: Array1<f64>,
    ranges: Array1<f64>,
}

impl Normalizer {
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let features = x.ncols();
        let means = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features));
        let mins = x.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| acc.min(v));
        let maxs = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v));
        let ranges = (&maxs - &mins).mapv(|r| if r.is_finite() && r > 0.0 { r } else { 1.0 });
        Self { means, ranges }
    }

    pub fn features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn ranges(&self) -> &Array1<f64> {
        &self.ranges
    }

    /// `(x - mean) / range`, column by column.
    pub fn apply(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.means) / &self.ranges
    }
}

/// Prepends a bias column of ones and appends every second-order product
/// `x_i * x_j` with `i <= j`.
pub fn with_bias_and_products(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let (rows, n) = x.dim();
    let pairs = n * (n + 1) / 2;
    let mut design = Array2::ones((rows, 1 + n + pairs));
    design.slice_mut(s![.., 1..=n]).assign(&x);

    let mut column = 1 + n;
    for i in 0..n {
        for j in i..n {
            let product = &x.column(i) * &x.column(j);
            design.column_mut(column).assign(&product);
            column += 1;
        }
    }
    design
}

/// Prepends a bias column of ones.
pub fn with_bias(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let (rows, n) = x.dim();
    let mut out = Array2::ones((rows, n + 1));
    out.slice_mut(s![.., 1..]).assign(&x);
    out
}
