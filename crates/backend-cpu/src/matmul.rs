//! Matrix multiplication host kernels.

use crate::defines::Defines;
use crate::kernel::{HostKernel, LaunchContext};
use anyhow::{bail, ensure, Result};
use ndarray::{s, Array2, ArrayView2, Axis};
use rayon::prelude::*;

/// Bytes per `f32` element staged in local memory.
const ELEMENT_BYTES: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatmulProblem {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl MatmulProblem {
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }

    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64
    }

    /// Deterministic `m x k` and `k x n` operands.
    ///
    /// Entries are small integers, so every partial sum is exact in `f32`
    /// and all tilings agree with the reference bit for bit.
    pub fn inputs(&self) -> Vec<Array2<f32>> {
        let lhs = Array2::from_shape_fn((self.m, self.k), |(i, j)| ((i + 2 * j) % 7) as f32 - 3.0);
        let rhs = Array2::from_shape_fn((self.k, self.n), |(i, j)| ((3 * i + j) % 5) as f32 - 2.0);
        vec![lhs, rhs]
    }
}

fn operands<'a>(inputs: &'a [Array2<f32>]) -> Result<(ArrayView2<'a, f32>, ArrayView2<'a, f32>)> {
    let [lhs, rhs] = inputs else {
        bail!("matmul expects 2 input buffers, got {}", inputs.len());
    };
    if lhs.ncols() != rhs.nrows() {
        bail!(
            "matmul dimension mismatch: lhs {}x{} vs rhs {}x{}",
            lhs.nrows(),
            lhs.ncols(),
            rhs.nrows(),
            rhs.ncols()
        );
    }
    Ok((lhs.view(), rhs.view()))
}

/// Untiled product, row-parallel. Serves as the correctness reference.
#[derive(Debug, Default)]
pub struct ReferenceMatmul;

impl HostKernel for ReferenceMatmul {
    fn name(&self) -> &str {
        "matmul_reference"
    }

    fn run(&self, ctx: &LaunchContext<'_>) -> Result<Vec<Array2<f32>>> {
        let (lhs, rhs) = operands(ctx.inputs)?;
        let mut output = Array2::<f32>::zeros((lhs.nrows(), rhs.ncols()));

        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row_idx, mut row)| {
                let lhs_row = lhs.row(row_idx);
                for (col_idx, value) in row.iter_mut().enumerate() {
                    *value = lhs_row.dot(&rhs.column(col_idx));
                }
            });
        Ok(vec![output])
    }
}

/// Tile sizes a [`TiledMatmul`] launch is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatmulTiling {
    pub tile_m: usize,
    pub tile_n: usize,
    pub tile_k: usize,
    pub vector_width: usize,
}

impl MatmulTiling {
    /// Reads `TILE_M`, `TILE_N`, `TILE_K` and `VW`; `VW` defaults to 1.
    pub fn from_defines(defines: &Defines) -> Result<Self> {
        let tiling = Self {
            tile_m: defines.require("TILE_M")?,
            tile_n: defines.require("TILE_N")?,
            tile_k: defines.require("TILE_K")?,
            vector_width: defines.get_or("VW", 1),
        };
        ensure!(
            tiling.tile_m > 0 && tiling.tile_n > 0 && tiling.tile_k > 0 && tiling.vector_width > 0,
            "tile sizes must be positive: {tiling:?}"
        );
        ensure!(
            tiling.tile_k % tiling.vector_width == 0,
            "VW {} does not divide TILE_K {}",
            tiling.vector_width,
            tiling.tile_k
        );
        Ok(tiling)
    }

    /// Bytes of the `lhs` and `rhs` tiles staged per work-group.
    pub fn local_memory_bytes(&self) -> u64 {
        ((self.tile_m * self.tile_k + self.tile_k * self.tile_n) as u64) * ELEMENT_BYTES
    }
}

/// Blocked product with one work-group per `TILE_M x TILE_N` output tile.
///
/// The global size counts output elements. It must cover the output and be
/// a whole number of tiles in each dimension.
#[derive(Debug, Default)]
pub struct TiledMatmul;

impl HostKernel for TiledMatmul {
    fn name(&self) -> &str {
        "matmul_tiled"
    }

    fn local_memory_usage(&self, defines: &Defines) -> Result<u64> {
        Ok(MatmulTiling::from_defines(defines)?.local_memory_bytes())
    }

    fn run(&self, ctx: &LaunchContext<'_>) -> Result<Vec<Array2<f32>>> {
        let tiling = MatmulTiling::from_defines(ctx.defines)?;
        let (lhs, rhs) = operands(ctx.inputs)?;
        let (m, k, n) = (lhs.nrows(), lhs.ncols(), rhs.ncols());

        let global = &ctx.geometry.global;
        ensure!(
            global.len() == 2
                && global[0] >= m
                && global[1] >= n
                && global[0] % tiling.tile_m == 0
                && global[1] % tiling.tile_n == 0,
            "launch {global:?} does not tile a {m}x{n} output with {}x{} tiles",
            tiling.tile_m,
            tiling.tile_n
        );

        let (tm, tn, tk, vw) = (
            tiling.tile_m,
            tiling.tile_n,
            tiling.tile_k,
            tiling.vector_width,
        );
        let mut output = Array2::<f32>::zeros((m, n));

        output
            .axis_chunks_iter_mut(Axis(0), tm)
            .into_par_iter()
            .enumerate()
            .for_each(|(block, mut rows)| {
                let i0 = block * tm;
                let i_max = i0 + rows.nrows();
                for j0 in (0..n).step_by(tn) {
                    let j_max = (j0 + tn).min(n);
                    for p0 in (0..k).step_by(tk) {
                        let p_max = (p0 + tk).min(k);
                        let a_block = lhs.slice(s![i0..i_max, p0..p_max]);
                        let b_block = rhs.slice(s![p0..p_max, j0..j_max]);
                        let mut c_block = rows.slice_mut(s![.., j0..j_max]);

                        for (row_idx, a_row) in a_block.outer_iter().enumerate() {
                            for (col_idx, b_col) in b_block.axis_iter(Axis(1)).enumerate() {
                                let mut acc = 0.0f32;
                                for chunk in (0..a_row.len()).step_by(vw) {
                                    let end = (chunk + vw).min(a_row.len());
                                    for idx in chunk..end {
                                        acc += a_row[idx] * b_col[idx];
                                    }
                                }
                                c_block[(row_idx, col_idx)] += acc;
                            }
                        }
                    }
                }
            });
        Ok(vec![output])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use kerneltune_space::LaunchGeometry;

    fn run(kernel: &dyn HostKernel, source: &str, global: Vec<usize>, inputs: &[Array2<f32>]) -> Result<Array2<f32>> {
        let defines = Defines::parse(source);
        let geometry = LaunchGeometry::new(global, vec![1, 1]);
        let ctx = LaunchContext {
            defines: &defines,
            geometry: &geometry,
            inputs,
        };
        let mut outputs = kernel.run(&ctx)?;
        Ok(outputs.remove(0))
    }

    #[test]
    fn tiled_matches_reference_on_ragged_sizes() {
        let problem = MatmulProblem::new(37, 29, 18);
        let inputs = problem.inputs();
        let reference = run(&ReferenceMatmul, "", vec![1, 1], &inputs).unwrap();
        let expected = inputs[0].dot(&inputs[1]);

        let source = "#define TILE_M 8\n#define TILE_N 16\n#define TILE_K 6\n#define VW 3\n";
        let tiled = run(&TiledMatmul, source, vec![40, 32], &inputs).unwrap();

        for i in 0..problem.m {
            for j in 0..problem.n {
                assert_abs_diff_eq!(reference[(i, j)], expected[(i, j)], epsilon = 1e-4);
                assert_abs_diff_eq!(tiled[(i, j)], expected[(i, j)], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn tiled_rejects_partial_launch() {
        let inputs = MatmulProblem::new(32, 32, 8).inputs();
        let source = "#define TILE_M 8\n#define TILE_N 8\n#define TILE_K 8\n";
        assert!(run(&TiledMatmul, source, vec![32, 32], &inputs).is_ok());
        assert!(run(&TiledMatmul, source, vec![16, 32], &inputs).is_err());
        assert!(run(&TiledMatmul, source, vec![36, 32], &inputs).is_err());
    }

    #[test]
    fn tiling_validates_defines() {
        let missing = Defines::parse("#define TILE_M 8\n#define TILE_N 8\n");
        assert!(MatmulTiling::from_defines(&missing).is_err());

        let uneven = Defines::parse("#define TILE_M 8\n#define TILE_N 8\n#define TILE_K 6\n#define VW 4\n");
        assert!(MatmulTiling::from_defines(&uneven).is_err());

        let tiling = Defines::parse("#define TILE_M 16\n#define TILE_N 8\n#define TILE_K 4\n");
        assert_eq!(TiledMatmul.local_memory_usage(&tiling).unwrap(), (16 * 4 + 4 * 8) * 4);
    }

    #[test]
    fn rejects_mismatched_operands() {
        let inputs = vec![Array2::<f32>::zeros((4, 3)), Array2::<f32>::zeros((4, 3))];
        assert!(run(&ReferenceMatmul, "", vec![1, 1], &inputs).is_err());
        assert!(run(&ReferenceMatmul, "", vec![1, 1], &inputs[..1]).is_err());
    }
}
