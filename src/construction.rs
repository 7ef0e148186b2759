use crate::workspace::{RowScratch, Workspace};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::OnceLock;
use thiserror::Error;

/// Row count above which design-matrix assembly moves to the dedicated pool.
const PAR_THRESHOLD: usize = 256;

fn design_thread_pool() -> &'static ThreadPool {
    static POOL: OnceLock<ThreadPool> = OnceLock::new();
    POOL.get_or_init(|| {
        ThreadPoolBuilder::new()
            .build()
            .expect("design thread pool initialization should succeed")
    })
}

/// Errors from design-row and design-matrix construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("Point has {found} coordinates but the workspace has {expected} dimensions.")]
    PointLengthMismatch { expected: usize, found: usize },

    #[error("Variables matrix has {found} columns but the workspace has {expected} dimensions.")]
    VarsColumnMismatch { expected: usize, found: usize },

    #[error("Response vector has length {found} but the variables matrix has {expected} rows.")]
    ResponseLengthMismatch { expected: usize, found: usize },

    #[error("Weights vector has length {found} but the variables matrix has {expected} rows.")]
    WeightsLengthMismatch { expected: usize, found: usize },

    #[error("Output row has length {found} but the workspace has {expected} coefficients.")]
    RowLengthMismatch { expected: usize, found: usize },

    #[error("Scratch buffers do not match the workspace's term counts {term_counts:?}.")]
    ScratchMismatch { term_counts: Vec<usize> },

    #[error("Weight {value} at observation {index} is negative or non-finite.")]
    InvalidWeight { index: usize, value: f64 },
}

/// Builds one design-matrix row for the observation at `x` into `row`.
///
/// Step one evaluates every dimension's basis into the scratch buffers;
/// step two expands those per-dimension values into the full row as a
/// multi-way outer product, walking flat indices with the last dimension
/// fastest. Entry `j` of the row is the product over dimensions `d` of the
/// basis value for term `i_d(j)` at `x[d]`, where `(i_0, .., i_{n-1})` is
/// the multi-index of `j` in the workspace layout.
pub fn fill_design_row(
    workspace: &Workspace,
    x: ArrayView1<'_, f64>,
    scratch: &mut RowScratch,
    row: &mut [f64],
) -> Result<(), DesignError> {
    let dims = workspace.dimension_count();
    if x.len() != dims {
        return Err(DesignError::PointLengthMismatch {
            expected: dims,
            found: x.len(),
        });
    }
    if row.len() != workspace.total_coefficients() {
        return Err(DesignError::RowLengthMismatch {
            expected: workspace.total_coefficients(),
            found: row.len(),
        });
    }
    if !scratch.matches(workspace.term_counts()) {
        return Err(DesignError::ScratchMismatch {
            term_counts: workspace.term_counts().to_vec(),
        });
    }
    fill_row_parts(workspace, x, scratch, row);
    Ok(())
}

/// Shape-checked core of [`fill_design_row`]; also the per-row worker for
/// the parallel matrix path, which validates shapes once up front.
fn fill_row_parts(
    workspace: &Workspace,
    x: ArrayView1<'_, f64>,
    scratch: &mut RowScratch,
    row: &mut [f64],
) {
    for (dim, basis) in workspace.bases().iter().enumerate() {
        basis.evaluate(x[dim], &mut scratch.values[dim]);
    }

    let layout = workspace.layout();
    let strides = layout.strides();
    let term_counts = layout.term_counts();
    let dims = term_counts.len();

    row.fill(0.0);
    scratch.odometer.fill(0);
    loop {
        let mut product = 1.0f64;
        let mut col = 0usize;
        for dim in 0..dims {
            let v = scratch.values[dim][scratch.odometer[dim]];
            product *= v;
            if product == 0.0 {
                break;
            }
            col += scratch.odometer[dim] * strides[dim];
        }
        if product != 0.0 {
            row[col] = product;
        }

        let mut carried = true;
        for dim in (0..dims).rev() {
            scratch.odometer[dim] += 1;
            if scratch.odometer[dim] < term_counts[dim] {
                carried = false;
                break;
            }
            scratch.odometer[dim] = 0;
        }
        if carried {
            break;
        }
    }
}

/// Convenience wrapper around [`fill_design_row`] that allocates its own
/// scratch and output row.
pub fn design_row(workspace: &Workspace, x: ArrayView1<'_, f64>) -> Result<Array1<f64>, DesignError> {
    let mut scratch = workspace.row_scratch();
    let mut row = Array1::<f64>::zeros(workspace.total_coefficients());
    let row_slice = row
        .as_slice_mut()
        .expect("freshly allocated rows should be contiguous");
    fill_design_row(workspace, x, &mut scratch, row_slice)?;
    Ok(row)
}

/// Builds the full design matrix for a set of observations, one row per
/// observation.
///
/// `vars` holds one observation per row and one independent variable per
/// column. Above a row-count threshold the build runs on the dedicated
/// rayon pool with per-thread scratch; output rows are disjoint and the
/// per-row arithmetic is identical, so both paths produce the same matrix.
pub fn build_design_matrix(
    workspace: &Workspace,
    vars: ArrayView2<'_, f64>,
) -> Result<Array2<f64>, DesignError> {
    let dims = workspace.dimension_count();
    if vars.ncols() != dims {
        return Err(DesignError::VarsColumnMismatch {
            expected: dims,
            found: vars.ncols(),
        });
    }

    let ndata = vars.nrows();
    let total = workspace.total_coefficients();
    let mut design = Array2::<f64>::zeros((ndata, total));

    if ndata >= PAR_THRESHOLD {
        log::debug!("building design matrix in parallel: {ndata} rows x {total} coefficients");
        design_thread_pool().install(|| {
            design
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each_init(
                    || workspace.row_scratch(),
                    |scratch, (row_idx, mut row)| {
                        let row_slice = row
                            .as_slice_mut()
                            .expect("design matrix rows should be contiguous");
                        fill_row_parts(workspace, vars.row(row_idx), scratch, row_slice);
                    },
                );
        });
    } else {
        let mut scratch = workspace.row_scratch();
        for (row_idx, mut row) in design.axis_iter_mut(Axis(0)).enumerate() {
            let row_slice = row
                .as_slice_mut()
                .expect("design matrix rows should be contiguous");
            fill_row_parts(workspace, vars.row(row_idx), &mut scratch, row_slice);
        }
    }

    Ok(design)
}

/// Builds the design matrix and response for weighted least squares.
///
/// Each design row and its response entry are scaled by the square root of
/// the observation's weight, so an ordinary solver applied to the returned
/// pair minimizes the weighted residual sum of squares. Weights must be
/// finite and non-negative; a NaN produced by `sqrt` here would silently
/// corrupt the fit downstream, so invalid weights are rejected before any
/// row is built.
pub fn build_weighted_design(
    workspace: &Workspace,
    vars: ArrayView2<'_, f64>,
    response: ArrayView1<'_, f64>,
    weights: ArrayView1<'_, f64>,
) -> Result<(Array2<f64>, Array1<f64>), DesignError> {
    let ndata = vars.nrows();
    if response.len() != ndata {
        return Err(DesignError::ResponseLengthMismatch {
            expected: ndata,
            found: response.len(),
        });
    }
    if weights.len() != ndata {
        return Err(DesignError::WeightsLengthMismatch {
            expected: ndata,
            found: weights.len(),
        });
    }
    for (index, &value) in weights.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(DesignError::InvalidWeight { index, value });
        }
    }

    let mut design = build_design_matrix(workspace, vars)?;
    let mut scaled_response = response.to_owned();
    for (index, &weight) in weights.iter().enumerate() {
        let scale = weight.sqrt();
        design.row_mut(index).mapv_inplace(|v| v * scale);
        scaled_response[index] *= scale;
    }
    Ok((design, scaled_response))
}
