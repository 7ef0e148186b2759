use crate::construction::{DesignError, build_design_matrix, design_row};
use crate::workspace::Workspace;
use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

/// Errors from evaluating a fitted separable model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Coefficient vector has length {found} but the workspace has {expected} coefficients.")]
    CoefficientLengthMismatch { expected: usize, found: usize },

    #[error("Covariance matrix is {rows}x{cols} but the workspace needs {expected}x{expected}.")]
    CovarianceShapeMismatch {
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error(transparent)]
    Design(#[from] DesignError),
}

/// A model value and its propagated uncertainty at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelEstimate {
    pub value: f64,
    pub standard_error: f64,
}

fn check_coefficients(
    workspace: &Workspace,
    coefficients: ArrayView1<'_, f64>,
) -> Result<(), EstimationError> {
    if coefficients.len() != workspace.total_coefficients() {
        return Err(EstimationError::CoefficientLengthMismatch {
            expected: workspace.total_coefficients(),
            found: coefficients.len(),
        });
    }
    Ok(())
}

/// Evaluates the fitted model at one point: the dot product of the point's
/// design row with the coefficient vector.
pub fn evaluate(
    workspace: &Workspace,
    x: ArrayView1<'_, f64>,
    coefficients: ArrayView1<'_, f64>,
) -> Result<f64, EstimationError> {
    check_coefficients(workspace, coefficients)?;
    let row = design_row(workspace, x)?;
    Ok(row.dot(&coefficients))
}

/// Evaluates the fitted model at one point together with the standard error
/// propagated from the solver's coefficient covariance.
///
/// The variance is the quadratic form `row' * covariance * row` over the
/// point's design row. Floating-point cancellation can push a near-zero
/// variance slightly negative, so it is clamped at zero before the square
/// root.
pub fn evaluate_with_uncertainty(
    workspace: &Workspace,
    x: ArrayView1<'_, f64>,
    coefficients: ArrayView1<'_, f64>,
    covariance: ArrayView2<'_, f64>,
) -> Result<ModelEstimate, EstimationError> {
    check_coefficients(workspace, coefficients)?;
    let total = workspace.total_coefficients();
    if covariance.nrows() != total || covariance.ncols() != total {
        return Err(EstimationError::CovarianceShapeMismatch {
            expected: total,
            rows: covariance.nrows(),
            cols: covariance.ncols(),
        });
    }

    let row = design_row(workspace, x)?;
    let value = row.dot(&coefficients);
    let variance = row.dot(&covariance.dot(&row));
    Ok(ModelEstimate {
        value,
        standard_error: variance.max(0.0).sqrt(),
    })
}

/// Evaluates the fitted model at every row of `vars`.
///
/// Equivalent to calling [`evaluate`] per point, but builds the design
/// matrix once (in parallel for large inputs) and applies a single
/// matrix-vector product.
pub fn evaluate_many(
    workspace: &Workspace,
    vars: ArrayView2<'_, f64>,
    coefficients: ArrayView1<'_, f64>,
) -> Result<Array1<f64>, EstimationError> {
    check_coefficients(workspace, coefficients)?;
    let design = build_design_matrix(workspace, vars)?;
    Ok(design.dot(&coefficients))
}
