#![deny(dead_code)]
#![deny(unused_imports)]

pub mod basis;
pub mod construction;
pub mod estimate;
pub mod layout;
pub mod workspace;

pub use basis::{BasisFn, DimensionBasis};
pub use construction::{
    DesignError, build_design_matrix, build_weighted_design, design_row, fill_design_row,
};
pub use estimate::{
    EstimationError, ModelEstimate, evaluate, evaluate_many, evaluate_with_uncertainty,
};
pub use layout::{LayoutError, TensorLayout};
pub use workspace::{RowScratch, Workspace};
