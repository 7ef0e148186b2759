use crate::basis::DimensionBasis;
use crate::layout::{LayoutError, TensorLayout};

/// Immutable registry for one separable fitting problem.
///
/// Holds the per-dimension bases and the coefficient layout derived from
/// their term counts. Construction validates everything eagerly; afterwards
/// the workspace is read-only, so any number of threads can build design
/// rows or evaluate the model against it concurrently. Releasing the
/// workspace is dropping it; the borrow checker rejects use after that.
pub struct Workspace {
    bases: Vec<Box<dyn DimensionBasis>>,
    layout: TensorLayout,
}

impl Workspace {
    /// Builds a workspace from one basis per dimension.
    ///
    /// Fails if no dimension is supplied, if any basis declares zero terms,
    /// or if the total coefficient count would overflow `usize`.
    pub fn new(bases: Vec<Box<dyn DimensionBasis>>) -> Result<Self, LayoutError> {
        let term_counts: Vec<usize> = bases.iter().map(|basis| basis.terms()).collect();
        let layout = TensorLayout::new(&term_counts)?;
        log::debug!(
            "allocated separable workspace: {} dimensions, {} coefficients",
            layout.dimension_count(),
            layout.total_coefficients()
        );
        Ok(Self { bases, layout })
    }

    pub fn dimension_count(&self) -> usize {
        self.layout.dimension_count()
    }

    pub fn term_counts(&self) -> &[usize] {
        self.layout.term_counts()
    }

    pub fn total_coefficients(&self) -> usize {
        self.layout.total_coefficients()
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub(crate) fn bases(&self) -> &[Box<dyn DimensionBasis>] {
        &self.bases
    }

    /// Allocates scratch for building design rows against this workspace.
    ///
    /// Scratch is deliberately not stored inside the workspace: each row
    /// build mutates it, and sharing one buffer across concurrent builds
    /// would corrupt unrelated rows. Each caller (or worker thread) obtains
    /// and exclusively owns its own.
    pub fn row_scratch(&self) -> RowScratch {
        RowScratch::new(self.layout.term_counts())
    }
}

/// Per-call buffers for one design-row build: one basis-value vector per
/// dimension plus the odometer that walks the tensor product.
pub struct RowScratch {
    pub(crate) values: Vec<Vec<f64>>,
    pub(crate) odometer: Vec<usize>,
}

impl RowScratch {
    fn new(term_counts: &[usize]) -> Self {
        Self {
            values: term_counts.iter().map(|&terms| vec![0.0; terms]).collect(),
            odometer: vec![0usize; term_counts.len()],
        }
    }

    pub(crate) fn matches(&self, term_counts: &[usize]) -> bool {
        self.values.len() == term_counts.len()
            && self
                .values
                .iter()
                .zip(term_counts.iter())
                .all(|(buffer, &terms)| buffer.len() == terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BasisFn;

    fn power_basis(terms: usize) -> Box<dyn DimensionBasis> {
        Box::new(BasisFn::new(terms, |x, values: &mut [f64]| {
            let mut power = 1.0;
            for v in values.iter_mut() {
                *v = power;
                power *= x;
            }
        }))
    }

    #[test]
    fn total_coefficients_is_the_product_of_term_counts() {
        let workspace =
            Workspace::new(vec![power_basis(2), power_basis(3), power_basis(4)]).expect("workspace");
        assert_eq!(workspace.dimension_count(), 3);
        assert_eq!(workspace.term_counts(), &[2, 3, 4]);
        assert_eq!(workspace.total_coefficients(), 24);
    }

    #[test]
    fn rejects_a_zero_term_basis() {
        let result = Workspace::new(vec![power_basis(0), power_basis(3)]);
        assert!(matches!(result, Err(LayoutError::ZeroTerms { dimension: 0 })));
    }

    #[test]
    fn rejects_an_empty_basis_list() {
        assert!(matches!(
            Workspace::new(Vec::new()),
            Err(LayoutError::NoDimensions)
        ));
    }

    #[test]
    fn scratch_is_sized_per_dimension() {
        let workspace = Workspace::new(vec![power_basis(2), power_basis(5)]).expect("workspace");
        let scratch = workspace.row_scratch();
        assert!(scratch.matches(&[2, 5]));
        assert!(!scratch.matches(&[2, 4]));
        assert!(!scratch.matches(&[2]));
    }
}
