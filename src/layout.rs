use thiserror::Error;

/// Errors from building a tensor coefficient layout or mapping indices
/// through it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Tensor layout requires at least one dimension.")]
    NoDimensions,

    #[error("Dimension {dimension} declares zero basis terms; every dimension needs at least one.")]
    ZeroTerms { dimension: usize },

    #[error("Total coefficient count overflows usize for term counts {term_counts:?}.")]
    CoefficientOverflow { term_counts: Vec<usize> },

    #[error("Multi-index has {found} components but the layout has {expected} dimensions.")]
    RankMismatch { expected: usize, found: usize },

    #[error("Term index {index} is out of range for dimension {dimension} with {terms} terms.")]
    TermIndexOutOfRange {
        dimension: usize,
        index: usize,
        terms: usize,
    },

    #[error("Flat index {index} is out of range for a layout with {total} coefficients.")]
    FlatIndexOutOfRange { index: usize, total: usize },
}

/// Mixed-radix mapping between a flat coefficient index and a tuple of
/// per-dimension term indices.
///
/// The last dimension varies fastest: `strides[n-1] == 1` and
/// `strides[d] == strides[d+1] * term_counts[d+1]`. Design construction and
/// model evaluation both index coefficients through this layout, so the two
/// sides of a fit can never disagree on coefficient order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLayout {
    term_counts: Vec<usize>,
    strides: Vec<usize>,
    total_coefficients: usize,
}

impl TensorLayout {
    pub fn new(term_counts: &[usize]) -> Result<Self, LayoutError> {
        if term_counts.is_empty() {
            return Err(LayoutError::NoDimensions);
        }
        for (dimension, &count) in term_counts.iter().enumerate() {
            if count == 0 {
                return Err(LayoutError::ZeroTerms { dimension });
            }
        }

        let mut strides = vec![1usize; term_counts.len()];
        let mut acc = 1usize;
        for dim in (0..term_counts.len()).rev() {
            strides[dim] = acc;
            acc = acc
                .checked_mul(term_counts[dim])
                .ok_or_else(|| LayoutError::CoefficientOverflow {
                    term_counts: term_counts.to_vec(),
                })?;
        }

        Ok(Self {
            term_counts: term_counts.to_vec(),
            strides,
            total_coefficients: acc,
        })
    }

    pub fn dimension_count(&self) -> usize {
        self.term_counts.len()
    }

    pub fn term_counts(&self) -> &[usize] {
        &self.term_counts
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn total_coefficients(&self) -> usize {
        self.total_coefficients
    }

    /// Maps a multi-index to its flat coefficient index.
    pub fn flatten(&self, multi_index: &[usize]) -> Result<usize, LayoutError> {
        if multi_index.len() != self.term_counts.len() {
            return Err(LayoutError::RankMismatch {
                expected: self.term_counts.len(),
                found: multi_index.len(),
            });
        }
        let mut flat = 0usize;
        for (dimension, (&index, &terms)) in multi_index
            .iter()
            .zip(self.term_counts.iter())
            .enumerate()
        {
            if index >= terms {
                return Err(LayoutError::TermIndexOutOfRange {
                    dimension,
                    index,
                    terms,
                });
            }
            flat += index * self.strides[dimension];
        }
        Ok(flat)
    }

    /// Maps a flat coefficient index back to its multi-index.
    pub fn unflatten(&self, flat: usize) -> Result<Vec<usize>, LayoutError> {
        let mut multi_index = vec![0usize; self.term_counts.len()];
        self.unflatten_into(flat, &mut multi_index)?;
        Ok(multi_index)
    }

    /// Allocation-free variant of [`unflatten`](Self::unflatten) for hot loops.
    pub fn unflatten_into(&self, flat: usize, multi_index: &mut [usize]) -> Result<(), LayoutError> {
        if flat >= self.total_coefficients {
            return Err(LayoutError::FlatIndexOutOfRange {
                index: flat,
                total: self.total_coefficients,
            });
        }
        if multi_index.len() != self.term_counts.len() {
            return Err(LayoutError::RankMismatch {
                expected: self.term_counts.len(),
                found: multi_index.len(),
            });
        }
        let mut remainder = flat;
        for (dimension, stride) in self.strides.iter().enumerate() {
            multi_index[dimension] = remainder / stride;
            remainder %= stride;
        }
        Ok(())
    }
}
