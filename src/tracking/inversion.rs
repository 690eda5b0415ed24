//! Solution of the reduced linear system and reinflation to full size.
use super::reduction::ReducedMatrix;
use anyhow::Result;
use nalgebra::DMatrix;
use std::error::Error;
use std::fmt;

/// Smallest pivot of the LU factorisation, relative to the largest, for which a system is solved.
///
/// Exchange cycles which are closed in exact arithmetic only miss singularity by rounding error,
/// leaving a pivot many orders of magnitude below the others.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Indicates that `I - A` could not be inverted for a time step.
///
/// This signals a degenerate flow network. It is returned wrapped in an [`anyhow::Error`], so
/// callers wishing to skip the offending step can check for it with `downcast_ref`.
#[derive(Debug, Clone, PartialEq)]
pub struct SingularMatrixError {
    /// Dimension of the reduced system
    pub size: usize,
}

impl fmt::Display for SingularMatrixError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "The reduced {0}x{0} technology system is singular",
            self.size
        )
    }
}

impl Error for SingularMatrixError {}

/// Compute `(I - A)⁻¹` for a reduced technology matrix and scatter it back to full size.
///
/// Entry `[i, j]` of the result is the fraction of a unit of `j` which ultimately comes from `i`.
/// Rows and columns of indices absent from the reduced matrix are zero.
///
/// # Arguments
///
/// * `reduced` - The technology matrix without its absent indices
/// * `size` - The dimension of the full technology matrix
pub fn invert_technology_matrix(reduced: &ReducedMatrix, size: usize) -> Result<DMatrix<f64>> {
    let presence = &reduced.presence;
    let dim = presence.len();
    let mut full = DMatrix::zeros(size, size);
    if dim == 0 {
        return Ok(full);
    }

    let system = DMatrix::identity(dim, dim) - &reduced.matrix;
    let lu = system.lu();
    let pivots = lu.u().diagonal();
    if pivots.amin() <= PIVOT_TOLERANCE * pivots.amax() {
        return Err(SingularMatrixError { size: dim }.into());
    }

    let inverse = lu.try_inverse().ok_or(SingularMatrixError { size: dim })?;
    if !inverse.iter().all(|v| v.is_finite()) {
        return Err(SingularMatrixError { size: dim }.into());
    }

    for (k, &row) in presence.iter().enumerate() {
        for (l, &col) in presence.iter().enumerate() {
            full[(row, col)] = inverse[(k, l)];
        }
    }

    Ok(full)
}
