//! Removal of structurally absent indices from the technology matrix.
use nalgebra::DMatrix;

/// A technology matrix restricted to the indices present at one time step
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedMatrix {
    /// The submatrix of present rows and columns
    pub matrix: DMatrix<f64>,
    /// For each index of `matrix`, the corresponding index of the full matrix (ascending)
    pub presence: Vec<usize>,
}

/// Drop every index whose row and column are both entirely zero.
///
/// Such indices (idle import links, technologies without production) are disconnected from the
/// flow network for this step and would only make the system to invert larger.
pub fn reduce_technology_matrix(matrix: &DMatrix<f64>) -> ReducedMatrix {
    let presence: Vec<usize> = (0..matrix.nrows())
        .filter(|&i| {
            matrix.row(i).iter().any(|&v| v != 0.0) || matrix.column(i).iter().any(|&v| v != 0.0)
        })
        .collect();

    ReducedMatrix {
        matrix: matrix.select_rows(&presence).select_columns(&presence),
        presence,
    }
}
