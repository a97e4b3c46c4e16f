/// Maximum number of Jacobi sweeps before giving up on convergence.
const MAX_SWEEPS: usize = 32;

/// Eigen decomposition of a symmetric 3x3 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricEigen3 {
    /// Eigenvalues sorted in increasing order.
    pub eigenvalues: [f64; 3],
    /// Unit eigenvectors, `eigenvectors[i]` belongs to `eigenvalues[i]`.
    pub eigenvectors: [[f64; 3]; 3],
}

/// Compute the eigen decomposition of a symmetric 3x3 matrix with cyclic Jacobi rotations.
///
/// Only the upper triangle is read, the matrix is assumed to be symmetric.
///
/// # Arguments
///
/// * `mat` - A row-major symmetric matrix.
///
/// # Returns
///
/// The eigenvalues in increasing order with their eigenvectors.
///
/// Example:
///
/// ```
/// use densematch_3d::linalg::symmetric_eigen3;
///
/// let eig = symmetric_eigen3(&[[3.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]]);
/// assert_eq!(eig.eigenvalues, [1.0, 2.0, 3.0]);
/// ```
pub fn symmetric_eigen3(mat: &[[f64; 3]; 3]) -> SymmetricEigen3 {
    let mut a = [
        [mat[0][0], mat[0][1], mat[0][2]],
        [mat[0][1], mat[1][1], mat[1][2]],
        [mat[0][2], mat[1][2], mat[2][2]],
    ];
    // accumulated rotations, the columns converge to the eigenvectors
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    let norm2 = a.iter().flatten().map(|x| x * x).sum::<f64>();

    for _ in 0..MAX_SWEEPS {
        let off_diag = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off_diag <= f64::EPSILON * f64::EPSILON * norm2 {
            break;
        }

        for (p, q) in [(0, 1), (0, 2), (1, 2)] {
            if a[p][q] == 0.0 {
                continue;
            }

            // rotation angle that zeroes a[p][q]
            let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;

            // A <- A * J
            for row in a.iter_mut() {
                let (akp, akq) = (row[p], row[q]);
                row[p] = c * akp - s * akq;
                row[q] = s * akp + c * akq;
            }
            // A <- J^T * A
            for k in 0..3 {
                let (apk, aqk) = (a[p][k], a[q][k]);
                a[p][k] = c * apk - s * aqk;
                a[q][k] = s * apk + c * aqk;
            }
            // V <- V * J
            for row in v.iter_mut() {
                let (vkp, vkq) = (row[p], row[q]);
                row[p] = c * vkp - s * vkq;
                row[q] = s * vkp + c * vkq;
            }
        }
    }

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| a[i][i].total_cmp(&a[j][j]));

    let column = |j: usize| [v[0][j], v[1][j], v[2][j]];

    SymmetricEigen3 {
        eigenvalues: [a[order[0]][order[0]], a[order[1]][order[1]], a[order[2]][order[2]]],
        eigenvectors: [column(order[0]), column(order[1]), column(order[2])],
    }
}
