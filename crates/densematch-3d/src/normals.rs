use rayon::prelude::*;

use crate::linalg::symmetric_eigen3;
use crate::spatial::{KdTreeIndex, SpatialError, SpatialIndex};

/// Normal assigned when the neighborhood is too small to fit a plane.
pub const DEFAULT_NORMAL: [f64; 3] = [0.0, 0.0, 1.0];

/// Default number of neighbors used to fit the local plane.
pub const DEFAULT_KNN: usize = 30;

/// Error types for the normals module.
#[derive(Debug, thiserror::Error)]
pub enum NormalsError {
    /// The neighborhood size cannot define a plane.
    #[error("Normal estimation needs at least 3 neighbors, got {0}")]
    InvalidNeighborCount(usize),

    /// Normals and points have different lengths.
    #[error("Got {normals} normals for {points} points")]
    LengthMismatch {
        /// Number of points.
        points: usize,
        /// Number of normals.
        normals: usize,
    },

    /// The spatial index could not be built.
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// Estimates one unit normal per point.
pub trait NormalEstimator: Send + Sync {
    /// Estimate the normals of `points`, one per point in the same order.
    fn estimate(&self, points: &[[f64; 3]]) -> Result<Vec<[f64; 3]>, NormalsError>;
}

/// Normal estimation by principal component analysis of the k nearest neighbors.
///
/// The normal of a point is the eigenvector of the smallest eigenvalue of the
/// covariance of its neighborhood (the point itself included). The sign is
/// arbitrary, see [`orient_normals_towards_location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnnNormalEstimator {
    /// Number of nearest neighbors in each neighborhood.
    pub knn: usize,
}

impl KnnNormalEstimator {
    /// Create an estimator using `knn` neighbors.
    pub fn new(knn: usize) -> Self {
        Self { knn }
    }
}

impl Default for KnnNormalEstimator {
    fn default() -> Self {
        Self { knn: DEFAULT_KNN }
    }
}

impl NormalEstimator for KnnNormalEstimator {
    fn estimate(&self, points: &[[f64; 3]]) -> Result<Vec<[f64; 3]>, NormalsError> {
        if self.knn < 3 {
            return Err(NormalsError::InvalidNeighborCount(self.knn));
        }
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let index = KdTreeIndex::build(points)?;
        let normals = points
            .par_iter()
            .map(|p| {
                let neighbors = index.search_knn(p, self.knn);
                normal_from_neighbors(points, &neighbors)
            })
            .collect::<Vec<_>>();

        Ok(normals)
    }
}

/// Fit a plane to the given neighborhood and return its unit normal.
fn normal_from_neighbors(points: &[[f64; 3]], neighbors: &[usize]) -> [f64; 3] {
    if neighbors.len() < 3 {
        return DEFAULT_NORMAL;
    }

    let n = neighbors.len() as f64;
    let mut centroid = [0.0; 3];
    for &i in neighbors {
        for (c, v) in centroid.iter_mut().zip(points[i].iter()) {
            *c += v;
        }
    }
    centroid.iter_mut().for_each(|c| *c /= n);

    let mut cov = [[0.0; 3]; 3];
    for &i in neighbors {
        let d = [
            points[i][0] - centroid[0],
            points[i][1] - centroid[1],
            points[i][2] - centroid[2],
        ];
        for r in 0..3 {
            for c in r..3 {
                cov[r][c] += d[r] * d[c];
            }
        }
    }

    let normal = symmetric_eigen3(&cov).eigenvectors[0];
    let norm = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return DEFAULT_NORMAL;
    }
    [normal[0] / norm, normal[1] / norm, normal[2] / norm]
}

/// Flip the normals so that they point toward `location`.
///
/// A normal is flipped when `n · (location - p) < 0`. A zero normal is replaced
/// by the unit direction from its point to `location`.
pub fn orient_normals_towards_location(
    points: &[[f64; 3]],
    normals: &mut [[f64; 3]],
    location: &[f64; 3],
) -> Result<(), NormalsError> {
    if points.len() != normals.len() {
        return Err(NormalsError::LengthMismatch {
            points: points.len(),
            normals: normals.len(),
        });
    }

    for (p, n) in points.iter().zip(normals.iter_mut()) {
        let to_location = [location[0] - p[0], location[1] - p[1], location[2] - p[2]];

        if n.iter().all(|v| *v == 0.0) {
            let dist = (to_location[0] * to_location[0]
                + to_location[1] * to_location[1]
                + to_location[2] * to_location[2])
                .sqrt();
            *n = if dist > 0.0 {
                [
                    to_location[0] / dist,
                    to_location[1] / dist,
                    to_location[2] / dist,
                ]
            } else {
                DEFAULT_NORMAL
            };
            continue;
        }

        let dot = n[0] * to_location[0] + n[1] * to_location[1] + n[2] * to_location[2];
        if dot < 0.0 {
            *n = [-n[0], -n[1], -n[2]];
        }
    }

    Ok(())
}
