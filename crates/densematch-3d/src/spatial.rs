use std::num::NonZeroUsize;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use rayon::prelude::*;

use crate::pose::Pose;

/// Bucket size for the KD-tree leaves.
///
/// Planar scans put many points on the same coordinate of one axis, which a
/// small bucket cannot split.
const BUCKET_SIZE: usize = 256;

/// A correspondence `(i, j)` between source point `i` and target point `j`.
pub type Correspondence = (usize, usize);

/// Error types for the spatial index module.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The index cannot be built over an empty point set.
    #[error("Cannot build a spatial index from an empty point set")]
    EmptyIndex,

    /// The point set does not fit the index item type.
    #[error("Too many points for the spatial index: {0}")]
    TooManyPoints(usize),

    /// The search radius must be finite and strictly positive.
    #[error("Invalid search radius: {0}")]
    InvalidRadius(f64),
}

/// A spatial index over a fixed set of points.
///
/// The indexed points are a snapshot taken at construction time. Query results
/// are indices into that snapshot, sorted by increasing distance to the query.
pub trait SpatialIndex: Sync {
    /// Number of indexed points.
    fn len(&self) -> usize;

    /// Whether the index holds no points.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of all points strictly closer than `radius` to `query`, nearest first.
    fn search_radius(&self, query: &[f64; 3], radius: f64) -> Vec<usize>;

    /// Indices of the `k` nearest points to `query`, nearest first.
    fn search_knn(&self, query: &[f64; 3], k: usize) -> Vec<usize>;
}

/// KD-tree based spatial index.
pub struct KdTreeIndex {
    kdtree: ImmutableKdTree<f64, u32, 3, BUCKET_SIZE>,
    num_points: usize,
}

impl KdTreeIndex {
    /// Build a KD-tree over the given points.
    ///
    /// The item stored for each point is its position in `points`.
    pub fn build(points: &[[f64; 3]]) -> Result<Self, SpatialError> {
        if points.is_empty() {
            return Err(SpatialError::EmptyIndex);
        }
        if points.len() > u32::MAX as usize {
            return Err(SpatialError::TooManyPoints(points.len()));
        }

        let kdtree: ImmutableKdTree<f64, u32, 3, BUCKET_SIZE> =
            ImmutableKdTree::new_from_slice(points);
        log::debug!("Built kd-tree over {} points", points.len());

        Ok(Self {
            kdtree,
            num_points: points.len(),
        })
    }
}

impl SpatialIndex for KdTreeIndex {
    fn len(&self) -> usize {
        self.num_points
    }

    fn search_radius(&self, query: &[f64; 3], radius: f64) -> Vec<usize> {
        // kiddo works with squared distances and includes the boundary
        let radius_sq = radius * radius;
        self.kdtree
            .within::<SquaredEuclidean>(query, radius_sq)
            .iter()
            .filter(|nn| nn.distance < radius_sq)
            .map(|nn| nn.item as usize)
            .collect()
    }

    fn search_knn(&self, query: &[f64; 3], k: usize) -> Vec<usize> {
        let Some(k) = NonZeroUsize::new(k) else {
            return Vec::new();
        };
        self.kdtree
            .nearest_n::<SquaredEuclidean>(query, k)
            .iter()
            .map(|nn| nn.item as usize)
            .collect()
    }
}

impl std::fmt::Debug for KdTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTreeIndex")
            .field("num_points", &self.num_points)
            .finish()
    }
}

/// Build a KD-tree index over the target points.
///
/// # Errors
///
/// Fails if `target_points` is empty.
pub fn build_index(target_points: &[[f64; 3]]) -> Result<KdTreeIndex, SpatialError> {
    KdTreeIndex::build(target_points)
}

/// Find all correspondences between a transformed source and an indexed target.
///
/// Every source point is transformed by `transform` (the source slice itself is
/// not modified) and matched against all target points strictly closer than
/// `radius`.
///
/// # Arguments
///
/// * `index` - Spatial index built over the target points.
/// * `source_points` - The source points.
/// * `transform` - Transformation applied to the source before matching.
/// * `radius` - Search radius.
/// * `k_cap` - If given, keep at most this many matches per source point. The
///   index returns neighbors nearest first, so the nearest ones are kept.
///
/// # Returns
///
/// The `(source_index, target_index)` pairs, ordered by source index and then by
/// distance. Source points without neighbors contribute no pair.
pub fn query_matches<I: SpatialIndex + ?Sized>(
    index: &I,
    source_points: &[[f64; 3]],
    transform: &Pose,
    radius: f64,
    k_cap: Option<usize>,
) -> Result<Vec<Correspondence>, SpatialError> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(SpatialError::InvalidRadius(radius));
    }

    let transformed = transform.transform_points(source_points);

    // the indexed collect keeps the source order
    let matches = transformed
        .par_iter()
        .enumerate()
        .map(|(i, point)| {
            let mut neighbors = index.search_radius(point, radius);
            if let Some(k) = k_cap {
                neighbors.truncate(k);
            }
            neighbors.into_iter().map(|j| (i, j)).collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let matches = matches.into_iter().flatten().collect::<Vec<_>>();
    log::debug!(
        "Found {} correspondences for {} source points",
        matches.len(),
        source_points.len()
    );

    Ok(matches)
}
