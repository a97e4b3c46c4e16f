use crate::pointcloud::PointCloud;
use crate::pose::Pose;
use crate::spatial::{build_index, query_matches, SpatialError};
use crate::voxel_grid::{VoxelGrid, VoxelGridError};

/// Error types for the overlap module.
#[derive(Debug, thiserror::Error)]
pub enum OverlapError {
    /// The voxel size is not usable for downsampling.
    #[error(transparent)]
    VoxelGrid(#[from] VoxelGridError),

    /// Correspondence search failed.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// One of the clouds has no points left after downsampling.
    #[error("Point cloud {which} is empty after downsampling")]
    EmptyPointCloud {
        /// 0 for the first cloud, 1 for the second.
        which: usize,
    },
}

/// Overlap of two point clouds in both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEstimate {
    /// Fraction of downsampled points of the first cloud with a match in the second.
    pub overlap0: f64,
    /// Fraction of downsampled points of the second cloud with a match in the first.
    pub overlap1: f64,
    /// Number of points of the first cloud after downsampling.
    pub num_points0: usize,
    /// Number of points of the second cloud after downsampling.
    pub num_points1: usize,
}

impl OverlapEstimate {
    /// The larger of the two directional overlaps.
    pub fn ratio(&self) -> f64 {
        self.overlap0.max(self.overlap1)
    }
}

/// Estimate the overlap of two point clouds in both directions.
///
/// Both clouds are downsampled with a voxel grid of `voxel_size`, which is also
/// the matching radius. A downsampled point counts as overlapping when at least
/// one point of the other cloud lies within that radius.
///
/// # Arguments
///
/// * `cloud0` - The first point cloud.
/// * `cloud1` - The second point cloud.
/// * `transform` - Maps the frame of `cloud0` into the frame of `cloud1`.
/// * `voxel_size` - Voxel size and match radius.
///
/// # Errors
///
/// Fails on an invalid voxel size or if a downsampled cloud is empty.
pub fn estimate_overlap(
    cloud0: &PointCloud,
    cloud1: &PointCloud,
    transform: &Pose,
    voxel_size: f64,
) -> Result<OverlapEstimate, OverlapError> {
    let grid = VoxelGrid::new(voxel_size)?;
    let down0 = grid.downsample(cloud0);
    let down1 = grid.downsample(cloud1);

    if down0.is_empty() {
        return Err(OverlapError::EmptyPointCloud { which: 0 });
    }
    if down1.is_empty() {
        return Err(OverlapError::EmptyPointCloud { which: 1 });
    }

    let index0 = build_index(down0.points())?;
    let index1 = build_index(down1.points())?;

    // a single match is enough to mark a point as overlapping
    let matching01 = query_matches(&index1, down0.points(), transform, voxel_size, Some(1))?;
    let matching10 = query_matches(
        &index0,
        down1.points(),
        &transform.inverse(),
        voxel_size,
        Some(1),
    )?;

    let estimate = OverlapEstimate {
        overlap0: matching01.len() as f64 / down0.len() as f64,
        overlap1: matching10.len() as f64 / down1.len() as f64,
        num_points0: down0.len(),
        num_points1: down1.len(),
    };
    log::debug!(
        "Overlap {:.3} / {:.3} over {} / {} downsampled points",
        estimate.overlap0,
        estimate.overlap1,
        estimate.num_points0,
        estimate.num_points1
    );

    Ok(estimate)
}

/// Compute the overlap ratio of two point clouds, in `[0, 1]`.
///
/// This is the larger of the two directional overlaps of [`estimate_overlap`].
///
/// Example:
///
/// ```
/// use densematch_3d::overlap::overlap_ratio;
/// use densematch_3d::pointcloud::PointCloud;
/// use densematch_3d::pose::Pose;
///
/// let cloud = PointCloud::from_points(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
/// let ratio = overlap_ratio(&cloud, &cloud, &Pose::IDENTITY, 0.1).unwrap();
/// assert_eq!(ratio, 1.0);
/// ```
pub fn overlap_ratio(
    cloud0: &PointCloud,
    cloud1: &PointCloud,
    transform: &Pose,
    voxel_size: f64,
) -> Result<f64, OverlapError> {
    Ok(estimate_overlap(cloud0, cloud1, transform, voxel_size)?.ratio())
}
