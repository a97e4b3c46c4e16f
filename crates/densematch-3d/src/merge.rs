use crate::normals::{
    orient_normals_towards_location, KnnNormalEstimator, NormalEstimator, NormalsError,
};
use crate::pointcloud::PointCloud;
use crate::pose::Pose;

/// Error types for the merge module.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Each point cloud needs exactly one pose.
    #[error("Got {clouds} point clouds but {poses} poses")]
    LengthMismatch {
        /// Number of point clouds.
        clouds: usize,
        /// Number of poses.
        poses: usize,
    },

    /// Normal estimation or orientation failed.
    #[error(transparent)]
    Normals(#[from] NormalsError),
}

/// Viewpoint the merged normals are oriented toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NormalOrientation {
    /// A fixed location in the merged frame, the origin by default.
    Location([f64; 3]),
    /// The camera center of each frame expressed in the merged frame.
    FrameCamera,
}

impl Default for NormalOrientation {
    fn default() -> Self {
        NormalOrientation::Location([0.0; 3])
    }
}

/// Parameters of [`merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    /// Normal estimator applied to every transformed frame.
    pub normal_estimator: KnnNormalEstimator,
    /// Viewpoint used to give the normals a consistent sign.
    pub orientation: NormalOrientation,
}

/// Merge per-frame point clouds into a single point cloud.
///
/// Each frame is mapped by the inverse of its pose, gets freshly estimated
/// normals oriented toward the configured viewpoint and is appended in input
/// order. Overlapping points are kept as separate entries. Colors are kept only
/// when every frame has them.
///
/// # Arguments
///
/// * `clouds` - The per-frame point clouds.
/// * `poses` - One pose per point cloud.
/// * `config` - Normal estimation and orientation settings.
///
/// # Errors
///
/// Fails if the number of clouds and poses differ.
pub fn merge(
    clouds: &[PointCloud],
    poses: &[Pose],
    config: &MergeConfig,
) -> Result<PointCloud, MergeError> {
    merge_with_estimator(clouds, poses, &config.normal_estimator, config.orientation)
}

/// Same as [`merge`] with a custom normal estimator.
pub fn merge_with_estimator(
    clouds: &[PointCloud],
    poses: &[Pose],
    estimator: &dyn NormalEstimator,
    orientation: NormalOrientation,
) -> Result<PointCloud, MergeError> {
    if clouds.len() != poses.len() {
        return Err(MergeError::LengthMismatch {
            clouds: clouds.len(),
            poses: poses.len(),
        });
    }

    let total = clouds.iter().map(|c| c.len()).sum::<usize>();
    let keep_colors = clouds.iter().all(|c| c.colors().is_some());

    let mut points = Vec::with_capacity(total);
    let mut normals = Vec::with_capacity(total);
    let mut colors = Vec::with_capacity(if keep_colors { total } else { 0 });

    for (cloud, pose) in clouds.iter().zip(poses.iter()) {
        if cloud.is_empty() {
            continue;
        }

        let frame_to_merged = pose.inverse();
        let frame_points = frame_to_merged.transform_points(cloud.points());

        let mut frame_normals = estimator.estimate(&frame_points)?;
        let viewpoint = match orientation {
            NormalOrientation::Location(location) => location,
            NormalOrientation::FrameCamera => frame_to_merged.translation(),
        };
        orient_normals_towards_location(&frame_points, &mut frame_normals, &viewpoint)?;

        points.extend(frame_points);
        normals.extend(frame_normals);
        if let Some(frame_colors) = cloud.colors().filter(|_| keep_colors) {
            colors.extend_from_slice(frame_colors);
        }
    }

    log::debug!(
        "Merged {} point clouds into {} points",
        clouds.len(),
        points.len()
    );

    let colors = keep_colors.then_some(colors);
    Ok(PointCloud::new_unchecked(points, colors, Some(normals)))
}
