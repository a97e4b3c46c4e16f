use std::collections::HashMap;

use crate::pointcloud::PointCloud;

/// Error types for the voxel grid module.
#[derive(Debug, thiserror::Error)]
pub enum VoxelGridError {
    /// The voxel size must be finite and strictly positive.
    #[error("Voxel size must be positive and finite, got {0}")]
    InvalidVoxelSize(f64),
}

/// Running sums of the points falling into one voxel.
#[derive(Debug, Default)]
struct VoxelAccumulator {
    point_sum: [f64; 3],
    color_sum: [u64; 3],
    normal_sum: [f64; 3],
    count: usize,
}

/// A uniform 3D voxel grid for downsampling point clouds.
///
/// The grid is anchored at the minimum bound of the input cloud shifted by half
/// a voxel, so the first point lies in the middle of its cell.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    voxel_size: f64,
}

impl VoxelGrid {
    /// Creates a new `VoxelGrid` with the given cubic voxel size.
    ///
    /// # Errors
    ///
    /// Fails if `voxel_size` is not finite or not strictly positive.
    pub fn new(voxel_size: f64) -> Result<Self, VoxelGridError> {
        if !voxel_size.is_finite() || voxel_size <= 0.0 {
            return Err(VoxelGridError::InvalidVoxelSize(voxel_size));
        }
        Ok(Self { voxel_size })
    }

    /// The edge length of a voxel.
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Replace the points falling in each voxel by their centroid.
    ///
    /// Colors are averaged, normals are averaged and normalized again. Output
    /// voxels follow the order in which they are first hit by the input points.
    /// Points with a non-finite coordinate are dropped.
    pub fn downsample(&self, point_cloud: &PointCloud) -> PointCloud {
        let is_finite = |p: &[f64; 3]| p.iter().all(|v| v.is_finite());
        let Some(min_bound) = point_cloud
            .points()
            .iter()
            .filter(|p| is_finite(p))
            .copied()
            .reduce(|acc, p| [acc[0].min(p[0]), acc[1].min(p[1]), acc[2].min(p[2])])
        else {
            return PointCloud::default();
        };
        let half = self.voxel_size * 0.5;
        let anchor = [min_bound[0] - half, min_bound[1] - half, min_bound[2] - half];

        let mut lookup: HashMap<[i64; 3], usize> = HashMap::new();
        let mut voxels: Vec<VoxelAccumulator> = Vec::new();

        // group points into voxels
        for (i, point) in point_cloud.points().iter().enumerate() {
            if !is_finite(point) {
                continue;
            }
            let key = self.compute_voxel_index(point, &anchor);
            let slot = *lookup.entry(key).or_insert_with(|| {
                voxels.push(VoxelAccumulator::default());
                voxels.len() - 1
            });
            let voxel = &mut voxels[slot];

            for (s, v) in voxel.point_sum.iter_mut().zip(point.iter()) {
                *s += v;
            }
            if let Some(color) = point_cloud.colors().and_then(|c| c.get(i)) {
                for (s, v) in voxel.color_sum.iter_mut().zip(color.iter()) {
                    *s += *v as u64;
                }
            }
            if let Some(normal) = point_cloud.normals().and_then(|n| n.get(i)) {
                for (s, v) in voxel.normal_sum.iter_mut().zip(normal.iter()) {
                    *s += v;
                }
            }
            voxel.count += 1;
        }

        // compute centroids for each voxel
        let points = voxels
            .iter()
            .map(|v| {
                let inv_count = 1.0 / v.count as f64;
                [
                    v.point_sum[0] * inv_count,
                    v.point_sum[1] * inv_count,
                    v.point_sum[2] * inv_count,
                ]
            })
            .collect::<Vec<_>>();

        let colors = point_cloud.colors().map(|_| {
            voxels
                .iter()
                .map(|v| {
                    let inv_count = 1.0 / v.count as f64;
                    [
                        (v.color_sum[0] as f64 * inv_count).round() as u8,
                        (v.color_sum[1] as f64 * inv_count).round() as u8,
                        (v.color_sum[2] as f64 * inv_count).round() as u8,
                    ]
                })
                .collect::<Vec<_>>()
        });

        let normals = point_cloud.normals().map(|_| {
            voxels
                .iter()
                .map(|v| {
                    let n = v.normal_sum;
                    let norm = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
                    if norm > 0.0 {
                        [n[0] / norm, n[1] / norm, n[2] / norm]
                    } else {
                        n
                    }
                })
                .collect::<Vec<_>>()
        });

        // one entry per voxel for every attribute
        PointCloud::new_unchecked(points, colors, normals)
    }

    /// Computes the voxel index of a point for the grid anchored at `anchor`.
    fn compute_voxel_index(&self, point: &[f64; 3], anchor: &[f64; 3]) -> [i64; 3] {
        [
            ((point[0] - anchor[0]) / self.voxel_size).floor() as i64,
            ((point[1] - anchor[1]) / self.voxel_size).floor() as i64,
            ((point[2] - anchor[2]) / self.voxel_size).floor() as i64,
        ]
    }
}

/// Downsample a point cloud with a voxel grid of the given size.
///
/// Example:
///
/// ```
/// use densematch_3d::pointcloud::PointCloud;
/// use densematch_3d::voxel_grid::voxel_down_sample;
///
/// let cloud = PointCloud::from_points(vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0], [5.0, 5.0, 5.0]]);
/// let down = voxel_down_sample(&cloud, 1.0).unwrap();
/// assert_eq!(down.len(), 2);
/// ```
pub fn voxel_down_sample(
    point_cloud: &PointCloud,
    voxel_size: f64,
) -> Result<PointCloud, VoxelGridError> {
    Ok(VoxelGrid::new(voxel_size)?.downsample(point_cloud))
}
