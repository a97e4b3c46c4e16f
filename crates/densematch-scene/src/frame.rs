use std::fmt;

use densematch_3d::pointcloud::PointCloud;
use densematch_3d::pose::Pose;
use densematch_3d::rgbd::RgbdImage;

/// A single capture of a scene.
///
/// A frame loaded from RGB-D data holds the image and, on request, the point
/// cloud extracted from it. A frame loaded from a packed scene only holds the
/// point cloud. The pose places the frame in the scene reference frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Name of the frame, usually a numerical id taken from the file name.
    pub name: String,
    /// The RGB-D image of the frame.
    pub rgbd: Option<RgbdImage>,
    /// The point cloud of the frame, in the camera frame.
    pub pointcloud: Option<PointCloud>,
    /// The camera pose.
    pub pose: Pose,
}

impl Frame {
    /// Create a frame with the identity pose and no data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rgbd: None,
            pointcloud: None,
            pose: Pose::IDENTITY,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame: {}", self.name)?;
        if let Some(rgbd) = &self.rgbd {
            let (width, height) = rgbd.dimensions();
            writeln!(f, "RGBD: {width}x{height}")?;
        }
        if let Some(pointcloud) = &self.pointcloud {
            writeln!(f, "Point cloud: {} points", pointcloud.len())?;
        }
        writeln!(f, "Pose:")?;
        for row in self.pose.to_matrix() {
            writeln!(
                f,
                "[{:>10.6} {:>10.6} {:>10.6} {:>10.6}]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        Ok(())
    }
}
