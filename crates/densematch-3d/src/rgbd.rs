use crate::camera::PinholeCamera;
use crate::normals::{NormalEstimator, NormalsError};
use crate::pointcloud::PointCloud;

/// Default divisor turning raw depth values into meters.
pub const DEFAULT_DEPTH_SCALE: f64 = 1000.0;

/// Default maximum depth in meters, farther pixels are discarded.
pub const DEFAULT_DEPTH_TRUNC: f64 = 1.0;

/// Default minimum number of points for a usable frame.
pub const DEFAULT_MIN_VALID_POINTS: usize = 100;

/// Error types for the RGB-D module.
#[derive(Debug, thiserror::Error)]
pub enum RgbdError {
    /// The color or depth buffer does not match the image size.
    #[error("Expected {expected} {buffer} pixels but got {actual}")]
    SizeMismatch {
        /// Either `color` or `depth`.
        buffer: &'static str,
        /// width * height.
        expected: usize,
        /// Length of the given buffer.
        actual: usize,
    },

    /// The depth scale must be finite and strictly positive.
    #[error("Invalid depth scale: {0}")]
    InvalidDepthScale(f64),

    /// The camera does not have the size of the image.
    #[error("Camera is {camera_width}x{camera_height} but the image is {width}x{height}")]
    CameraMismatch {
        /// Camera width.
        camera_width: usize,
        /// Camera height.
        camera_height: usize,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },

    /// Normal estimation failed.
    #[error(transparent)]
    Normals(#[from] NormalsError),
}

/// A color image registered with a depth image of the same size.
#[derive(Debug, Clone)]
pub struct RgbdImage {
    width: usize,
    height: usize,
    color: Vec<[u8; 3]>,
    depth: Vec<u16>,
    depth_scale: f64,
    depth_trunc: f64,
}

impl RgbdImage {
    /// Creates a new RGB-D image from row-major color and raw depth buffers.
    ///
    /// # Arguments
    ///
    /// * `width` - The image width.
    /// * `height` - The image height.
    /// * `color` - The RGB pixels.
    /// * `depth` - The raw depth values, 0 means no measurement.
    /// * `depth_scale` - Divisor turning raw depth into meters.
    /// * `depth_trunc` - Depths beyond this value in meters are discarded.
    pub fn new(
        width: usize,
        height: usize,
        color: Vec<[u8; 3]>,
        depth: Vec<u16>,
        depth_scale: f64,
        depth_trunc: f64,
    ) -> Result<Self, RgbdError> {
        let expected = width * height;
        if color.len() != expected {
            return Err(RgbdError::SizeMismatch {
                buffer: "color",
                expected,
                actual: color.len(),
            });
        }
        if depth.len() != expected {
            return Err(RgbdError::SizeMismatch {
                buffer: "depth",
                expected,
                actual: depth.len(),
            });
        }
        if !depth_scale.is_finite() || depth_scale <= 0.0 {
            return Err(RgbdError::InvalidDepthScale(depth_scale));
        }

        Ok(Self {
            width,
            height,
            color,
            depth,
            depth_scale,
            depth_trunc,
        })
    }

    /// Returns the dimensions of the image as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The raw depth divisor.
    pub fn depth_scale(&self) -> f64 {
        self.depth_scale
    }

    /// The maximum depth in meters.
    pub fn depth_trunc(&self) -> f64 {
        self.depth_trunc
    }

    /// Get the color value at a specific pixel.
    #[inline]
    pub fn color(&self, x: usize, y: usize) -> [u8; 3] {
        self.color[y * self.width + x]
    }

    /// Get the raw depth value at a specific pixel.
    #[inline]
    pub fn raw_depth(&self, x: usize, y: usize) -> u16 {
        self.depth[y * self.width + x]
    }

    /// Get the depth in meters at a specific pixel, 0 when missing or truncated.
    #[inline]
    pub fn depth_meters(&self, x: usize, y: usize) -> f64 {
        let z = self.raw_depth(x, y) as f64 / self.depth_scale;
        if z > self.depth_trunc {
            0.0
        } else {
            z
        }
    }
}

/// Back-project every pixel with a valid depth into a colored point cloud.
///
/// Points are expressed in the camera frame and follow the row-major pixel
/// order.
///
/// # Errors
///
/// Fails if the camera size differs from the image size.
pub fn pointcloud_from_rgbd(
    rgbd: &RgbdImage,
    camera: &PinholeCamera,
) -> Result<PointCloud, RgbdError> {
    let (width, height) = rgbd.dimensions();
    if camera.width != width || camera.height != height {
        return Err(RgbdError::CameraMismatch {
            camera_width: camera.width,
            camera_height: camera.height,
            width,
            height,
        });
    }

    let mut points = Vec::new();
    let mut colors = Vec::new();
    for v in 0..height {
        for u in 0..width {
            let z = rgbd.depth_meters(u, v);
            if z <= 0.0 {
                continue;
            }
            points.push(camera.unproject(u as f64, v as f64, z));
            colors.push(rgbd.color(u, v));
        }
    }

    Ok(PointCloud::new_unchecked(points, Some(colors), None))
}

/// Back-project an RGB-D image, rejecting frames with too few valid points.
///
/// Returns `Ok(None)` and logs a warning when the cloud has `min_valid_points`
/// points or fewer. Normals are attached when an estimator is given.
pub fn create_pointcloud_from_rgbd(
    rgbd: &RgbdImage,
    camera: &PinholeCamera,
    estimator: Option<&dyn NormalEstimator>,
    min_valid_points: usize,
) -> Result<Option<PointCloud>, RgbdError> {
    let cloud = pointcloud_from_rgbd(rgbd, camera)?;
    if cloud.len() <= min_valid_points {
        log::warn!(
            "Point cloud has {} valid points, more than {} are required",
            cloud.len(),
            min_valid_points
        );
        return Ok(None);
    }

    let Some(estimator) = estimator else {
        return Ok(Some(cloud));
    };

    let (points, colors, _) = cloud.into_parts();
    let normals = estimator.estimate(&points)?;
    Ok(Some(PointCloud::new_unchecked(points, colors, Some(normals))))
}
