/// Intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    /// The image width in pixels.
    pub width: usize,
    /// The image height in pixels.
    pub height: usize,
    /// The focal length along x in pixels.
    pub fx: f64,
    /// The focal length along y in pixels.
    pub fy: f64,
    /// The principal point x coordinate in pixels.
    pub cx: f64,
    /// The principal point y coordinate in pixels.
    pub cy: f64,
}

impl PinholeCamera {
    /// Creates a new camera from the image size, focal lengths and principal point.
    pub fn new(width: usize, height: usize, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
        }
    }

    /// Creates a camera from a row-major 3x3 camera matrix.
    ///
    /// Only `K[0][0]`, `K[1][1]`, `K[0][2]` and `K[1][2]` are read.
    pub fn from_matrix(width: usize, height: usize, k: &[[f64; 3]; 3]) -> Self {
        Self::new(width, height, k[0][0], k[1][1], k[0][2], k[1][2])
    }

    /// Returns the row-major 3x3 camera matrix.
    pub fn camera_matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Back-project pixel `(u, v)` at depth `z` into the camera frame.
    #[inline]
    pub fn unproject(&self, u: f64, v: f64, z: f64) -> [f64; 3] {
        [(u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z]
    }
}
