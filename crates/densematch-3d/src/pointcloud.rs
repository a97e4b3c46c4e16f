use crate::pose::Pose;

/// Error types for the point cloud module.
#[derive(Debug, thiserror::Error)]
pub enum PointCloudError {
    /// A per-point attribute does not have one entry per point.
    #[error("Point cloud {attribute} has {actual} entries but there are {expected} points")]
    LengthMismatch {
        /// Name of the attribute, e.g. `normals`.
        attribute: &'static str,
        /// Number of points in the cloud.
        expected: usize,
        /// Number of attribute entries given.
        actual: usize,
    },
}

/// A point cloud with points, colors, and normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    ///
    /// # Errors
    ///
    /// Returns an error if colors or normals are given with a length different
    /// from the number of points.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, PointCloudError> {
        if let Some(colors) = &colors {
            check_len("colors", points.len(), colors.len())?;
        }
        if let Some(normals) = &normals {
            check_len("normals", points.len(), normals.len())?;
        }
        Ok(Self {
            points,
            colors,
            normals,
        })
    }

    /// Create a point cloud whose attribute lengths are known to match.
    pub(crate) fn new_unchecked(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        debug_assert!(colors.as_ref().map_or(true, |c| c.len() == points.len()));
        debug_assert!(normals.as_ref().map_or(true, |n| n.len() == points.len()));
        Self {
            points,
            colors,
            normals,
        }
    }

    /// Create a point cloud holding only points.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        Self {
            points,
            colors: None,
            normals: None,
        }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Replace the normals of the point cloud.
    pub fn set_normals(&mut self, normals: Vec<[f64; 3]>) -> Result<(), PointCloudError> {
        check_len("normals", self.points.len(), normals.len())?;
        self.normals = Some(normals);
        Ok(())
    }

    /// Replace the colors of the point cloud.
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) -> Result<(), PointCloudError> {
        check_len("colors", self.points.len(), colors.len())?;
        self.colors = Some(colors);
        Ok(())
    }

    /// Consume the point cloud and return its points, colors and normals.
    pub fn into_parts(self) -> (Vec<[f64; 3]>, Option<Vec<[u8; 3]>>, Option<Vec<[f64; 3]>>) {
        (self.points, self.colors, self.normals)
    }

    /// Return a transformed copy of the point cloud.
    ///
    /// Points are rotated and translated, normals are only rotated, colors are copied.
    pub fn transform(&self, pose: &Pose) -> Self {
        Self {
            points: pose.transform_points(&self.points),
            colors: self.colors.clone(),
            normals: self
                .normals
                .as_ref()
                .map(|normals| normals.iter().map(|n| pose.rotate_vector(n)).collect()),
        }
    }

    /// Get the minimum bound of the point cloud, or `None` if it is empty.
    pub fn get_min_bound(&self) -> Option<[f64; 3]> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold(first, |acc, p| {
            [acc[0].min(p[0]), acc[1].min(p[1]), acc[2].min(p[2])]
        }))
    }

    /// Get the maximum bound of the point cloud, or `None` if it is empty.
    pub fn get_max_bound(&self) -> Option<[f64; 3]> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold(first, |acc, p| {
            [acc[0].max(p[0]), acc[1].max(p[1]), acc[2].max(p[2])]
        }))
    }
}

fn check_len(
    attribute: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), PointCloudError> {
    if expected != actual {
        return Err(PointCloudError::LengthMismatch {
            attribute,
            expected,
            actual,
        });
    }
    Ok(())
}
