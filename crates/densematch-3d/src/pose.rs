use glam::{DMat3, DVec3};

/// Tolerance used to accept a rotation block as orthonormal.
const ORTHONORMAL_TOLERANCE: f64 = 1e-4;

/// Tolerance on the homogeneous bottom row of a pose matrix.
const BOTTOM_ROW_TOLERANCE: f64 = 1e-6;

/// Clipping margin for the arccos argument in [`rotation_distance`].
const ROTATION_DISTANCE_EPS: f64 = 1e-16;

/// Error types for the pose module.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    /// The matrix holds NaN or infinite values.
    #[error("Pose contains non-finite values")]
    NonFinite,

    /// The rotation block does not satisfy `R^T R = I`.
    #[error("Rotation is not orthonormal, max deviation from identity: {0}")]
    NotOrthonormal(f64),

    /// The rotation block has a negative determinant.
    #[error("Rotation is a reflection, determinant: {0}")]
    Reflection(f64),

    /// The homogeneous bottom row is not `[0, 0, 0, 1]`.
    #[error("Pose bottom row must be [0, 0, 0, 1], got {0:?}")]
    InvalidBottomRow([f64; 4]),

    /// The rotation axis has zero length.
    #[error("Cannot compute rotation from a zero axis")]
    ZeroAxis,
}

/// A rigid transformation made of a rotation and a translation.
///
/// Applied to a point `p` it produces `R * p + t`. Poses are immutable values,
/// composing or inverting returns a new pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    rotation: DMat3,
    translation: DVec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a pose from a row-major rotation matrix and a translation vector.
    ///
    /// # Errors
    ///
    /// Fails if any value is not finite or the rotation is not a proper rotation.
    pub fn new(rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> Result<Self, PoseError> {
        if rotation.iter().flatten().chain(translation).any(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite);
        }

        let rotation = DMat3::from_cols(
            DVec3::new(rotation[0][0], rotation[1][0], rotation[2][0]),
            DVec3::new(rotation[0][1], rotation[1][1], rotation[2][1]),
            DVec3::new(rotation[0][2], rotation[1][2], rotation[2][2]),
        );

        // R^T R = I
        let deviation = (rotation.transpose() * rotation - DMat3::IDENTITY)
            .to_cols_array()
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        if deviation > ORTHONORMAL_TOLERANCE {
            return Err(PoseError::NotOrthonormal(deviation));
        }

        let det = rotation.determinant();
        if det < 0.0 {
            return Err(PoseError::Reflection(det));
        }

        Ok(Self {
            rotation,
            translation: DVec3::from_array(*translation),
        })
    }

    /// Create a pose from a row-major 4x4 homogeneous matrix `[[R, t], [0, 1]]`.
    pub fn from_matrix(matrix: &[[f64; 4]; 4]) -> Result<Self, PoseError> {
        let bottom = matrix[3];
        if bottom.iter().any(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite);
        }
        let expected = [0.0, 0.0, 0.0, 1.0];
        if bottom
            .iter()
            .zip(expected.iter())
            .any(|(v, e)| (v - e).abs() > BOTTOM_ROW_TOLERANCE)
        {
            return Err(PoseError::InvalidBottomRow(bottom));
        }

        let rotation = [
            [matrix[0][0], matrix[0][1], matrix[0][2]],
            [matrix[1][0], matrix[1][1], matrix[1][2]],
            [matrix[2][0], matrix[2][1], matrix[2][2]],
        ];
        let translation = [matrix[0][3], matrix[1][3], matrix[2][3]];
        Self::new(&rotation, &translation)
    }

    /// Create a pure translation.
    pub fn from_translation(translation: &[f64; 3]) -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation: DVec3::from_array(*translation),
        }
    }

    /// Create a pose from a rotation axis (any length but zero), an angle in radians
    /// and a translation.
    pub fn from_axis_angle(
        axis: &[f64; 3],
        angle: f64,
        translation: &[f64; 3],
    ) -> Result<Self, PoseError> {
        let axis = DVec3::from_array(*axis);
        if axis.length() < 1e-10 {
            return Err(PoseError::ZeroAxis);
        }
        Ok(Self {
            rotation: DMat3::from_axis_angle(axis.normalize(), angle),
            translation: DVec3::from_array(*translation),
        })
    }

    /// The row-major 4x4 homogeneous matrix of the pose.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        let r = self.rotation();
        let t = self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t.x],
            [r[1][0], r[1][1], r[1][2], t.y],
            [r[2][0], r[2][1], r[2][2], t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// The row-major rotation block.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        [
            self.rotation.row(0).to_array(),
            self.rotation.row(1).to_array(),
            self.rotation.row(2).to_array(),
        ]
    }

    /// The translation block.
    pub fn translation(&self) -> [f64; 3] {
        self.translation.to_array()
    }

    /// The inverse transformation: `[R^T, -R^T t]`.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Compose two poses: the result applies `other` first, then `self`.
    pub fn compose(&self, other: &Pose) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Apply the pose to a point.
    #[inline]
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*point) + self.translation).to_array()
    }

    /// Apply the pose to a set of points, returning the transformed copy.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// Apply only the rotation to a vector.
    #[inline]
    pub fn rotate_vector(&self, vector: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*vector)).to_array()
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Self::Output {
        self.compose(&rhs)
    }
}

/// Geodesic distance in degrees between two row-major rotation matrices.
///
/// Computes `arccos((trace(R_src^T R_tgt) - 1) / 2)` with the argument clipped
/// to `[-1 + 1e-16, 1 - 1e-16]`. The result lies in `[0, 180]`.
///
/// Example:
///
/// ```
/// use densematch_3d::pose::rotation_distance;
///
/// let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let flip_z = [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
/// assert!((rotation_distance(&identity, &flip_z) - 180.0).abs() < 1e-6);
/// ```
pub fn rotation_distance(source_rot: &[[f64; 3]; 3], target_rot: &[[f64; 3]; 3]) -> f64 {
    // trace(A^T B) is the sum of the element-wise products
    let trace = source_rot
        .iter()
        .flatten()
        .zip(target_rot.iter().flatten())
        .map(|(a, b)| a * b)
        .sum::<f64>();

    let cos_angle = ((trace - 1.0) / 2.0).clamp(
        -1.0 + ROTATION_DISTANCE_EPS,
        1.0 - ROTATION_DISTANCE_EPS,
    );
    cos_angle.acos().to_degrees()
}

/// Euclidean distance between two translation vectors.
pub fn translation_distance(source_transl: &[f64; 3], target_transl: &[f64; 3]) -> f64 {
    (DVec3::from_array(*source_transl) - DVec3::from_array(*target_transl)).length()
}

/// Rotation distance in degrees and translation distance between two poses.
///
/// The two errors are reported separately and never fused into a single score.
pub fn transform_distance(source: &Pose, target: &Pose) -> (f64, f64) {
    let rot_dist = rotation_distance(&source.rotation(), &target.rotation());
    let transl_dist = translation_distance(&source.translation(), &target.translation());
    (rot_dist, transl_dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn random_pose(rng: &mut impl Rng) -> Result<Pose, PoseError> {
        let axis = [
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0) + 2.0,
        ];
        let angle = rng.random_range(-std::f64::consts::PI..std::f64::consts::PI);
        let translation = [
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
        ];
        Pose::from_axis_angle(&axis, angle, &translation)
    }

    #[test]
    fn test_rotation_distance_identical() -> Result<(), PoseError> {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let r = random_pose(&mut rng)?.rotation();
            assert_relative_eq!(rotation_distance(&r, &r), 0.0, epsilon = 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_rotation_distance_symmetric_and_bounded() -> Result<(), PoseError> {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let r1 = random_pose(&mut rng)?.rotation();
            let r2 = random_pose(&mut rng)?.rotation();
            let d12 = rotation_distance(&r1, &r2);
            let d21 = rotation_distance(&r2, &r1);
            assert_relative_eq!(d12, d21, epsilon = 1e-9);
            assert!((0.0..=180.0).contains(&d12));
        }
        Ok(())
    }

    #[test]
    fn test_rotation_distance_known_angle() -> Result<(), PoseError> {
        let r1 = Pose::from_axis_angle(&[0.0, 1.0, 0.0], 0.0, &[0.0; 3])?;
        let r2 = Pose::from_axis_angle(&[0.0, 1.0, 0.0], 30f64.to_radians(), &[0.0; 3])?;
        assert_relative_eq!(
            rotation_distance(&r1.rotation(), &r2.rotation()),
            30.0,
            epsilon = 1e-6
        );
        Ok(())
    }

    #[test]
    fn test_translation_distance() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 6.0, 3.0];
        let c = [-2.0, 0.5, 7.0];
        assert_eq!(translation_distance(&a, &a), 0.0);
        assert_relative_eq!(translation_distance(&a, &b), 5.0);
        assert_relative_eq!(translation_distance(&a, &b), translation_distance(&b, &a));
        assert!(
            translation_distance(&a, &c)
                <= translation_distance(&a, &b) + translation_distance(&b, &c) + 1e-12
        );
    }

    #[test]
    fn test_transform_distance() -> Result<(), PoseError> {
        let source = Pose::from_axis_angle(&[1.0, 0.0, 0.0], 0.0, &[0.0, 0.0, 0.0])?;
        let target =
            Pose::from_axis_angle(&[1.0, 0.0, 0.0], 90f64.to_radians(), &[0.0, 3.0, 4.0])?;
        let (rot_dist, transl_dist) = transform_distance(&source, &target);
        assert_relative_eq!(rot_dist, 90.0, epsilon = 1e-6);
        assert_relative_eq!(transl_dist, 5.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_pose_inverse_compose() -> Result<(), PoseError> {
        let mut rng = rand::rng();
        let pose = random_pose(&mut rng)?;
        let identity = pose * pose.inverse();
        let (rot_dist, transl_dist) = transform_distance(&identity, &Pose::IDENTITY);
        assert!(rot_dist < 1e-5);
        assert!(transl_dist < 1e-9);

        let p = [0.3, -1.2, 2.5];
        let back = pose.inverse().transform_point(&pose.transform_point(&p));
        for i in 0..3 {
            assert_relative_eq!(back[i], p[i], epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_pose_matrix_roundtrip() -> Result<(), PoseError> {
        let matrix = [
            [0.0, -1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 2.0],
            [0.0, 0.0, 1.0, 3.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let pose = Pose::from_matrix(&matrix)?;
        assert_eq!(pose.to_matrix(), matrix);
        assert_eq!(pose.translation(), [1.0, 2.0, 3.0]);
        assert_eq!(pose.transform_point(&[1.0, 0.0, 0.0]), [1.0, 3.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_pose_from_matrix_invalid() {
        let scaled = [
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(matches!(
            Pose::from_matrix(&scaled),
            Err(PoseError::NotOrthonormal(_))
        ));

        let reflection = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(matches!(
            Pose::from_matrix(&reflection),
            Err(PoseError::Reflection(_))
        ));

        let mut invalid = [[f64::NEG_INFINITY; 4]; 4];
        invalid[3] = [0.0, 0.0, 0.0, 1.0];
        assert!(matches!(
            Pose::from_matrix(&invalid),
            Err(PoseError::NonFinite)
        ));

        let mut bad_row = scaled;
        bad_row[3] = [0.0, 0.0, 1.0, 1.0];
        assert!(matches!(
            Pose::from_matrix(&bad_row),
            Err(PoseError::InvalidBottomRow(_))
        ));
    }
}
