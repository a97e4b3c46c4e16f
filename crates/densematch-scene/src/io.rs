use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use densematch_3d::pose::Pose;

use crate::error::SceneError;

/// Key of the image width in the camera parameters file.
pub const CAMERA_WIDTH: &str = "Camera_Width";

/// Key of the image height in the camera parameters file.
pub const CAMERA_HEIGHT: &str = "Camera_Height";

/// Key of the depth scale in the camera parameters file.
pub const DEPTH_SHIFT: &str = "Depth_Shift";

/// Key/value camera parameters, one `key value` pair per line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraParams {
    values: HashMap<String, String>,
}

impl CameraParams {
    /// Get the raw value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether the parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Parse a parameter into `T`.
    ///
    /// # Errors
    ///
    /// Fails if the parameter is missing or cannot be parsed.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<T, SceneError>
    where
        T::Err: std::fmt::Display,
    {
        let value = self
            .get(key)
            .ok_or_else(|| SceneError::MissingCameraParam(key.to_string()))?;
        parse_part(value)
    }

    /// Image width in pixels.
    pub fn width(&self) -> Result<usize, SceneError> {
        self.parse(CAMERA_WIDTH)
    }

    /// Image height in pixels.
    pub fn height(&self) -> Result<usize, SceneError> {
        self.parse(CAMERA_HEIGHT)
    }

    /// Divisor turning raw depth values into meters.
    pub fn depth_shift(&self) -> Result<f64, SceneError> {
        self.parse(DEPTH_SHIFT)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read a camera parameters file.
///
/// Each non-empty line holds exactly a key and a value separated by whitespace.
///
/// # Arguments
///
/// * `path` - The path to the parameters file, usually `params.txt`.
pub fn read_camera_params(path: impl AsRef<Path>) -> Result<CameraParams, SceneError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut values = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let parts = line.split_whitespace().collect::<Vec<_>>();
        match parts.as_slice() {
            [] => continue,
            [key, value] => {
                values.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(SceneError::ParseError(format!(
                    "Expected `key value`, got: {line}"
                )))
            }
        }
    }

    Ok(CameraParams { values })
}

/// Read a camera matrix file and return `(fx, fy, cx, cy)`.
///
/// The file holds a whitespace separated 3x3 (or 4x4) matrix, the values are
/// `K[0][0]`, `K[1][1]`, `K[0][2]` and `K[1][2]`.
pub fn read_camera_intrinsics(path: impl AsRef<Path>) -> Result<(f64, f64, f64, f64), SceneError> {
    let k = read_matrix(path)?;
    if k.len() < 3 || k.iter().take(3).any(|row| row.len() < 3) {
        return Err(SceneError::ParseError(format!(
            "Camera matrix must be at least 3x3, got {} rows",
            k.len()
        )));
    }
    Ok((k[0][0], k[1][1], k[0][2], k[1][2]))
}

/// Read a whitespace separated 4x4 homogeneous pose matrix.
///
/// # Errors
///
/// Fails if the matrix is not 4x4 or not a rigid transform.
pub fn read_camera_pose(path: impl AsRef<Path>) -> Result<Pose, SceneError> {
    let rows = read_matrix(path)?;
    if rows.len() != 4 || rows.iter().any(|row| row.len() != 4) {
        return Err(SceneError::ParseError(
            "Camera pose must be a 4x4 matrix".to_string(),
        ));
    }

    let mut matrix = [[0.0; 4]; 4];
    for (dst, src) in matrix.iter_mut().zip(rows.iter()) {
        dst.copy_from_slice(src);
    }

    Ok(Pose::from_matrix(&matrix)?)
}

/// Read the non-empty lines of a file as rows of floats.
fn read_matrix(path: impl AsRef<Path>) -> Result<Vec<Vec<f64>>, SceneError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(parse_part::<f64>)
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    Ok(rows)
}

/// Utility function for parsing values of text files
fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, SceneError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| SceneError::ParseError(format!("{}: {}", s, e)))
}
