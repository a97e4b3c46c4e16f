use densematch_3d::pointcloud::PointCloudError;
use densematch_3d::pose::PoseError;
use densematch_3d::rgbd::RgbdError;

/// An error type for the scene crate.
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// Error reading or writing a file
    #[error("error reading or writing file")]
    Io(#[from] std::io::Error),

    /// A text file could not be parsed
    #[error("Parse error {0}")]
    ParseError(String),

    /// Two file sets of a scene do not have the same number of entries
    #[error("Found {left} {left_kind} files but {right} {right_kind} files")]
    CountMismatch {
        /// Kind of the first file set, e.g. `color`.
        left_kind: &'static str,
        /// Number of files of the first kind.
        left: usize,
        /// Kind of the second file set, e.g. `depth`.
        right_kind: &'static str,
        /// Number of files of the second kind.
        right: usize,
    },

    /// Files that should describe the same frame have different names
    #[error("Bad sort for files, expected frame {expected} but got {actual}")]
    NameMismatch {
        /// Name taken from the color file.
        expected: String,
        /// Name of the mismatching file.
        actual: String,
    },

    /// A required camera parameter is missing
    #[error("Missing camera parameter {0}")]
    MissingCameraParam(String),

    /// A pose matrix is not a rigid transform
    #[error(transparent)]
    InvalidPose(#[from] PoseError),

    /// An RGB-D image could not be created or back-projected
    #[error(transparent)]
    Rgbd(#[from] RgbdError),

    /// A point cloud could not be created
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),

    /// A color or depth image could not be decoded
    #[error("Failed to decode image {0}")]
    ImageDecode(String),

    /// The packed scene is inconsistent
    #[error("Invalid packed scene: {0}")]
    InvalidArchive(String),

    /// The packed scene could not be encoded
    #[error("Failed to encode packed scene")]
    Encode(#[from] bincode::error::EncodeError),

    /// The packed scene could not be decoded
    #[error("Failed to decode packed scene")]
    Decode(#[from] bincode::error::DecodeError),
}
