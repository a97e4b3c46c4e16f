use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use crate::error::SceneError;

/// File extension of packed scene archives.
pub const ARCHIVE_EXTENSION: &str = "bin";

/// The point clouds, poses and valid pairs of a scene stored in a single file.
///
/// `names`, `points` and `poses` are parallel, entry `i` describes frame `i`.
/// Poses are row-major 4x4 homogeneous matrices.
#[derive(Debug, Clone, Default, PartialEq, bincode::Encode, bincode::Decode)]
pub struct PackedScene {
    /// Frame names.
    pub names: Vec<String>,
    /// Points of each frame.
    pub points: Vec<Vec<[f64; 3]>>,
    /// Pose of each frame.
    pub poses: Vec<[[f64; 4]; 4]>,
    /// Pairs of frame indices known to overlap.
    pub pairs: Vec<[usize; 2]>,
}

impl PackedScene {
    /// Number of frames.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the scene holds no frames.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check that the parallel fields agree and that every pair is in range.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.points.len() != self.names.len() {
            return Err(SceneError::CountMismatch {
                left_kind: "name",
                left: self.names.len(),
                right_kind: "point set",
                right: self.points.len(),
            });
        }
        if self.poses.len() != self.names.len() {
            return Err(SceneError::CountMismatch {
                left_kind: "name",
                left: self.names.len(),
                right_kind: "pose",
                right: self.poses.len(),
            });
        }
        if let Some(pair) = self
            .pairs
            .iter()
            .find(|pair| pair.iter().any(|&i| i >= self.names.len()))
        {
            return Err(SceneError::InvalidArchive(format!(
                "pair {:?} is out of range for {} frames",
                pair,
                self.names.len()
            )));
        }
        Ok(())
    }

    /// Read a packed scene and validate it.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let packed: PackedScene =
            bincode::decode_from_std_read(&mut reader, bincode::config::standard())?;
        packed.validate()?;
        Ok(packed)
    }

    /// Validate and write the packed scene.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        self.validate()?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackedScene {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let mut shifted = identity;
        shifted[0][3] = 0.5;
        PackedScene {
            names: vec!["cloud_bin_0".to_string(), "cloud_bin_1".to_string()],
            points: vec![
                vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]],
                vec![[0.5, 0.0, 0.0]],
            ],
            poses: vec![identity, shifted],
            pairs: vec![[0, 1]],
        }
    }

    #[test]
    fn test_write_read_packed_scene() -> Result<(), SceneError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("scene.bin");

        let packed = sample();
        packed.write(&path)?;
        let read = PackedScene::read(&path)?;

        assert_eq!(read, packed);
        assert_eq!(read.len(), 2);
        Ok(())
    }

    #[test]
    fn test_validate() {
        let mut packed = sample();
        packed.pairs.push([1, 2]);
        assert!(matches!(
            packed.validate(),
            Err(SceneError::InvalidArchive(_))
        ));

        let mut packed = sample();
        packed.poses.pop();
        assert!(matches!(
            packed.validate(),
            Err(SceneError::CountMismatch {
                right_kind: "pose",
                ..
            })
        ));
    }

    #[test]
    fn test_read_garbage() -> Result<(), SceneError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("garbage.bin");
        std::fs::write(&path, [0xff; 3])?;
        assert!(PackedScene::read(&path).is_err());
        Ok(())
    }
}
