use std::fmt;
use std::path::{Path, PathBuf};

use densematch_3d::camera::PinholeCamera;
use densematch_3d::normals::KnnNormalEstimator;
use densematch_3d::pointcloud::PointCloud;
use densematch_3d::pose::Pose;
use densematch_3d::rgbd::{create_pointcloud_from_rgbd, RgbdImage, DEFAULT_MIN_VALID_POINTS};

use crate::archive::{PackedScene, ARCHIVE_EXTENSION};
use crate::error::SceneError;
use crate::frame::Frame;
use crate::io::{
    read_camera_intrinsics, read_camera_params, read_camera_pose, CameraParams, CAMERA_HEIGHT,
    CAMERA_WIDTH, DEPTH_SHIFT,
};

/// Name of the camera parameters file inside an RGB-D scene directory.
pub const CAMERA_PARAMS_FILE: &str = "params.txt";

/// Name of the camera matrix file inside an RGB-D scene directory.
pub const CAMERA_INTRINSICS_FILE: &str = "intrinsicCamera.txt";

/// A named sequence of frames with the camera that captured them.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    name: String,
    frames: Vec<Frame>,
    camera: Option<PinholeCamera>,
    camera_params: Option<CameraParams>,
    valid_pairs: Vec<[usize; 2]>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The frames in loading order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Mutable access to the frames, e.g. to update poses after registration.
    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the scene has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Camera intrinsics, set by [`Scene::read_rgbd_scene`].
    pub fn camera(&self) -> Option<&PinholeCamera> {
        self.camera.as_ref()
    }

    /// Camera parameters, set by [`Scene::read_rgbd_scene`].
    pub fn camera_params(&self) -> Option<&CameraParams> {
        self.camera_params.as_ref()
    }

    /// Pairs of frame indices known to overlap, set by [`Scene::read_pcd_scene`].
    pub fn valid_pairs(&self) -> &[[usize; 2]] {
        &self.valid_pairs
    }

    /// The RGB-D image of every frame.
    pub fn all_rgbds(&self) -> Vec<Option<&RgbdImage>> {
        self.frames.iter().map(|f| f.rgbd.as_ref()).collect()
    }

    /// The point cloud of every frame.
    pub fn all_pointclouds(&self) -> Vec<Option<&PointCloud>> {
        self.frames.iter().map(|f| f.pointcloud.as_ref()).collect()
    }

    /// The pose of every frame.
    pub fn all_poses(&self) -> Vec<Pose> {
        self.frames.iter().map(|f| f.pose).collect()
    }

    /// Load the RGB-D frames of `<input_dir>/<name>/`.
    ///
    /// Frames are discovered from the `*.color.*`, `*.depth.*` and `*.pose.*`
    /// files, sorted by file name. Without pose files every pose is the
    /// identity. Image decoding is delegated to `decoder`, called with the color
    /// path, the depth path and the depth scale read from the camera parameters.
    ///
    /// # Arguments
    ///
    /// * `input_dir` - The directory holding one sub-directory per scene.
    /// * `extract_pcd` - Back-project each frame into a point cloud with normals.
    /// * `decoder` - Builds the RGB-D image of a frame.
    ///
    /// # Errors
    ///
    /// Fails if the file counts or names disagree, or if a file cannot be read.
    pub fn read_rgbd_scene<D>(
        &mut self,
        input_dir: impl AsRef<Path>,
        extract_pcd: bool,
        mut decoder: D,
    ) -> Result<(), SceneError>
    where
        D: FnMut(&Path, &Path, f64) -> Result<RgbdImage, SceneError>,
    {
        log::info!("Loading scene {}", self.name);

        let scene_dir = input_dir.as_ref().join(&self.name);
        let color_files = find_frame_files(&scene_dir, "color")?;
        let depth_files = find_frame_files(&scene_dir, "depth")?;
        let pose_files = find_frame_files(&scene_dir, "pose")?;

        if color_files.len() != depth_files.len() {
            return Err(SceneError::CountMismatch {
                left_kind: "color",
                left: color_files.len(),
                right_kind: "depth",
                right: depth_files.len(),
            });
        }
        let pose_files = if pose_files.is_empty() {
            log::warn!("No camera poses found, every pose is set to identity");
            vec![None; color_files.len()]
        } else if pose_files.len() != color_files.len() {
            return Err(SceneError::CountMismatch {
                left_kind: "color",
                left: color_files.len(),
                right_kind: "pose",
                right: pose_files.len(),
            });
        } else {
            pose_files.into_iter().map(Some).collect()
        };

        let camera_params = read_camera_params(scene_dir.join(CAMERA_PARAMS_FILE))?;
        for key in [CAMERA_WIDTH, CAMERA_HEIGHT, DEPTH_SHIFT] {
            if !camera_params.contains(key) {
                return Err(SceneError::MissingCameraParam(key.to_string()));
            }
        }
        let (fx, fy, cx, cy) = read_camera_intrinsics(scene_dir.join(CAMERA_INTRINSICS_FILE))?;
        let camera = PinholeCamera::new(
            camera_params.width()?,
            camera_params.height()?,
            fx,
            fy,
            cx,
            cy,
        );
        let depth_scale = camera_params.depth_shift()?;
        let estimator = KnnNormalEstimator::default();

        let mut frames = Vec::with_capacity(color_files.len());
        for ((color_file, depth_file), pose_file) in
            color_files.iter().zip(depth_files.iter()).zip(pose_files.iter())
        {
            let name = frame_name(color_file);
            check_frame_name(&name, depth_file)?;
            let pose = match pose_file {
                Some(pose_file) => {
                    check_frame_name(&name, pose_file)?;
                    read_camera_pose(pose_file)?
                }
                None => Pose::IDENTITY,
            };

            let rgbd = decoder(color_file.as_path(), depth_file.as_path(), depth_scale)?;
            let pointcloud = if extract_pcd {
                create_pointcloud_from_rgbd(
                    &rgbd,
                    &camera,
                    Some(&estimator),
                    DEFAULT_MIN_VALID_POINTS,
                )?
            } else {
                None
            };

            frames.push(Frame {
                name,
                rgbd: Some(rgbd),
                pointcloud,
                pose,
            });
        }

        self.frames.extend(frames);
        self.camera = Some(camera);
        self.camera_params = Some(camera_params);
        log::info!(
            "Completed, the sequence contains {} frames",
            self.frames.len()
        );

        Ok(())
    }

    /// Load the point cloud frames packed in `<input_dir>/<name>.bin`.
    ///
    /// Frames are appended to the scene. The valid pairs of the archive are
    /// added to [`Scene::valid_pairs`] with indices into [`Scene::frames`].
    pub fn read_pcd_scene(&mut self, input_dir: impl AsRef<Path>) -> Result<(), SceneError> {
        log::info!("Loading scene {}", self.name);

        let path = input_dir
            .as_ref()
            .join(format!("{}.{}", self.name, ARCHIVE_EXTENSION));
        let packed = PackedScene::read(path)?;

        let frames = packed
            .names
            .into_iter()
            .zip(packed.points)
            .zip(packed.poses.iter())
            .map(|((name, points), pose)| -> Result<Frame, SceneError> {
                Ok(Frame {
                    name,
                    rgbd: None,
                    pointcloud: Some(PointCloud::from_points(points)),
                    pose: Pose::from_matrix(pose)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // pair indices refer to the archive, shift them past the frames already loaded
        let offset = self.frames.len();
        self.valid_pairs
            .extend(packed.pairs.iter().map(|[i, j]| [i + offset, j + offset]));
        self.frames.extend(frames);
        log::info!(
            "Completed, the sequence contains {} frames",
            self.frames.len()
        );

        Ok(())
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scene: {}", self.name)?;
        write!(f, "Number of frames: {}", self.frames.len())
    }
}

/// List the scenes of a dataset directory, sorted by name.
///
/// Sub-directories are RGB-D scenes, `*.bin` files are packed scenes.
pub fn list_scenes(input_dir: impl AsRef<Path>) -> Result<Vec<String>, SceneError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        let name = if path.is_dir() {
            path.file_name()
        } else if path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION) {
            path.file_stem()
        } else {
            None
        };
        if let Some(name) = name.and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Files of `dir` named `<id>.<kind>.<ext>`, sorted by file name.
fn find_frame_files(dir: &Path, kind: &str) -> Result<Vec<PathBuf>, SceneError> {
    let pattern = format!(".{kind}.");
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with('.') && file_name.contains(&pattern) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The frame name of a file, the text before the first `.` of its file name.
fn frame_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default()
        .to_string()
}

fn check_frame_name(expected: &str, path: &Path) -> Result<(), SceneError> {
    let actual = frame_name(path);
    if actual != expected {
        return Err(SceneError::NameMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const WIDTH: usize = 12;
    const HEIGHT: usize = 10;

    /// Decoder standing in for an image codec: a flat wall at 0.5 m.
    fn flat_decoder(
        _color: &Path,
        _depth: &Path,
        depth_scale: f64,
    ) -> Result<RgbdImage, SceneError> {
        let raw = (0.5 * depth_scale) as u16;
        Ok(RgbdImage::new(
            WIDTH,
            HEIGHT,
            vec![[100, 150, 200]; WIDTH * HEIGHT],
            vec![raw; WIDTH * HEIGHT],
            depth_scale,
            1.0,
        )?)
    }

    fn write_rgbd_scene(root: &Path, ids: &[&str], with_poses: bool) -> std::io::Result<()> {
        let dir = root.join("dummy_01");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join(CAMERA_PARAMS_FILE),
            format!("Camera_Width {WIDTH}\nCamera_Height {HEIGHT}\nDepth_Shift 10000\n"),
        )?;
        std::fs::write(
            dir.join(CAMERA_INTRINSICS_FILE),
            "10 0 6 0\n0 10 5 0\n0 0 1 0\n0 0 0 1\n",
        )?;
        for (i, id) in ids.iter().enumerate() {
            std::fs::write(dir.join(format!("{id}.color.png")), b"")?;
            std::fs::write(dir.join(format!("{id}.depth.png")), b"")?;
            if with_poses {
                std::fs::write(
                    dir.join(format!("{id}.pose.txt")),
                    format!("1 0 0 {i}\n0 1 0 0\n0 0 1 0\n0 0 0 1\n"),
                )?;
            }
        }
        Ok(())
    }

    #[test]
    fn test_read_rgbd_scene() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_rgbd_scene(tmp_dir.path(), &["000001", "000000", "000002"], true)?;

        let mut scene = Scene::new("dummy_01");
        let mut calls = Vec::new();
        scene.read_rgbd_scene(tmp_dir.path(), true, |color, depth, scale| {
            calls.push((color.to_path_buf(), depth.to_path_buf(), scale));
            flat_decoder(color, depth, scale)
        })?;

        assert_eq!(scene.len(), 3);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].2, 10000.0);
        assert!(calls[0].0.ends_with("000000.color.png"));

        let names = scene.frames().iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["000000", "000001", "000002"]);

        let poses = scene.all_poses();
        assert_relative_eq!(poses[2].translation()[0], 2.0);

        let camera = scene.camera().ok_or("missing camera")?;
        assert_eq!((camera.width, camera.height), (WIDTH, HEIGHT));
        assert_eq!((camera.fx, camera.cx, camera.cy), (10.0, 6.0, 5.0));

        assert!(scene.all_rgbds().iter().all(|r| r.is_some()));
        for pointcloud in scene.all_pointclouds() {
            let pointcloud = pointcloud.ok_or("missing point cloud")?;
            assert_eq!(pointcloud.len(), WIDTH * HEIGHT);
            assert_eq!(pointcloud.normals().map(|n| n.len()), Some(WIDTH * HEIGHT));
        }
        assert_eq!(scene.to_string(), "Scene: dummy_01\nNumber of frames: 3");
        Ok(())
    }

    #[test]
    fn test_read_rgbd_scene_without_poses() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_rgbd_scene(tmp_dir.path(), &["a", "b"], false)?;

        let mut scene = Scene::new("dummy_01");
        scene.read_rgbd_scene(tmp_dir.path(), false, flat_decoder)?;

        assert_eq!(scene.all_poses(), vec![Pose::IDENTITY; 2]);
        assert!(scene.all_pointclouds().iter().all(|p| p.is_none()));
        Ok(())
    }

    #[test]
    fn test_read_rgbd_scene_count_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_rgbd_scene(tmp_dir.path(), &["000000", "000001"], true)?;
        std::fs::remove_file(tmp_dir.path().join("dummy_01/000001.depth.png"))?;

        let mut scene = Scene::new("dummy_01");
        let res = scene.read_rgbd_scene(tmp_dir.path(), false, flat_decoder);
        assert!(matches!(
            res,
            Err(SceneError::CountMismatch {
                left: 2,
                right: 1,
                ..
            })
        ));
        assert!(scene.is_empty());
        Ok(())
    }

    #[test]
    fn test_read_rgbd_scene_name_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_rgbd_scene(tmp_dir.path(), &["000000"], true)?;
        let dir = tmp_dir.path().join("dummy_01");
        std::fs::rename(dir.join("000000.pose.txt"), dir.join("000009.pose.txt"))?;

        let mut scene = Scene::new("dummy_01");
        let res = scene.read_rgbd_scene(tmp_dir.path(), false, flat_decoder);
        assert!(matches!(res, Err(SceneError::NameMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_read_rgbd_scene_missing_param() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_rgbd_scene(tmp_dir.path(), &["000000"], true)?;
        std::fs::write(
            tmp_dir.path().join("dummy_01").join(CAMERA_PARAMS_FILE),
            "Camera_Width 12\nCamera_Height 10\n",
        )?;

        let mut scene = Scene::new("dummy_01");
        let res = scene.read_rgbd_scene(tmp_dir.path(), false, flat_decoder);
        assert!(matches!(res, Err(SceneError::MissingCameraParam(ref key)) if key == DEPTH_SHIFT));
        Ok(())
    }

    #[test]
    fn test_read_pcd_scene() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let mut shifted = Pose::IDENTITY.to_matrix();
        shifted[2][3] = 1.0;
        let packed = PackedScene {
            names: vec!["cloud_bin_0".into(), "cloud_bin_1".into()],
            points: vec![vec![[0.0; 3]; 4], vec![[1.0; 3]; 2]],
            poses: vec![Pose::IDENTITY.to_matrix(), shifted],
            pairs: vec![[0, 1]],
        };
        packed.write(tmp_dir.path().join("kitchen.bin"))?;

        let mut scene = Scene::new("kitchen");
        scene.read_pcd_scene(tmp_dir.path())?;

        assert_eq!(scene.len(), 2);
        assert_eq!(scene.valid_pairs(), &[[0, 1]]);
        assert_eq!(scene.frames()[1].name, "cloud_bin_1");
        assert_eq!(scene.all_poses()[1].translation(), [0.0, 0.0, 1.0]);
        let sizes = scene
            .all_pointclouds()
            .iter()
            .map(|p| p.map(|p| p.len()))
            .collect::<Vec<_>>();
        assert_eq!(sizes, [Some(4), Some(2)]);
        assert!(scene.all_rgbds().iter().all(|r| r.is_none()));
        Ok(())
    }

    #[test]
    fn test_read_pcd_scene_appends_pairs() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let packed = PackedScene {
            names: vec!["cloud_bin_0".into(), "cloud_bin_1".into()],
            points: vec![vec![[0.0; 3]], vec![[1.0; 3]]],
            poses: vec![Pose::IDENTITY.to_matrix(); 2],
            pairs: vec![[0, 1]],
        };
        packed.write(tmp_dir.path().join("kitchen.bin"))?;

        let mut scene = Scene::new("kitchen");
        scene.read_pcd_scene(tmp_dir.path())?;
        scene.read_pcd_scene(tmp_dir.path())?;

        assert_eq!(scene.len(), 4);
        assert_eq!(scene.valid_pairs(), &[[0, 1], [2, 3]]);
        Ok(())
    }

    #[test]
    fn test_read_pcd_scene_invalid_pose() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let mut skewed = Pose::IDENTITY.to_matrix();
        skewed[0][1] = 0.5;
        let packed = PackedScene {
            names: vec!["cloud_bin_0".into()],
            points: vec![vec![[0.0; 3]]],
            poses: vec![skewed],
            pairs: vec![],
        };
        packed.write(tmp_dir.path().join("kitchen.bin"))?;

        let mut scene = Scene::new("kitchen");
        assert!(matches!(
            scene.read_pcd_scene(tmp_dir.path()),
            Err(SceneError::InvalidPose(_))
        ));
        Ok(())
    }

    #[test]
    fn test_list_scenes() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        std::fs::create_dir(tmp_dir.path().join("scene_b"))?;
        std::fs::create_dir(tmp_dir.path().join("scene_a"))?;
        std::fs::write(tmp_dir.path().join("packed.bin"), b"")?;
        std::fs::write(tmp_dir.path().join("notes.txt"), b"")?;

        assert_eq!(list_scenes(tmp_dir.path())?, ["packed", "scene_a", "scene_b"]);
        Ok(())
    }
}
