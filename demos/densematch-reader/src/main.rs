use argh::FromArgs;
use std::path::{Path, PathBuf};

use densematch::k3d::io::ply::write_ply_binary;
use densematch::k3d::merge::{merge, MergeConfig};
use densematch::k3d::overlap::overlap_ratio;
use densematch::k3d::pointcloud::PointCloud;
use densematch::k3d::pose::{transform_distance, Pose};
use densematch::scene::{list_scenes, Scene};

mod netpbm;

/// Kind of data a scene is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceData {
    Rgbd,
    Pcd,
}

impl std::str::FromStr for SourceData {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgbd" => Ok(SourceData::Rgbd),
            "pcd" => Ok(SourceData::Pcd),
            _ => Err(format!("unknown source data `{s}`, expected rgbd or pcd")),
        }
    }
}

#[derive(FromArgs)]
/// Load DenseMatch scenes, merge their frames and report registration metrics
struct Args {
    /// path to the dataset root
    #[argh(option, default = "PathBuf::from(\"dataset\")")]
    root_dir: PathBuf,

    /// sub-directory holding the RGB-D scenes
    #[argh(option, default = "String::from(\"DenseMatch_RGBD\")")]
    subdir_rgbd: String,

    /// sub-directory holding the packed point cloud scenes
    #[argh(option, default = "String::from(\"DenseMatch_Pointcloud\")")]
    subdir_pcd: String,

    /// source data type, rgbd or pcd
    #[argh(option, default = "SourceData::Rgbd")]
    source_data: SourceData,

    /// name of the scene to load, empty to load every scene
    #[argh(option, default = "String::from(\"dummy_01\")")]
    scene: String,

    /// extract a point cloud from each RGB-D frame
    #[argh(switch)]
    extract_pcd: bool,

    /// voxel size used by the overlap ratio
    #[argh(option, default = "0.05")]
    voxel_size: f64,

    /// directory where the merged point cloud of each scene is written as PLY
    #[argh(option)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let subdir = match args.source_data {
        SourceData::Rgbd => &args.subdir_rgbd,
        SourceData::Pcd => &args.subdir_pcd,
    };
    let input_dir = args.root_dir.join(subdir);

    let scene_names = if args.scene.is_empty() {
        list_scenes(&input_dir)?
    } else {
        vec![args.scene.clone()]
    };

    if let Some(output) = &args.output {
        std::fs::create_dir_all(output)?;
    }

    for name in scene_names {
        let scene = load_scene(&input_dir, &name, &args)?;
        println!("{scene}");
        report_scene(&scene, &args)?;
    }

    Ok(())
}

fn load_scene(
    input_dir: &Path,
    name: &str,
    args: &Args,
) -> Result<Scene, Box<dyn std::error::Error>> {
    let mut scene = Scene::new(name);
    match args.source_data {
        SourceData::Rgbd => {
            scene.read_rgbd_scene(input_dir, args.extract_pcd, netpbm::decode_rgbd)?
        }
        SourceData::Pcd => scene.read_pcd_scene(input_dir)?,
    }
    Ok(scene)
}

fn report_scene(scene: &Scene, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let poses = scene.all_poses();

    // drift between consecutive poses
    for (k, pair) in poses.windows(2).enumerate() {
        let (rot, transl) = transform_distance(&pair[0], &pair[1]);
        log::info!(
            "Pose {} -> {}: rotation {:.3} deg, translation {:.4}",
            k,
            k + 1,
            rot,
            transl
        );
    }

    // frames without a point cloud were rejected or not extracted
    let (clouds, cloud_poses): (Vec<PointCloud>, Vec<Pose>) = scene
        .frames()
        .iter()
        .filter_map(|f| f.pointcloud.clone().map(|pc| (pc, f.pose)))
        .unzip();
    if clouds.is_empty() {
        log::warn!("Scene {} has no point clouds to merge", scene.name());
        return Ok(());
    }

    let merged = merge(&clouds, &cloud_poses, &MergeConfig::default())?;
    println!(
        "Merged {} point clouds into {} points",
        clouds.len(),
        merged.len()
    );

    if let Some(output) = &args.output {
        let path = output.join(format!("{}.ply", scene.name()));
        write_ply_binary(&path, &merged)?;
        println!("Wrote {}", path.display());
    }

    let pointclouds = scene.all_pointclouds();
    for [i, j] in scene.valid_pairs() {
        let (Some(cloud0), Some(cloud1)) = (pointclouds[*i], pointclouds[*j]) else {
            continue;
        };
        // maps frame i into frame j
        let transform = poses[*j].compose(&poses[*i].inverse());
        match overlap_ratio(cloud0, cloud1, &transform, args.voxel_size) {
            Ok(ratio) => println!("Pair ({i}, {j}): overlap ratio {ratio:.4}"),
            Err(e) => log::warn!("Pair ({i}, {j}): cannot compute overlap: {e}"),
        }
    }

    Ok(())
}
