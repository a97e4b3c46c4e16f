#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model.
pub mod camera;

/// I/O utilities for reading and writing 3D data.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Merge per-frame point clouds into one registered cloud.
pub mod merge;

/// Normal estimation and orientation.
pub mod normals;

/// Overlap ratio between two point clouds.
pub mod overlap;

/// Point cloud container.
pub mod pointcloud;

/// Rigid poses and distances between them.
pub mod pose;

/// RGB-D images and back-projection to point clouds.
pub mod rgbd;

/// Spatial index and radius-bounded correspondence search.
pub mod spatial;

/// Voxel grid downsampling.
pub mod voxel_grid;
