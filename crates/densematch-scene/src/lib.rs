#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Packed point cloud scene archive.
pub mod archive;

/// Error types for the scene module.
pub mod error;

/// A single frame of a scene.
pub mod frame;

/// Readers for camera parameters, intrinsics and poses.
pub mod io;

/// A scene made of frames, with its loaders.
pub mod scene;

pub use crate::archive::PackedScene;
pub use crate::error::SceneError;
pub use crate::frame::Frame;
pub use crate::scene::{list_scenes, Scene};
