use std::io::Write;
use std::path::Path;

use super::{PlyDataType, PlyError};
use crate::pointcloud::PointCloud;

/// Write a point cloud as a binary little endian PLY file.
///
/// Positions and normals are stored as `double`, colors as `uchar`. Colors and
/// normals are written only when the point cloud has them.
///
/// # Arguments
///
/// * `path` - The destination file, created or truncated.
/// * `pointcloud` - The point cloud to write.
pub fn write_ply_binary(path: impl AsRef<Path>, pointcloud: &PointCloud) -> Result<(), PlyError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    let colors = pointcloud.colors();
    let normals = pointcloud.normals();

    let double = PlyDataType::Float64.as_str();
    let uchar = PlyDataType::UInt8.as_str();

    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "element vertex {}", pointcloud.len())?;
    for name in ["x", "y", "z"] {
        writeln!(writer, "property {double} {name}")?;
    }
    if colors.is_some() {
        for name in ["red", "green", "blue"] {
            writeln!(writer, "property {uchar} {name}")?;
        }
    }
    if normals.is_some() {
        for name in ["nx", "ny", "nz"] {
            writeln!(writer, "property {double} {name}")?;
        }
    }
    writeln!(writer, "end_header")?;

    for (i, point) in pointcloud.points().iter().enumerate() {
        for v in point {
            writer.write_all(&v.to_le_bytes())?;
        }
        if let Some(colors) = colors {
            writer.write_all(&colors[i])?;
        }
        if let Some(normals) = normals {
            for v in &normals[i] {
                writer.write_all(&v.to_le_bytes())?;
            }
        }
    }

    writer.flush()?;
    log::debug!("Wrote {} points to PLY file", pointcloud.len());

    Ok(())
}
