use std::io::{BufRead, Read};
use std::path::Path;

use super::{
    parse_data_type,
    properties::{PlyPropertyDefinition, VertexLayout},
    PlyError,
};
use crate::pointcloud::PointCloud;

struct PlyHeader {
    pub vertex_count: usize,
    pub properties: Vec<PlyPropertyDefinition>,
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, PlyError> {
    let mut line = String::new();
    let mut vertex_count = None;
    let mut is_binary_little_endian = false;
    let mut is_ply = false;
    let mut in_vertex_element = false;
    let mut has_end_header = false;
    let mut properties = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();

        if trimmed == "ply" {
            is_ply = true;
            continue;
        }

        if trimmed == "end_header" {
            has_end_header = true;
            break;
        }

        if trimmed.starts_with("format binary_little_endian") {
            is_binary_little_endian = true;
        } else if trimmed.starts_with("element") {
            let parts = trimmed.split_whitespace().collect::<Vec<_>>();
            in_vertex_element = parts.get(1) == Some(&"vertex");
            if in_vertex_element {
                let count = parts
                    .get(2)
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| PlyError::MalformedHeader(trimmed.to_string()))?;
                vertex_count = Some(count);
            } else if vertex_count.is_none() {
                return Err(PlyError::UnsupportedProperty(format!(
                    "element before vertex: {trimmed}"
                )));
            }
        } else if trimmed.starts_with("property") && in_vertex_element {
            let parts = trimmed.split_whitespace().collect::<Vec<_>>();
            if parts.get(1) == Some(&"list") {
                return Err(PlyError::UnsupportedProperty(trimmed.to_string()));
            }
            if parts.len() < 3 {
                return Err(PlyError::MalformedHeader(trimmed.to_string()));
            }
            let data_type = parse_data_type(parts[1])?;
            let name = parts[2].to_string();
            properties.push(PlyPropertyDefinition { name, data_type });
        }
    }

    if !is_ply {
        return Err(PlyError::MalformedHeader("missing ply magic".into()));
    }
    if !is_binary_little_endian {
        return Err(PlyError::UnsupportedProperty(
            "only binary_little_endian is supported".into(),
        ));
    }
    if !has_end_header {
        return Err(PlyError::MalformedHeader("missing end_header".into()));
    }

    let vertex_count =
        vertex_count.ok_or_else(|| PlyError::MalformedHeader("missing vertex element".into()))?;

    Ok(PlyHeader {
        vertex_count,
        properties,
    })
}

/// Read a binary little endian PLY file into a point cloud.
///
/// The vertex layout is taken from the header. Positions may be `float` or
/// `double`, colors must be `uchar`. Colors and normals are only set when the
/// file has them.
pub fn read_ply_binary(path: impl AsRef<Path>) -> Result<PointCloud, PlyError> {
    let file = std::fs::File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = std::io::BufReader::new(file);
    let header = parse_header(&mut reader)?;
    let layout = VertexLayout::from_properties(&header.properties)?;
    let mut buffer = vec![0u8; layout.stride];

    // the header count is untrusted, the file cannot hold more vertices than its size allows
    let max_vertices =
        usize::try_from(file_len / layout.stride.max(1) as u64).unwrap_or(usize::MAX);
    let capacity = header.vertex_count.min(max_vertices);

    let mut points = Vec::with_capacity(capacity);
    let mut colors = layout.color.map(|_| Vec::with_capacity(capacity));
    let mut normals = layout.normal.map(|_| Vec::with_capacity(capacity));

    for _ in 0..header.vertex_count {
        reader.read_exact(&mut buffer)?;

        let [x, y, z] = layout.position;
        points.push([x.read(&buffer), y.read(&buffer), z.read(&buffer)]);

        if let (Some([r, g, b]), Some(colors)) = (layout.color, colors.as_mut()) {
            colors.push([
                r.read(&buffer) as u8,
                g.read(&buffer) as u8,
                b.read(&buffer) as u8,
            ]);
        }
        if let (Some([nx, ny, nz]), Some(normals)) = (layout.normal, normals.as_mut()) {
            normals.push([nx.read(&buffer), ny.read(&buffer), nz.read(&buffer)]);
        }
    }

    log::debug!("Read {} points from PLY file", points.len());

    Ok(PointCloud::new_unchecked(points, colors, normals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ply::PlyDataType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_header_basic() -> Result<(), PlyError> {
        let header_text = "ply\nformat binary_little_endian 1.0\nelement vertex 10\nproperty float x\nproperty float y\nproperty float z\nend_header\n";
        let mut reader = std::io::BufReader::new(header_text.as_bytes());
        let header = parse_header(&mut reader)?;
        assert_eq!(header.vertex_count, 10);
        assert_eq!(header.properties.len(), 3);
        assert_eq!(header.properties[0].name, "x");
        assert_eq!(header.properties[0].data_type, PlyDataType::Float32);
        Ok(())
    }

    #[test]
    fn test_parse_header_skips_faces() -> Result<(), PlyError> {
        let header_text = "ply\nformat binary_little_endian 1.0\ncomment made by hand\nelement vertex 3\nproperty double x\nproperty double y\nproperty double z\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n";
        let mut reader = std::io::BufReader::new(header_text.as_bytes());
        let header = parse_header(&mut reader)?;
        assert_eq!(header.vertex_count, 3);
        assert_eq!(header.properties.len(), 3);
        Ok(())
    }

    #[test]
    fn test_parse_header_errors() {
        let ascii = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n";
        let mut reader = std::io::BufReader::new(ascii.as_bytes());
        assert!(matches!(
            parse_header(&mut reader),
            Err(PlyError::UnsupportedProperty(_))
        ));

        let truncated = "ply\nformat binary_little_endian 1.0\nelement vertex 1\n";
        let mut reader = std::io::BufReader::new(truncated.as_bytes());
        assert!(matches!(
            parse_header(&mut reader),
            Err(PlyError::MalformedHeader(_))
        ));

        let bad_count = "ply\nformat binary_little_endian 1.0\nelement vertex many\nend_header\n";
        let mut reader = std::io::BufReader::new(bad_count.as_bytes());
        assert!(matches!(
            parse_header(&mut reader),
            Err(PlyError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_read_ply_binary_float_xyz_rgb_normals() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        let header = "ply\nformat binary_little_endian 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nproperty uchar red\nproperty uchar green\nproperty uchar blue\nproperty float nx\nproperty float ny\nproperty float nz\nend_header\n";
        file.write_all(header.as_bytes())?;

        let mut data = Vec::new();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());
        data.extend_from_slice(&3.0f32.to_le_bytes());
        data.push(255);
        data.push(128);
        data.push(0);
        data.extend_from_slice(&0.0f32.to_le_bytes());
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&0.0f32.to_le_bytes());
        file.write_all(&data)?;

        let pointcloud = read_ply_binary(file.path())?;
        assert_eq!(pointcloud.len(), 1);
        assert_eq!(pointcloud.points()[0], [1.0, 2.0, 3.0]);
        assert_eq!(pointcloud.colors().ok_or("missing colors")?[0], [255, 128, 0]);
        assert_eq!(pointcloud.normals().ok_or("missing normals")?[0], [0.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_read_ply_binary_extra_property() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        let header = "ply\nformat binary_little_endian 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nproperty float intensity\nend_header\n";
        file.write_all(header.as_bytes())?;

        let mut data = Vec::new();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());
        data.extend_from_slice(&3.0f32.to_le_bytes());
        data.extend_from_slice(&0.5f32.to_le_bytes());
        file.write_all(&data)?;

        let pointcloud = read_ply_binary(file.path())?;
        assert_eq!(pointcloud.len(), 1);
        assert_eq!(pointcloud.points()[0], [1.0, 2.0, 3.0]);
        assert!(pointcloud.colors().is_none());
        assert!(pointcloud.normals().is_none());
        Ok(())
    }

    #[test]
    fn test_read_ply_binary_truncated_data() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        let header = "ply\nformat binary_little_endian 1.0\nelement vertex 2\nproperty double x\nproperty double y\nproperty double z\nend_header\n";
        file.write_all(header.as_bytes())?;
        file.write_all(&1.0f64.to_le_bytes())?;

        assert!(matches!(read_ply_binary(file.path()), Err(PlyError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_read_ply_binary_huge_vertex_count() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        let header = format!(
            "ply\nformat binary_little_endian 1.0\nelement vertex {}\nproperty double x\nproperty double y\nproperty double z\nend_header\n",
            usize::MAX
        );
        file.write_all(header.as_bytes())?;
        file.write_all(&1.0f64.to_le_bytes())?;

        assert!(matches!(read_ply_binary(file.path()), Err(PlyError::Io(_))));
        Ok(())
    }
}
