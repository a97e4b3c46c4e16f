use std::path::Path;

use densematch::k3d::rgbd::{RgbdImage, DEFAULT_DEPTH_TRUNC};
use densematch::scene::SceneError;

/// A decoded binary netpbm image.
struct Netpbm {
    width: usize,
    height: usize,
    max_value: u32,
    channels: usize,
    data: Vec<u8>,
}

/// Read a binary `P5` (grey) or `P6` (rgb) netpbm file.
fn read_netpbm(path: &Path) -> Result<Netpbm, SceneError> {
    let bytes = std::fs::read(path)?;
    let decode_err = |msg: &str| SceneError::ImageDecode(format!("{}: {msg}", path.display()));

    // the header is four whitespace separated tokens, comments start with `#`
    let mut tokens = Vec::with_capacity(4);
    let mut pos = 0;
    while tokens.len() < 4 {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b'#' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if start == pos {
            return Err(decode_err("truncated header"));
        }
        tokens.push(String::from_utf8_lossy(&bytes[start..pos]).into_owned());
    }
    // a single whitespace byte separates the header from the raster
    pos += 1;

    let channels = match tokens[0].as_str() {
        "P5" => 1,
        "P6" => 3,
        _ => return Err(decode_err("only binary P5 and P6 are supported")),
    };
    let parse = |s: &str| s.parse::<usize>().map_err(|_| decode_err("bad header value"));
    let width = parse(&tokens[1])?;
    let height = parse(&tokens[2])?;
    let max_value = parse(&tokens[3])? as u32;

    let bytes_per_sample = if max_value > 255 { 2 } else { 1 };
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels * bytes_per_sample))
        .ok_or_else(|| decode_err("image dimensions overflow"))?;
    let end = pos
        .checked_add(expected)
        .ok_or_else(|| decode_err("image dimensions overflow"))?;
    let data = bytes
        .get(pos..end)
        .ok_or_else(|| decode_err("truncated raster"))?
        .to_vec();

    Ok(Netpbm {
        width,
        height,
        max_value,
        channels,
        data,
    })
}

/// Build an RGB-D image from a `P6` color file and a 16-bit `P5` depth file.
pub fn decode_rgbd(
    color_path: &Path,
    depth_path: &Path,
    depth_scale: f64,
) -> Result<RgbdImage, SceneError> {
    let color = read_netpbm(color_path)?;
    let depth = read_netpbm(depth_path)?;

    if color.channels != 3 || color.max_value > 255 {
        return Err(SceneError::ImageDecode(format!(
            "{}: color must be an 8-bit P6 image",
            color_path.display()
        )));
    }
    if depth.channels != 1 || depth.max_value <= 255 {
        return Err(SceneError::ImageDecode(format!(
            "{}: depth must be a 16-bit P5 image",
            depth_path.display()
        )));
    }
    if (color.width, color.height) != (depth.width, depth.height) {
        return Err(SceneError::ImageDecode(format!(
            "color is {}x{} but depth is {}x{}",
            color.width, color.height, depth.width, depth.height
        )));
    }

    let rgb = color
        .data
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect::<Vec<_>>();
    // netpbm stores 16-bit samples big endian
    let raw_depth = depth
        .data
        .chunks_exact(2)
        .map(|d| u16::from_be_bytes([d[0], d[1]]))
        .collect::<Vec<_>>();

    Ok(RgbdImage::new(
        color.width,
        color.height,
        rgb,
        raw_depth,
        depth_scale,
        DEFAULT_DEPTH_TRUNC,
    )?)
}
