use super::PlyError;

/// Scalar types of a PLY property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyDataType {
    /// 8-bit signed integer
    Int8,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit signed integer
    Int16,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
}

impl PlyDataType {
    /// Size in bytes of one value.
    pub fn size_of(&self) -> usize {
        match self {
            PlyDataType::Int8 | PlyDataType::UInt8 => 1,
            PlyDataType::Int16 | PlyDataType::UInt16 => 2,
            PlyDataType::Int32 | PlyDataType::UInt32 | PlyDataType::Float32 => 4,
            PlyDataType::Float64 => 8,
        }
    }

    /// The type name written in PLY headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlyDataType::Int8 => "char",
            PlyDataType::UInt8 => "uchar",
            PlyDataType::Int16 => "short",
            PlyDataType::UInt16 => "ushort",
            PlyDataType::Int32 => "int",
            PlyDataType::UInt32 => "uint",
            PlyDataType::Float32 => "float",
            PlyDataType::Float64 => "double",
        }
    }

    /// Decode a little endian value at the start of `bytes` as `f64`.
    ///
    /// `bytes` must hold at least [`Self::size_of`] bytes.
    pub(crate) fn read_f64(&self, bytes: &[u8]) -> f64 {
        match self {
            PlyDataType::Int8 => bytes[0] as i8 as f64,
            PlyDataType::UInt8 => bytes[0] as f64,
            PlyDataType::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            PlyDataType::UInt16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            PlyDataType::Int32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            PlyDataType::UInt32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            PlyDataType::Float32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            PlyDataType::Float64 => f64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }
}

/// Parse a PLY header type name.
pub fn parse_data_type(type_str: &str) -> Result<PlyDataType, PlyError> {
    match type_str {
        "float" | "float32" => Ok(PlyDataType::Float32),
        "double" | "float64" => Ok(PlyDataType::Float64),
        "char" | "int8" => Ok(PlyDataType::Int8),
        "uchar" | "uint8" => Ok(PlyDataType::UInt8),
        "short" | "int16" => Ok(PlyDataType::Int16),
        "ushort" | "uint16" => Ok(PlyDataType::UInt16),
        "int" | "int32" => Ok(PlyDataType::Int32),
        "uint" | "uint32" => Ok(PlyDataType::UInt32),
        _ => Err(PlyError::UnsupportedProperty(format!("type {type_str}"))),
    }
}

/// A single property definition from the PLY header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyPropertyDefinition {
    /// Name of the property, e.g. `x` or `red`.
    pub name: String,
    /// Data type of the property.
    pub data_type: PlyDataType,
}

/// A property located inside a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PropertySlot {
    pub offset: usize,
    pub data_type: PlyDataType,
}

impl PropertySlot {
    #[inline]
    pub fn read(&self, record: &[u8]) -> f64 {
        self.data_type.read_f64(&record[self.offset..])
    }
}

/// Where positions, colors and normals live inside one vertex record.
///
/// Properties that are neither of those are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VertexLayout {
    pub stride: usize,
    pub position: [PropertySlot; 3],
    pub color: Option<[PropertySlot; 3]>,
    pub normal: Option<[PropertySlot; 3]>,
}

impl VertexLayout {
    /// Locate the known properties in the record described by `properties`.
    pub fn from_properties(properties: &[PlyPropertyDefinition]) -> Result<Self, PlyError> {
        let mut stride = 0;
        let mut slots = Vec::with_capacity(properties.len());
        for prop in properties {
            slots.push((
                prop.name.as_str(),
                PropertySlot {
                    offset: stride,
                    data_type: prop.data_type,
                },
            ));
            stride += prop.data_type.size_of();
        }

        let find = |name: &str| slots.iter().find(|(n, _)| *n == name).map(|(_, s)| *s);
        let find3 = |names: [&str; 3]| -> Option<[PropertySlot; 3]> {
            Some([find(names[0])?, find(names[1])?, find(names[2])?])
        };

        let position = find3(["x", "y", "z"])
            .ok_or_else(|| PlyError::MalformedHeader("missing x, y or z property".into()))?;
        if position
            .iter()
            .any(|s| !matches!(s.data_type, PlyDataType::Float32 | PlyDataType::Float64))
        {
            return Err(PlyError::UnsupportedProperty(
                "coordinates must be float or double".into(),
            ));
        }

        let color = find3(["red", "green", "blue"]);
        if let Some(color) = &color {
            if color.iter().any(|s| s.data_type != PlyDataType::UInt8) {
                return Err(PlyError::UnsupportedProperty("colors must be uchar".into()));
            }
        }

        let normal = find3(["nx", "ny", "nz"]);

        Ok(Self {
            stride,
            position,
            color,
            normal,
        })
    }
}
