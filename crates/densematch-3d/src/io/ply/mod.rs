mod parser;
mod properties;
mod writer;

pub use parser::*;
pub use properties::*;
pub use writer::*;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file
    #[error("Failed to access PLY file")]
    Io(#[from] std::io::Error),

    /// Unsupported PLY property
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),

    /// The header is not a binary little endian vertex header
    #[error("Malformed PLY header: {0}")]
    MalformedHeader(String),
}
