/// Error type shared by every stage of the fracture simulation
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FractureError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("invalid volume: {0}")]
    InvalidVolume(String),

    #[error("unsupported volume format '{extension}' for {path} (supported: {supported})")]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: String,
    },

    #[error("malformed {format} file {path}: {message}")]
    Format {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("label {0} has no voxels, cannot compute region statistics")]
    EmptyRegion(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report serialisation failed: {0}")]
    Report(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FractureError>;
