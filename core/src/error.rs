use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{path} is not a valid ACRO metadata file: {reason}")]
    InvalidMetadataFile { path: String, reason: String },

    #[error("unsupported ACRO output: this viewer supports ACRO version {supported}, but these results were generated with version {used}")]
    VersionMismatch { used: String, supported: String },

    #[error("expected version in the format 1.2.3, got {version}")]
    UnsupportedVersionFormat { version: String },

    #[error("multiple ACRO metadata files found in the same directory: {}", .0.join(", "))]
    MultipleMetadataFiles(Vec<String>),

    #[error("unknown output: {0}")]
    UnknownOutput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
