use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported operating system '{0}': only Linux and macOS are supported")]
    UnsupportedPlatform(String),

    #[error("LibreOffice not found (tried {tried:?}); make sure it is installed")]
    BinaryNotFound { tried: Vec<PathBuf> },

    #[error("failed to run {}: {source}", .bin.display())]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("conversion failed with exit code {code:?}: {stderr}")]
    ConversionFailed { code: Option<i32>, stderr: String },

    #[error("converter produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("cleanup of temporary files failed: {0}")]
    Cleanup(#[source] std::io::Error),

    #[error("input must be a file path or a file: URL, got '{0}'")]
    InvalidLocation(String),

    #[error("not a valid DOCX file: {0}")]
    InvalidDocx(String),

    #[error("template error in {part}: {reason}")]
    Template { part: String, reason: String },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn template(part: &str, reason: impl Into<String>) -> Self {
        Error::Template {
            part: part.to_string(),
            reason: reason.into(),
        }
    }
}
