use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

/// Everything that can stop a conversion.
///
/// Validation variants (`FileNotFound`, `UnsupportedFormat`) are raised before any
/// filesystem side effect happens. `Render` from a non-final renderer tier is
/// swallowed by the fallback chain; from the final tier it reaches the caller.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file format: {extension}. Supported formats: {}", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<&'static str>,
    },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Failed to read e-book container {}: {reason}", .path.display())]
    ContainerRead { path: PathBuf, reason: String },

    #[error("Document {name} is not valid UTF-8: {source}")]
    Decode {
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("No readable text found in {}", .0.display())]
    EmptyContent(PathBuf),

    #[error("{renderer} renderer failed: {reason}")]
    Render {
        renderer: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub(crate) fn container(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ContainerRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn render(renderer: &'static str, err: anyhow::Error) -> Self {
        Self::Render {
            renderer,
            reason: format!("{:#}", err),
        }
    }
}
