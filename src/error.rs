use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while importing a Dataturks export into Pascal VOC.
///
/// Everything except [`ImportError::Precondition`] is scoped to a single
/// labeled item: the importer logs it, counts the item as failed and moves on.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to parse labeled item: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to download image at {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("failed to read image dimensions of {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("region has {0} points, expected 2 or 4")]
    UnsupportedPoints(usize),

    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the annotation flattener. Any of them ends the run.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse annotation {}: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("object `{name}` in {} has no bndbox", .path.display())]
    MissingBndBox { path: PathBuf, name: String },
}
