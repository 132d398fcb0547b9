use std::path::PathBuf;

use textcomposer_core::ElementId;
use thiserror::Error;

/// Errors that are reported to the user.
///
/// Storage failures never show up here: they are logged where they happen
/// and the in-memory document stays authoritative.
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("{path:?} is not a supported image: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    #[error("No image loaded; open an image before exporting")]
    NoImage,

    #[error("No rendering surface available for export")]
    NoSurface,

    #[error("Export failed: {0}")]
    Export(String),

    #[error("No text element with id {0}")]
    UnknownElement(ElementId),
}
