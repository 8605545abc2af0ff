//! Error types shared across the store, catalog and export pipeline.
//!
//! Every error here is recoverable: the store swallows [`StorageError`] after
//! logging it, and the export coordinator turns [`ExportError`] into a failed
//! outcome for the single request that raised it.

use thiserror::Error;

/// Failure reading or writing the durable state record.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage is unavailable: {0}")]
    Unavailable(String),
}

/// Failure loading an external icon catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("icon catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("icon `{name}` has no shapes")]
    EmptyIcon { name: String },
}

/// Failure of a single export request.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("canvas size {width}x{height} cannot be serialized")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("capture target is not mounted")]
    CaptureTargetMissing,

    #[error("fonts did not become ready: {0}")]
    Fonts(String),

    #[error("offscreen clone markup could not be parsed: {0}")]
    Markup(#[from] resvg::usvg::Error),

    #[error("cannot allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },

    #[error("raster encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("saving `{file_name}` failed: {source}")]
    Save {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}
