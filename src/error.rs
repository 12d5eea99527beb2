//! Error taxonomy for template loading, rendering, and watching.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`Engine`](crate::Engine) and [`Layout`](crate::Layout)
/// operations.
///
/// Only top-level calls see these. A failure inside a nested include (an
/// inline `{{render ...}}` or the layout `{{content ...}}` placeholder) is
/// converted to an empty-string splice and never crosses the call boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backing file could not be read.
    #[error("failed to read template source {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The template body failed to parse.
    #[error("failed to parse template {name}")]
    Syntax {
        name: String,
        #[source]
        source: handlebars::TemplateError,
    },

    /// A top-level render failed.
    #[error("failed to render template {name}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },

    /// The watch service failed to start, register a path, or close.
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Errors from the watch service boundary.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to start watch service: {0}")]
    Start(String),

    #[error("failed to watch {path}: {reason}")]
    Register { path: PathBuf, reason: String },

    #[error("failed to close watch service: {0}")]
    Close(String),
}
