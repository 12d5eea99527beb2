//! Pergola - cached, hot-reloading template composition.
//!
//! Pergola loads handlebars templates lazily from a directory tree, caches
//! the compiled artifacts by logical name, and discards the whole cache when
//! any backing file changes on disk, so edits show up on the next render
//! without a restart.
//!
//! Composition comes in two forms:
//!
//! - inline includes: `{{render "sidebar" this}}` splices another template's
//!   output into the current one, best-effort (a failed include becomes the
//!   empty string)
//! - layouts: a layout template wraps a content template chosen per call
//!   through the `{{content this}}` placeholder
//!
//! Templates loaded into one cache share their `{{#*inline "name"}}` declared
//! bodies, so a file can reference bodies declared by another file it has
//! never seen, as long as both live in the same cache generation.
//!
//! # Example
//!
//! ```no_run
//! use pergola::Engine;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), pergola::EngineError> {
//! let engine = Engine::open("templates")?;
//!
//! let mut page = Vec::new();
//! engine.execute("home", &mut page, &serde_json::json!({ "title": "hello" }))?;
//!
//! let layout = engine.layout("base");
//! let profile = layout.render("users/profile", &serde_json::json!({ "name": "ada" }))?;
//!
//! engine.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`engine`] - the cache and caller-facing surface
//! - [`layout`] - layout bindings wrapping content templates
//! - [`source`] - name canonicalization and the file-read boundary
//! - [`watch`] - change events and the invalidation bridge
//! - [`error`] - error taxonomy

pub mod engine;
pub mod error;
mod helpers;
pub mod layout;
mod namespace;
pub mod source;
pub mod watch;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::{CompiledTemplate, Engine};
pub use error::{EngineError, WatchError};
pub use helpers::{CONTENT_HELPER, RENDER_HELPER};
pub use layout::Layout;
pub use source::{DiskStore, FileStore, TEMPLATE_EXT};
pub use watch::{ChangeEvent, ChangeKind, FsWatchService, WatchService};

// the template dialect is part of the public surface: user helpers implement
// handlebars::HelperDef
pub use handlebars;
