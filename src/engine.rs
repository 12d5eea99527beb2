//! Engine: the root template cache and caller-facing surface.
//!
//! Templates load lazily by logical name into a shared namespace and are
//! served from cache until the watch bridge reports a change, at which point
//! the whole namespace is replaced. Renders always run against a namespace
//! snapshot, so replacement never tears an execution in half.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use handlebars::template::Template;
use handlebars::{Handlebars, HelperDef};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{EngineError, WatchError};
use crate::helpers::{RENDER_HELPER, RenderHelper};
use crate::layout::{Layout, LayoutState};
use crate::namespace::Namespace;
use crate::source::{DiskStore, FileStore, SourceResolver};
use crate::watch::{ChangeEvent, FsWatchService, WatchService, run_bridge};

/// A compiled template artifact: the canonical name plus the namespace
/// snapshot that owns its parsed form.
///
/// Artifacts are immutable. Holding one across an invalidation keeps the old
/// namespace alive for that artifact only; fresh lookups see the new one.
pub struct CompiledTemplate {
    name: String,
    pub(crate) registry: Arc<Handlebars<'static>>,
}

impl CompiledTemplate {
    pub(crate) fn new(name: String, registry: Arc<Handlebars<'static>>) -> Self {
        Self { name, registry }
    }

    /// The canonical template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `data`, writing the output to `writer`.
    pub fn execute<W: Write, T: Serialize>(&self, writer: W, data: &T) -> Result<(), EngineError> {
        self.registry
            .render_to_write(&self.name, data, writer)
            .map_err(|source| EngineError::Render {
                name: self.name.clone(),
                source,
            })
    }

    /// Execute against `data`, returning the output as a string.
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, EngineError> {
        self.registry
            .render(&self.name, data)
            .map_err(|source| EngineError::Render {
                name: self.name.clone(),
                source,
            })
    }
}

/// Template engine over one root directory.
///
/// Owns the root namespace, the watch registration, and the background
/// invalidation bridge. `get`/`execute` are synchronous and safe to call
/// concurrently.
pub struct Engine {
    core: Arc<EngineCore>,
    bridge: JoinHandle<()>,
}

impl Engine {
    /// Open an engine over `root` with the default disk store and the
    /// notify-backed watch service.
    ///
    /// Fails with [`EngineError::Watch`] if the watch service cannot start.
    /// Must be called from within a tokio runtime.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let (service, events) = FsWatchService::start()?;
        Ok(Self::with_store(root, service, events, DiskStore))
    }

    /// Open with an injected watch service and event stream, reading sources
    /// from disk.
    pub fn with_watcher(
        root: impl Into<PathBuf>,
        service: impl WatchService,
        events: mpsc::Receiver<ChangeEvent>,
    ) -> Self {
        Self::with_store(root, service, events, DiskStore)
    }

    /// Fully injected constructor: watch service, event stream, and file
    /// store. This is the seam tests and alternative backends use.
    pub fn with_store(
        root: impl Into<PathBuf>,
        service: impl WatchService,
        events: mpsc::Receiver<ChangeEvent>,
        files: impl FileStore,
    ) -> Self {
        let core = Arc::new_cyclic(|weak: &Weak<EngineCore>| {
            let mut base = Handlebars::new();
            base.register_helper(
                RENDER_HELPER,
                Box::new(RenderHelper {
                    engine: weak.clone(),
                }),
            );
            EngineCore {
                resolver: SourceResolver::new(root),
                files: Box::new(files),
                watch: Box::new(service),
                cache: Mutex::new(Namespace::new(base.clone())),
                base: Mutex::new(base),
                watched: Mutex::new(HashSet::new()),
                layouts: Mutex::new(HashMap::new()),
            }
        });
        let bridge = tokio::spawn(run_bridge(Arc::downgrade(&core), events));
        info!(root = %core.resolver.root().display(), "template engine opened");
        Self { core, bridge }
    }

    /// The compiled template for `name`, loading it on first use.
    pub fn get(&self, name: &str) -> Result<CompiledTemplate, EngineError> {
        self.core.get(name)
    }

    /// Execute template `name` against `data` into `writer`.
    pub fn execute<W: Write, T: Serialize>(
        &self,
        name: &str,
        writer: W,
        data: &T,
    ) -> Result<(), EngineError> {
        self.get(name)?.execute(writer, data)
    }

    /// Execute template `name` against `data`, returning the output.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, EngineError> {
        self.get(name)?.render(data)
    }

    /// Bind a helper into every namespace.
    ///
    /// Cached namespaces embed their helper set, so artifacts built against
    /// the old set are discarded rather than patched; they reload on next
    /// use.
    pub fn bind_function(&self, name: &str, helper: Box<dyn HelperDef + Send + Sync>) {
        self.bind_functions([(name.to_string(), helper)]);
    }

    /// Bind several helpers at once, paying the cache drop once.
    pub fn bind_functions(
        &self,
        funcs: impl IntoIterator<Item = (String, Box<dyn HelperDef + Send + Sync>)>,
    ) {
        {
            let mut base = self.core.base.lock().expect("lock poisoned");
            for (name, helper) in funcs {
                debug!(helper = %name, "binding template function");
                base.register_helper(&name, helper);
            }
        }
        self.core.invalidate();
    }

    /// A layout binding for `name`.
    ///
    /// Handles for the same canonical layout name share state, which is what
    /// lets the watch bridge reach every live binding on invalidation.
    pub fn layout(&self, name: &str) -> Layout {
        let canonical = self.core.resolver.canonical(name).to_string();
        let state = {
            let mut layouts = self.core.layouts.lock().expect("lock poisoned");
            layouts
                .entry(canonical.clone())
                .or_insert_with(|| Arc::new(LayoutState::new(canonical)))
                .clone()
        };
        Layout::new(Arc::clone(&self.core), state)
    }

    /// Stop the invalidation bridge and release watch-service resources.
    pub fn close(&self) -> Result<(), EngineError> {
        self.bridge.abort();
        self.core.watch.close()?;
        info!("template engine closed");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.bridge.abort();
    }
}

/// Shared engine state. Helpers and the watch bridge hold this weakly.
pub(crate) struct EngineCore {
    resolver: SourceResolver,
    files: Box<dyn FileStore>,
    watch: Box<dyn WatchService>,
    /// Helper-only prototype every fresh namespace starts from.
    base: Mutex<Handlebars<'static>>,
    /// The active root namespace.
    cache: Mutex<Namespace>,
    /// Source paths already registered with the watch service. Grows as
    /// files are first loaded, cleared together with the namespace.
    watched: Mutex<HashSet<PathBuf>>,
    /// Layout binding state by canonical layout name.
    layouts: Mutex<HashMap<String, Arc<LayoutState>>>,
}

impl EngineCore {
    /// Resolve `name` in the root namespace.
    pub(crate) fn get(&self, name: &str) -> Result<CompiledTemplate, EngineError> {
        let canonical = self.resolver.canonical(name).to_string();
        let registry = self.resolve_in(&self.cache, &canonical)?;
        Ok(CompiledTemplate::new(canonical, registry))
    }

    /// Cache-or-load `canonical` inside `namespace`.
    ///
    /// The namespace lock is held across the whole miss path (read, parse,
    /// watch, commit), serializing concurrent first loads; hits only clone
    /// the snapshot. A failed read or parse commits nothing.
    pub(crate) fn resolve_in(
        &self,
        namespace: &Mutex<Namespace>,
        canonical: &str,
    ) -> Result<Arc<Handlebars<'static>>, EngineError> {
        let mut namespace = namespace.lock().expect("lock poisoned");
        if namespace.contains(canonical) {
            debug!(template = %canonical, "cache hit");
            return Ok(namespace.snapshot());
        }

        let path = self.resolver.path_for(canonical);
        debug!(template = %canonical, path = %path.display(), "cache miss, loading");
        let source = self.files.read(&path).map_err(|source| EngineError::Io {
            path: path.clone(),
            source,
        })?;
        let template = Template::compile(&source).map_err(|source| EngineError::Syntax {
            name: canonical.to_string(),
            source,
        })?;

        // watch before commit: a cached but unwatched template could serve
        // stale content forever
        self.register_watch(&path)?;
        namespace.install(canonical, template);
        Ok(namespace.snapshot())
    }

    /// Render for an in-template include. Errors bubble to the calling
    /// helper, which swallows them.
    pub(crate) fn render_nested(&self, name: &str, data: &Value) -> Result<String, EngineError> {
        self.get(name)?.render(data)
    }

    /// Idempotent watch registration for a loaded source path.
    fn register_watch(&self, path: &Path) -> Result<(), WatchError> {
        let mut watched = self.watched.lock().expect("lock poisoned");
        if watched.contains(path) {
            return Ok(());
        }
        self.watch.watch(path)?;
        watched.insert(path.to_path_buf());
        debug!(path = %path.display(), "watching template source");
        Ok(())
    }

    pub(crate) fn base_clone(&self) -> Handlebars<'static> {
        self.base.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// Discard the root namespace, the watch registration set, and every
    /// layout binding's content scopes.
    pub(crate) fn invalidate(&self) {
        let base = self.base_clone();
        self.cache.lock().expect("lock poisoned").reset(base);
        self.watched.lock().expect("lock poisoned").clear();
        for binding in self.layouts.lock().expect("lock poisoned").values() {
            binding.clear_scopes();
        }
        info!("template cache invalidated");
    }
}
