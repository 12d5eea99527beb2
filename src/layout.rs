//! Layout composition: wrap a content template chosen at render time.
//!
//! A layout binding keeps one namespace per canonical content name. The
//! layout file is compiled separately into each of those namespaces with a
//! `content` helper fixed to that name, so rendering one content selection
//! can never rebind the placeholder another selection sees.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use handlebars::HelperDef;
use serde::Serialize;
use tracing::debug;

use crate::engine::{CompiledTemplate, EngineCore};
use crate::error::EngineError;
use crate::helpers::{CONTENT_HELPER, ContentHelper, SharedHelper};
use crate::namespace::Namespace;

/// State shared by every handle to one layout binding: the per-content scope
/// table and binding-local helpers.
pub(crate) struct LayoutState {
    layout: String,
    scopes: Mutex<HashMap<String, Arc<Scope>>>,
    funcs: Mutex<Vec<(String, SharedHelper)>>,
}

/// One content template's dedicated namespace under a binding.
struct Scope {
    namespace: Mutex<Namespace>,
}

impl LayoutState {
    pub fn new(layout: String) -> Self {
        Self {
            layout,
            scopes: Mutex::new(HashMap::new()),
            funcs: Mutex::new(Vec::new()),
        }
    }

    /// Drop every content scope; they rebuild lazily from the current base.
    pub fn clear_scopes(&self) {
        self.scopes.lock().expect("lock poisoned").clear();
    }
}

/// A layout bound to an engine, rendering arbitrary content templates inside
/// a fixed layout template.
///
/// Obtained from [`Engine::layout`](crate::Engine::layout). Handles are cheap
/// to create and share state per canonical layout name.
pub struct Layout {
    core: Arc<EngineCore>,
    state: Arc<LayoutState>,
}

impl Layout {
    pub(crate) fn new(core: Arc<EngineCore>, state: Arc<LayoutState>) -> Self {
        Self { core, state }
    }

    /// The layout artifact compiled in `content`'s namespace.
    ///
    /// A cache hit after the first render of this content through this
    /// layout.
    pub fn get(&self, content: &str) -> Result<CompiledTemplate, EngineError> {
        let scope = self.scope(content);
        let registry = self.core.resolve_in(&scope.namespace, &self.state.layout)?;
        Ok(CompiledTemplate::new(self.state.layout.clone(), registry))
    }

    /// Render the layout around `content` into `writer`.
    ///
    /// The `{{content this}}` placeholder in the layout body resolves and
    /// executes `content` against `data` through the root cache, splicing its
    /// text with the same failure-swallowing semantics as inline includes.
    pub fn execute<W: Write, T: Serialize>(
        &self,
        content: &str,
        writer: W,
        data: &T,
    ) -> Result<(), EngineError> {
        self.get(content)?.execute(writer, data)
    }

    /// Render the layout around `content`, returning the output.
    pub fn render<T: Serialize>(&self, content: &str, data: &T) -> Result<String, EngineError> {
        self.get(content)?.render(data)
    }

    /// Bind a helper visible only to this binding's namespaces.
    ///
    /// Existing scopes were built against the old set and are dropped; they
    /// rebuild with the new one on next use.
    pub fn bind_function(&self, name: &str, helper: Box<dyn HelperDef + Send + Sync>) {
        debug!(layout = %self.state.layout, helper = %name, "binding layout function");
        self.state
            .funcs
            .lock()
            .expect("lock poisoned")
            .push((name.to_string(), SharedHelper(Arc::from(helper))));
        self.state.clear_scopes();
    }

    /// The namespace for `content`, created on first use. Concurrent first
    /// renders race safely: the first creator wins, later callers reuse.
    fn scope(&self, content: &str) -> Arc<Scope> {
        let canonical = self.core.resolver().canonical(content).to_string();
        let mut scopes = self.state.scopes.lock().expect("lock poisoned");
        if let Some(scope) = scopes.get(&canonical) {
            return Arc::clone(scope);
        }

        debug!(layout = %self.state.layout, content = %canonical, "creating layout scope");
        let mut registry = self.core.base_clone();
        registry.register_helper(
            CONTENT_HELPER,
            Box::new(ContentHelper {
                engine: Arc::downgrade(&self.core),
                content: canonical.clone(),
            }),
        );
        for (name, helper) in self.state.funcs.lock().expect("lock poisoned").iter() {
            registry.register_helper(name, Box::new(helper.clone()));
        }

        let scope = Arc::new(Scope {
            namespace: Mutex::new(Namespace::new(registry)),
        });
        scopes.insert(canonical, Arc::clone(&scope));
        scope
    }
}
