//! Helper bindings shared by every namespace.
//!
//! Both composition bridges are handlebars helpers implemented as capability
//! objects holding a weak engine reference, so they keep working when the
//! active namespace is swapped out from under a running render.

use std::sync::{Arc, Weak};

use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use serde_json::Value;
use tracing::warn;

use crate::engine::EngineCore;

/// Name of the inline sub-template helper bound into every namespace.
pub const RENDER_HELPER: &str = "render";

/// Name of the layout placeholder helper bound into layout namespaces.
pub const CONTENT_HELPER: &str = "content";

/// `{{render "name"}}` / `{{render "name" this}}`: resolve a template through
/// the root cache and splice its output at the call site.
///
/// Inline includes are best-effort by contract: any resolution or execution
/// failure splices the empty string instead of failing the outer render.
pub(crate) struct RenderHelper {
    pub engine: Weak<EngineCore>,
}

impl HelperDef for RenderHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let Some(name) = h.param(0).and_then(|p| p.value().as_str().map(str::to_owned)) else {
            warn!(helper = RENDER_HELPER, "missing template name parameter, splicing nothing");
            return Ok(());
        };
        let data = h.param(1).map(|p| p.value().clone()).unwrap_or(Value::Null);
        splice(&self.engine, &name, &data, out)
    }
}

/// `{{content this}}`: the layout placeholder. Renders the content template
/// this namespace is bound to, against the data of the enclosing call.
pub(crate) struct ContentHelper {
    pub engine: Weak<EngineCore>,
    pub content: String,
}

impl HelperDef for ContentHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let data = h.param(0).map(|p| p.value().clone()).unwrap_or(Value::Null);
        splice(&self.engine, &self.content, &data, out)
    }
}

/// Render `name` through the root cache and write its text unescaped.
/// Failures are logged and swallowed; the enclosing render continues.
fn splice(
    engine: &Weak<EngineCore>,
    name: &str,
    data: &Value,
    out: &mut dyn Output,
) -> HelperResult {
    let Some(engine) = engine.upgrade() else {
        // engine dropped mid-render, nothing to splice
        return Ok(());
    };
    match engine.render_nested(name, data) {
        Ok(text) => out.write(&text)?,
        Err(error) => {
            warn!(template = %name, %error, "nested render failed, splicing empty string");
        }
    }
    Ok(())
}

/// Adapter sharing one user-supplied helper across namespaces.
///
/// The registry takes helpers by `Box`, but a layout binding has to hand the
/// same helper to every lazily created content scope.
#[derive(Clone)]
pub(crate) struct SharedHelper(pub Arc<dyn HelperDef + Send + Sync>);

impl HelperDef for SharedHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        self.0.call(h, r, ctx, rc, out)
    }
}
