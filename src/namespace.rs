//! The namespace: pergola's unit of caching.
//!
//! A namespace is one `Handlebars` registry value holding every compiled
//! template loaded so far plus the helper bindings they share. Templates in
//! one namespace can reference each other's declared named bodies; templates
//! in different namespaces cannot.

use std::sync::Arc;

use handlebars::Handlebars;
use handlebars::template::{Parameter, Template, TemplateElement};
use tracing::debug;

/// A compiled-template scope.
///
/// The registry is shared as an `Arc` snapshot: renders run against the
/// snapshot they started with, so a concurrent replacement never tears a
/// running execution. Extension is copy-on-write, invalidation is a single
/// swap back to the helper-only base.
pub(crate) struct Namespace {
    registry: Arc<Handlebars<'static>>,
}

impl Namespace {
    pub fn new(registry: Handlebars<'static>) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Handlebars<'static>> {
        Arc::clone(&self.registry)
    }

    /// Lookup is hit or absent, nothing partial.
    pub fn contains(&self, name: &str) -> bool {
        self.registry.get_template(name).is_some()
    }

    /// Register `template` under `name`, along with every named body it
    /// declares, producing a new snapshot.
    pub fn install(&mut self, name: &str, mut template: Template) {
        let mut next = (*self.registry).clone();
        for (body_name, body) in declared_bodies(&template) {
            debug!(template = %name, body = %body_name, "registering declared named body");
            next.register_template(&body_name, body);
        }
        template.name = Some(name.to_string());
        next.register_template(name, template);
        self.registry = Arc::new(next);
    }

    /// Drop every cached template, keeping only the bindings in `base`.
    pub fn reset(&mut self, base: Handlebars<'static>) {
        self.registry = Arc::new(base);
    }
}

/// Top-level `{{#*inline "name"}}...{{/inline}}` declarations of a parsed
/// template.
///
/// The dialect scopes inline partials to a single execution. Promoting the
/// top-level ones to namespace entries is what lets one file's declarations
/// serve another file's references.
fn declared_bodies(template: &Template) -> Vec<(String, Template)> {
    let mut bodies = Vec::new();
    for element in &template.elements {
        let TemplateElement::DecoratorBlock(block) = element else {
            continue;
        };
        if block.name.as_name() != Some("inline") {
            continue;
        }
        let Some(Parameter::Literal(value)) = block.params.first() else {
            continue;
        };
        let (Some(name), Some(body)) = (value.as_str(), block.template.as_ref()) else {
            continue;
        };
        let mut body = body.clone();
        body.name = Some(name.to_string());
        bodies.push((name.to_string(), body));
    }
    bodies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Template {
        Template::compile(source).expect("template should compile")
    }

    #[test]
    fn test_declared_bodies_extracted() {
        let template = compile("{{#*inline \"fromSub\"}}X{{/inline}}Y");
        let bodies = declared_bodies(&template);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].0, "fromSub");
    }

    #[test]
    fn test_plain_template_declares_nothing() {
        let template = compile("<h1>{{this}}</h1>");
        assert!(declared_bodies(&template).is_empty());
    }

    #[test]
    fn test_install_registers_template_and_bodies() {
        let mut namespace = Namespace::new(Handlebars::new());
        namespace.install("sub", compile("{{#*inline \"fromSub\"}}X{{/inline}}Y"));

        assert!(namespace.contains("sub"));
        assert!(namespace.contains("fromSub"));
        assert!(!namespace.contains("other"));

        let snapshot = namespace.snapshot();
        assert_eq!(snapshot.render("fromSub", &serde_json::Value::Null).unwrap(), "X");
    }

    #[test]
    fn test_snapshot_is_stable_until_install() {
        let mut namespace = Namespace::new(Handlebars::new());
        let before = namespace.snapshot();
        assert!(Arc::ptr_eq(&before, &namespace.snapshot()));

        namespace.install("a", compile("A"));
        assert!(!Arc::ptr_eq(&before, &namespace.snapshot()));
        // the old snapshot still renders what it had (nothing)
        assert!(before.get_template("a").is_none());
    }

    #[test]
    fn test_reset_drops_templates() {
        let mut namespace = Namespace::new(Handlebars::new());
        namespace.install("a", compile("A"));
        namespace.reset(Handlebars::new());
        assert!(!namespace.contains("a"));
    }
}
