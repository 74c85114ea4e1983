use crate::{
    cache::{DefaultFactory, TemplateFactory, TemplateId, Templates},
    dom::{Dom, NodeId},
    log::{error_missing_scope, Error},
    part::{NodePart, Part},
    styles::remove_styles_from_template,
    value::Value,
};
use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

/// Per-render settings.
///
/// The same options should be passed on every render into a container,
/// since parts capture some of them when they are created.
#[derive(Clone)]
pub struct RenderOptions {
    /// Cache scope for compiled templates. Renders without a scope share
    /// the unscoped cache.
    pub scope: Option<String>,
    /// Context node attached to every event delivered through listeners
    /// bound by this render.
    pub event_context: Option<NodeId>,
    /// Creates or finds compiled templates for nested descriptions.
    pub factory: Rc<dyn TemplateFactory>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scope: None,
            event_context: None,
            factory: Rc::new(DefaultFactory),
        }
    }
}

impl RenderOptions {
    /// Create RenderOptions with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache scope.
    pub fn with_scope<T: Into<String>>(mut self, scope: T) -> Self {
        self.scope = Some(scope.into());

        self
    }

    /// Set the event context node.
    pub fn with_event_context(mut self, context: NodeId) -> Self {
        self.event_context = Some(context);

        self
    }

    /// Set the template factory.
    pub fn with_factory(mut self, factory: Rc<dyn TemplateFactory>) -> Self {
        self.factory = factory;

        self
    }
}

impl Debug for RenderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("scope", &self.scope)
            .field("event_context", &self.event_context)
            .finish_non_exhaustive()
    }
}

/// Everything a part needs while committing: the live tree, the compiled
/// template store, and the options for the current render.
pub struct RenderContext<'ctx> {
    pub dom: &'ctx mut Dom,
    pub templates: &'ctx mut Templates,
    pub options: &'ctx RenderOptions,
}

/// The rendering engine.
///
/// An `Engine` owns the compiled template store and one root part per
/// container it has rendered into. Rendering the same description into
/// the same container again updates the existing content in place.
#[derive(Default)]
pub struct Engine {
    templates: Templates,
    roots: HashMap<NodeId, NodePart>,
    prepared: HashSet<(String, TemplateId)>,
    scope_css: HashMap<String, String>,
}

impl Engine {
    /// Create a new Engine with an empty template store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled template store.
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Return mutable access to the compiled template store.
    pub fn templates_mut(&mut self) -> &mut Templates {
        &mut self.templates
    }

    /// Render a value into the given container.
    ///
    /// The first render into a container clears it and installs a root
    /// part; later renders reuse that part, so unchanged values touch
    /// nothing and changed values update the smallest possible region.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a template fails to compile or a part
    /// fails to commit.
    ///
    /// # Examples
    ///
    /// ```
    /// use weft::{html, Dom, Engine, RenderOptions, Strings, Value};
    ///
    /// let mut engine = Engine::new();
    /// let mut dom = Dom::new();
    /// let container = dom.create_element("main");
    ///
    /// let strings = Strings::new(["<h1>", "</h1>"]);
    /// let greeting = html(strings, vec![Value::from("hello")]);
    /// engine.render(
    ///     &mut dom,
    ///     Value::Template(greeting),
    ///     container,
    ///     &RenderOptions::default(),
    /// )?;
    ///
    /// assert_eq!(dom.text_of(container), "hello");
    /// # Ok::<(), weft::log::Error>(())
    /// ```
    pub fn render(
        &mut self,
        dom: &mut Dom,
        value: Value,
        container: NodeId,
        options: &RenderOptions,
    ) -> Result<(), Error> {
        let mut part = match self.roots.remove(&container) {
            Some(part) => part,
            None => {
                while let Some(child) = dom.first_child(container) {
                    dom.remove(child);
                }
                tracing::debug!(?container, "installed root part");

                NodePart::append_into(dom, container)
            }
        };

        part.set_value(value);
        let committed = part.commit(&mut RenderContext {
            dom,
            templates: &mut self.templates,
            options,
        });
        self.roots.insert(container, part);

        committed
    }

    /// Hoist every `<style>` out of the given compiled template and
    /// collect its text under the given scope.
    ///
    /// Preparing the same template for the same scope twice is a no-op
    /// beyond a warning, so styles are never collected double.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the scope name is empty.
    pub fn prepare_template_styles(
        &mut self,
        template: TemplateId,
        scope: &str,
    ) -> Result<(), Error> {
        if scope.is_empty() {
            return Err(error_missing_scope());
        }
        if !self.prepared.insert((scope.to_string(), template)) {
            tracing::warn!(scope, "styles already prepared for this template");
            return Ok(());
        }

        let styles = remove_styles_from_template(self.templates.get_mut(template));
        let collected = self.scope_css.entry(scope.to_string()).or_default();
        for css in styles {
            collected.push_str(&css);
            collected.push('\n');
        }

        Ok(())
    }

    /// Return the style text collected so far for the given scope.
    pub fn scope_styles(&self, scope: &str) -> Option<&str> {
        self.scope_css.get(scope).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, RenderOptions};
    use crate::{
        dom::Dom,
        template::{html, Strings},
        value::{Listener, Value},
    };
    use std::{cell::Cell, rc::Rc};

    fn helper_render(engine: &mut Engine, dom: &mut Dom, container: crate::dom::NodeId, text: &str) {
        let strings = Strings::new(["<p>", "</p>"]);
        engine
            .render(
                dom,
                Value::Template(html(strings, vec![Value::from(text)])),
                container,
                &RenderOptions::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_first_render_clears_container() {
        let mut engine = Engine::new();
        let mut dom = Dom::new();
        let container = dom.create_element("main");
        let stale = dom.create_text("loading");
        dom.append(container, stale);

        helper_render(&mut engine, &mut dom, container, "ready");
        assert_eq!(dom.text_of(container), "ready");
    }

    #[test]
    fn test_second_render_updates_in_place() {
        let mut engine = Engine::new();
        let mut dom = Dom::new();
        let container = dom.create_element("main");

        helper_render(&mut engine, &mut dom, container, "one");
        let paragraph = dom
            .children(container)
            .iter()
            .copied()
            .find(|node| dom.tag(*node) == Some("p"))
            .unwrap();

        helper_render(&mut engine, &mut dom, container, "two");
        assert_eq!(dom.text_of(paragraph), "two");
        assert_eq!(engine.templates().len(), 1);
    }

    #[test]
    fn test_unchanged_render_mutates_nothing() {
        let mut engine = Engine::new();
        let mut dom = Dom::new();
        let container = dom.create_element("main");
        let strings = Strings::new(["<p>", "</p>"]);

        let description = || html(strings.clone(), vec![Value::from("same")]);
        engine
            .render(
                &mut dom,
                Value::Template(description()),
                container,
                &RenderOptions::default(),
            )
            .unwrap();

        let before = dom.mutations();
        engine
            .render(
                &mut dom,
                Value::Template(description()),
                container,
                &RenderOptions::default(),
            )
            .unwrap();
        assert_eq!(dom.mutations(), before);
    }

    #[test]
    fn test_template_swap_replaces_content() {
        let mut engine = Engine::new();
        let mut dom = Dom::new();
        let container = dom.create_element("main");

        let first = Strings::new(["<p>", "</p>"]);
        let second = Strings::new(["<h2>", "</h2>"]);
        engine
            .render(
                &mut dom,
                Value::Template(html(first, vec![Value::from("a")])),
                container,
                &RenderOptions::default(),
            )
            .unwrap();
        engine
            .render(
                &mut dom,
                Value::Template(html(second, vec![Value::from("b")])),
                container,
                &RenderOptions::default(),
            )
            .unwrap();

        let tags: Vec<_> = dom
            .children(container)
            .iter()
            .filter_map(|node| dom.tag(*node))
            .collect();
        assert_eq!(tags, ["h2"]);
        assert_eq!(engine.templates().len(), 2);
    }

    #[test]
    fn test_event_context_reaches_listener() {
        let mut engine = Engine::new();
        let mut dom = Dom::new();
        let container = dom.create_element("main");
        let host = dom.create_element("x-host");

        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);
        let strings = Strings::new(["<button @click=", "></button>"]);
        let listener = Listener::new(move |event| sink.set(event.context));
        engine
            .render(
                &mut dom,
                Value::Template(html(strings, vec![Value::Listener(listener)])),
                container,
                &RenderOptions::default().with_event_context(host),
            )
            .unwrap();

        let button = dom
            .children(container)
            .iter()
            .copied()
            .find(|node| dom.tag(*node) == Some("button"))
            .unwrap();
        dom.dispatch(button, "click");
        assert_eq!(seen.get(), Some(host));
    }

    #[test]
    fn test_prepare_styles() {
        let mut engine = Engine::new();
        let description = html(
            Strings::new(["<style>p { margin: 0 }</style><p>", "</p>"]),
            vec![Value::Nothing],
        );
        let id = engine.templates_mut().obtain(&description, Some("x-card")).unwrap();

        engine.prepare_template_styles(id, "x-card").unwrap();
        assert_eq!(
            engine.scope_styles("x-card"),
            Some("p { margin: 0 }\n")
        );

        // Preparing again neither errors nor collects twice.
        engine.prepare_template_styles(id, "x-card").unwrap();
        assert_eq!(
            engine.scope_styles("x-card"),
            Some("p { margin: 0 }\n")
        );
    }

    #[test]
    fn test_prepare_styles_requires_scope() {
        let mut engine = Engine::new();
        let description = html(Strings::new(["<p>x</p>"]), vec![]);
        let id = engine.templates_mut().obtain(&description, None).unwrap();

        let error = engine.prepare_template_styles(id, "").unwrap_err();
        assert_eq!(error.get_reason(), "missing scope");
    }
}
