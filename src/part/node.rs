use super::Part;
use crate::{
    directive::MAX_DIRECTIVE_TURNS,
    dom::{Dom, NodeId},
    engine::RenderContext,
    instance::Instance,
    log::{error_directive_loop, Error, INVALID_BINDING},
    template::Description,
    value::Value,
};
use std::{mem, rc::Rc};

/// What a [`NodePart`] has most recently committed.
#[derive(Debug)]
enum Committed {
    /// Nothing committed yet.
    Unset,
    /// A text node holding the given scalar.
    Text(serde_json::Value),
    /// An adopted node.
    Node(NodeId),
    /// A nested template instance.
    Instance(Box<Instance>),
    /// One child part per list item, in order.
    List(Vec<NodePart>),
    /// The span was cleared.
    Nothing,
}

/// A binding controlling the content between two anchor nodes.
///
/// The anchors are exclusive: committed content lives strictly between
/// `start` and `end`, and neither anchor is ever touched. Sibling parts
/// may share an anchor, so clearing one part never disturbs another.
#[derive(Debug)]
pub struct NodePart {
    start: NodeId,
    end: NodeId,
    committed: Committed,
    pending: Value,
}

impl Part for NodePart {
    fn set_value(&mut self, value: Value) {
        self.pending = value;
    }

    fn staged(&self) -> &Value {
        &self.pending
    }
}

impl NodePart {
    /// Create a NodePart spanning the given anchors.
    pub fn spanning(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            committed: Committed::Unset,
            pending: Value::NoChange,
        }
    }

    /// Create a NodePart at the end of the given container, appending a
    /// fresh pair of anchors.
    pub fn append_into(dom: &mut Dom, container: NodeId) -> Self {
        let start = dom.create_comment("");
        let end = dom.create_comment("");
        dom.append(container, start);
        dom.append(container, end);

        Self::spanning(start, end)
    }

    /// Create a NodePart at the end of the given part's span, sharing no
    /// anchors with siblings.
    fn new_inside(dom: &mut Dom, container: &NodePart) -> Self {
        let start = dom.create_comment("");
        let end = dom.create_comment("");
        container.insert(dom, start);
        container.insert(dom, end);

        Self::spanning(start, end)
    }

    /// Create a NodePart directly after the given part, sharing one anchor
    /// with it.
    ///
    /// The new part takes over the prior part's end anchor and hands it a
    /// fresh one, so the two spans stay adjacent however either commits.
    fn new_after(dom: &mut Dom, prior: &mut NodePart) -> Self {
        let boundary = dom.create_comment("");
        prior.insert(dom, boundary);
        let end = mem::replace(&mut prior.end, boundary);

        Self::spanning(boundary, end)
    }

    /// Return the start anchor.
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// Return the end anchor.
    pub fn end(&self) -> NodeId {
        self.end
    }

    /// Insert the given node at the end of the span.
    fn insert(&self, dom: &mut Dom, node: NodeId) {
        let parent = dom
            .parent(self.end)
            .expect("part anchors stay attached while the part is live");
        dom.insert_before(parent, node, Some(self.end));
    }

    /// Commit the staged value into the span.
    ///
    /// A value equal to what is already committed performs no tree
    /// mutation at all.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a directive fails or loops, when a nested
    /// template fails to compile, or when the staged value cannot appear
    /// at node position.
    pub fn commit(&mut self, cx: &mut RenderContext<'_>) -> Result<(), Error> {
        // A detached part, cleared by an ancestor, commits nothing.
        if cx.dom.parent(self.start).is_none() {
            return Ok(());
        }

        let mut turns = 0;
        loop {
            let directive = match &self.pending {
                Value::Directive(directive) => Rc::clone(directive),
                _ => break,
            };
            self.pending = Value::NoChange;
            directive.run(self, cx)?;
            turns += 1;
            if turns > MAX_DIRECTIVE_TURNS {
                return Err(error_directive_loop());
            }
        }

        match mem::replace(&mut self.pending, Value::NoChange) {
            Value::NoChange => Ok(()),
            Value::Scalar(scalar) => {
                self.commit_text(cx.dom, scalar);
                Ok(())
            }
            Value::Node(node) => {
                self.commit_node(cx.dom, node);
                Ok(())
            }
            Value::Template(description) => self.commit_template(description, cx),
            Value::List(items) => self.commit_list(items, cx),
            Value::Nothing => {
                self.clear(cx.dom);
                self.committed = Committed::Nothing;
                Ok(())
            }
            Value::Listener(_) | Value::Directive(_) => Err(Error::build(INVALID_BINDING)
                .with_help("a listener cannot be rendered at node position")),
        }
    }

    /// Commit a scalar as a text node, reusing the existing text node
    /// when the span already holds exactly one.
    fn commit_text(&mut self, dom: &mut Dom, scalar: serde_json::Value) {
        if matches!(&self.committed, Committed::Text(previous) if *previous == scalar) {
            return;
        }

        let text = Value::Scalar(scalar.clone()).as_text();
        match (dom.next_sibling(self.start), dom.previous_sibling(self.end)) {
            (Some(only), Some(last)) if only == last && dom.text(only).is_some() => {
                dom.set_text(only, &text);
            }
            _ => {
                self.clear(dom);
                let created = dom.create_text(&text);
                self.insert(dom, created);
            }
        }
        self.committed = Committed::Text(scalar);
    }

    /// Commit an adopted node, moving it into the span.
    fn commit_node(&mut self, dom: &mut Dom, node: NodeId) {
        if matches!(&self.committed, Committed::Node(previous) if *previous == node) {
            return;
        }

        self.clear(dom);
        self.insert(dom, node);
        self.committed = Committed::Node(node);
    }

    /// Commit a nested template, updating the committed instance in place
    /// when it came from the same template definition.
    fn commit_template(
        &mut self,
        description: Description,
        cx: &mut RenderContext<'_>,
    ) -> Result<(), Error> {
        let scope = cx.options.scope.clone();
        let id = cx
            .options
            .factory
            .obtain(cx.templates, &description, scope.as_deref())?;

        if let Committed::Instance(instance) = &mut self.committed {
            if instance.template() == id {
                return instance.update(description.values, cx);
            }
        }

        let (mut instance, fragment) = Instance::instantiate(id, &description.processor, cx)?;
        instance.update(description.values, cx)?;
        self.clear(cx.dom);
        while let Some(child) = cx.dom.first_child(fragment) {
            self.insert(cx.dom, child);
        }
        self.committed = Committed::Instance(Box::new(instance));

        Ok(())
    }

    /// Commit a list of values positionally, reusing the child part at
    /// each position and trimming leftovers.
    fn commit_list(&mut self, items: Vec<Value>, cx: &mut RenderContext<'_>) -> Result<(), Error> {
        let mut parts = match mem::replace(&mut self.committed, Committed::Unset) {
            Committed::List(parts) => parts,
            _ => {
                self.clear(cx.dom);
                Vec::new()
            }
        };

        let count = items.len();
        for (position, item) in items.into_iter().enumerate() {
            if position == parts.len() {
                let part = if position == 0 {
                    NodePart::new_inside(cx.dom, self)
                } else {
                    NodePart::new_after(cx.dom, &mut parts[position - 1])
                };
                parts.push(part);
            }
            parts[position].set_value(item);
            parts[position].commit(cx)?;
        }

        if count < parts.len() {
            let from = match count.checked_sub(1) {
                Some(last) => parts[last].end,
                None => self.start,
            };
            parts.truncate(count);
            clear_between(cx.dom, from, self.end);
        }
        self.committed = Committed::List(parts);

        Ok(())
    }

    /// Remove everything strictly between the anchors.
    fn clear(&mut self, dom: &mut Dom) {
        clear_between(dom, self.start, self.end);
    }
}

/// Remove every node strictly between the given siblings.
fn clear_between(dom: &mut Dom, start: NodeId, end: NodeId) {
    while let Some(node) = dom.next_sibling(start) {
        if node == end {
            break;
        }
        dom.remove(node);
    }
}

#[cfg(test)]
mod tests {
    use super::NodePart;
    use crate::{
        cache::Templates,
        directive::directive,
        dom::Dom,
        engine::{RenderContext, RenderOptions},
        part::Part,
        template::{html, Strings},
        value::Value,
    };

    fn helper_context<'ctx>(
        dom: &'ctx mut Dom,
        templates: &'ctx mut Templates,
        options: &'ctx RenderOptions,
    ) -> RenderContext<'ctx> {
        RenderContext {
            dom,
            templates,
            options,
        }
    }

    fn helper_span(dom: &mut Dom) -> (crate::dom::NodeId, NodePart) {
        let container = dom.create_element("div");
        let part = NodePart::append_into(dom, container);

        (container, part)
    }

    #[test]
    fn test_commit_text() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (container, mut part) = helper_span(&mut dom);

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::from("one"));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "one");

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::from("two"));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "two");
    }

    #[test]
    fn test_equal_text_does_not_mutate() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (_, mut part) = helper_span(&mut dom);

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::from("same"));
        part.commit(&mut cx).unwrap();

        let before = dom.mutations();
        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::from("same"));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.mutations(), before);
    }

    #[test]
    fn test_commit_nothing_clears() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (container, mut part) = helper_span(&mut dom);

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::from("text"));
        part.commit(&mut cx).unwrap();

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::Nothing);
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "");
    }

    #[test]
    fn test_list_reuses_parts() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (container, mut part) = helper_span(&mut dom);

        let items = |texts: &[&str]| {
            Value::List(texts.iter().map(|text| Value::from(*text)).collect())
        };

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(items(&["a", "b", "c"]));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "abc");

        // Shrinking keeps the leading parts and trims the rest.
        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(items(&["x", "y"]));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "xy");

        // Growing appends a part after the survivors.
        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(items(&["x", "y", "z", "w"]));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "xyzw");
    }

    #[test]
    fn test_list_position_is_stable() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (_, mut part) = helper_span(&mut dom);

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::List(vec![Value::from("a"), Value::from("b")]));
        part.commit(&mut cx).unwrap();
        let before = dom.mutations();

        // Unchanged items at unchanged positions write nothing.
        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::List(vec![Value::from("a"), Value::from("b")]));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.mutations(), before);
    }

    #[test]
    fn test_commit_template() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (container, mut part) = helper_span(&mut dom);

        let strings = Strings::new(["<b>", "</b>"]);
        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::Template(html(
            strings.clone(),
            vec![Value::from("hi")],
        )));
        part.commit(&mut cx).unwrap();

        let bold = dom
            .children(container)
            .iter()
            .copied()
            .find(|node| dom.tag(*node) == Some("b"))
            .unwrap();
        assert_eq!(dom.text_of(bold), "hi");

        // A second render from the same definition updates in place.
        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::Template(html(strings, vec![Value::from("bye")])));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(bold), "bye");
        assert_eq!(templates.len(), 1);
    }

    #[test]
    fn test_directive_stages_in_pass() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (container, mut part) = helper_span(&mut dom);

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(directive(|part, _| {
            part.set_value(Value::from("resolved"));
            Ok(())
        }));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "resolved");
    }

    #[test]
    fn test_directive_declining_keeps_content() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (container, mut part) = helper_span(&mut dom);

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(Value::from("kept"));
        part.commit(&mut cx).unwrap();

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(directive(|_, _| Ok(())));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.text_of(container), "kept");
    }

    #[test]
    fn test_directive_cycle_is_an_error() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let (_, mut part) = helper_span(&mut dom);

        fn looping() -> Value {
            directive(|part, _| {
                part.set_value(looping());
                Ok(())
            })
        }

        let mut cx = helper_context(&mut dom, &mut templates, &options);
        part.set_value(looping());
        let error = part.commit(&mut cx).unwrap_err();
        assert_eq!(error.get_reason(), "invalid directive");
    }
}
