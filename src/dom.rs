mod walk;

pub use walk::Walk;

use crate::value::{Listener, ListenerOptions, Value};
use std::{cell::RefCell, fmt::Write, rc::Rc};

/// Elements that never have children and never take a closing tag.
pub(crate) const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Identifies a node within a [`Dom`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Describes the content of a node.
#[derive(Debug)]
pub enum NodeKind {
    /// A detached root that only holds children.
    Fragment,
    /// An element with a tag name, attributes, properties and listeners.
    Element(ElementData),
    /// A run of character data.
    Text(String),
    /// A comment.
    Comment(String),
}

/// The element-specific portion of a node.
#[derive(Debug)]
pub struct ElementData {
    /// The lowercased tag name.
    pub tag: String,
    /// Attributes in authored order.
    attributes: Vec<(String, String)>,
    /// Properties assigned by bindings, never serialized.
    properties: Vec<(String, Value)>,
    /// Active event subscriptions.
    listeners: Vec<ListenerEntry>,
}

/// One event subscription on an element.
///
/// The handler lives behind a shared cell so it can be swapped without
/// changing the identity of the subscription.
#[derive(Debug)]
struct ListenerEntry {
    event: String,
    handle: ListenerHandle,
    options: ListenerOptions,
    context: Option<NodeId>,
}

/// The swappable cell behind one event subscription.
pub type ListenerHandle = Rc<RefCell<Option<Listener>>>;

/// An occurrence of an event, delivered to listeners.
#[derive(Debug, Clone)]
pub struct Event {
    /// The event name, such as `click`.
    pub name: String,
    /// The element the event was dispatched against.
    pub target: NodeId,
    /// The context node the render options associated with listeners,
    /// if any.
    pub context: Option<NodeId>,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// An arena of render tree nodes.
///
/// Every node belongs to exactly one `Dom` and is addressed by [`NodeId`].
/// Removal detaches a node from its parent but keeps its storage, so an id
/// never dangles; a detached node simply has no parent.
#[derive(Debug, Default)]
pub struct Dom {
    nodes: Vec<Node>,
    mutations: u64,
}

impl Dom {
    /// Create a new, empty Dom.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of tree mutations performed so far.
    ///
    /// Every structural change, attribute write, property write and text
    /// write counts as one mutation. Reads never do.
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });

        id
    }

    /// Create a detached fragment root.
    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    /// Create a detached element with the given tag name.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            properties: Vec::new(),
            listeners: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.push(NodeKind::Text(data.to_string()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, data: &str) -> NodeId {
        self.push(NodeKind::Comment(data.to_string()))
    }

    /// Return the kind of the given node.
    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    /// Return the tag name of the given node, if it is an element.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(data) => Some(&data.tag),
            _ => None,
        }
    }

    /// Return the character data of the given text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Text(data) => Some(data),
            _ => None,
        }
    }

    /// Replace the character data of the given text or comment node.
    pub fn set_text(&mut self, node: NodeId, data: &str) {
        match &mut self.nodes[node.0].kind {
            NodeKind::Text(existing) | NodeKind::Comment(existing) => {
                *existing = data.to_string();
                self.mutations += 1;
            }
            _ => {}
        }
    }

    /// Return the comment data of the given comment node.
    pub fn comment(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Comment(data) => Some(data),
            _ => None,
        }
    }

    /// Return the parent of the given node.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Return the children of the given node.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Return the first child of the given node.
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].children.first().copied()
    }

    /// Return the sibling immediately after the given node.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let position = siblings.iter().position(|child| *child == node)?;

        siblings.get(position + 1).copied()
    }

    /// Return the sibling immediately before the given node.
    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let position = siblings.iter().position(|child| *child == node)?;

        position.checked_sub(1).map(|p| siblings[p])
    }

    /// Append the given child to the end of the parent's children,
    /// detaching it from any previous parent first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert the given child before the reference node, or append it when
    /// no reference is given, detaching the child from any previous
    /// parent first.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);

        let position = match reference {
            Some(reference) => self.nodes[parent.0]
                .children
                .iter()
                .position(|existing| *existing == reference)
                .expect("reference node should be a child of parent"),
            None => self.nodes[parent.0].children.len(),
        };
        self.nodes[parent.0].children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
        self.mutations += 1;
    }

    /// Detach the given node from its parent.
    ///
    /// The node's own subtree is untouched, and its storage remains valid.
    pub fn remove(&mut self, node: NodeId) {
        if self.detach(node) {
            self.mutations += 1;
        }
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes[node.0].parent.take() else {
            return false;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);

        true
    }

    /// Return the value of the given attribute, if present.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(data) => data
                .attributes
                .iter()
                .find(|(existing, _)| existing == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Return the attributes of the given element in authored order.
    pub fn attributes(&self, node: NodeId) -> &[(String, String)] {
        match &self.nodes[node.0].kind {
            NodeKind::Element(data) => &data.attributes,
            _ => &[],
        }
    }

    /// Set the given attribute, replacing any existing value.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            match data
                .attributes
                .iter_mut()
                .find(|(existing, _)| existing == name)
            {
                Some((_, existing)) => *existing = value.to_string(),
                None => data.attributes.push((name.to_string(), value.to_string())),
            }
            self.mutations += 1;
        }
    }

    /// Remove the given attribute, if present.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            let before = data.attributes.len();
            data.attributes.retain(|(existing, _)| existing != name);
            if data.attributes.len() != before {
                self.mutations += 1;
            }
        }
    }

    /// Return the given property, if assigned.
    pub fn property(&self, node: NodeId, name: &str) -> Option<&Value> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(data) => data
                .properties
                .iter()
                .find(|(existing, _)| existing == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Assign the given property, replacing any existing value.
    pub fn set_property(&mut self, node: NodeId, name: &str, value: Value) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            match data
                .properties
                .iter_mut()
                .find(|(existing, _)| existing == name)
            {
                Some((_, existing)) => *existing = value,
                None => data.properties.push((name.to_string(), value)),
            }
            self.mutations += 1;
        }
    }

    /// Subscribe to an event on the given element, returning the handle
    /// whose contents may be swapped without resubscribing.
    pub fn subscribe(
        &mut self,
        node: NodeId,
        event: &str,
        listener: Listener,
        context: Option<NodeId>,
    ) -> ListenerHandle {
        let options = listener.options;
        let handle: ListenerHandle = Rc::new(RefCell::new(Some(listener)));
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            data.listeners.push(ListenerEntry {
                event: event.to_string(),
                handle: Rc::clone(&handle),
                options,
                context,
            });
        }

        handle
    }

    /// Remove the subscription owning the given handle.
    pub fn unsubscribe(&mut self, node: NodeId, event: &str, handle: &ListenerHandle) {
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            let before = data.listeners.len();
            data.listeners
                .retain(|entry| entry.event != event || !Rc::ptr_eq(&entry.handle, handle));
            if data.listeners.len() == before {
                tracing::warn!(event, "no subscription matched the given handle");
            }
        }
    }

    /// Dispatch an event against the given element, invoking every matching
    /// listener and dropping subscriptions marked `once`.
    pub fn dispatch(&mut self, node: NodeId, event: &str) {
        let mut matched = Vec::new();
        if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
            for entry in &data.listeners {
                if entry.event == event {
                    matched.push((Rc::clone(&entry.handle), entry.context));
                }
            }
            data.listeners
                .retain(|entry| entry.event != event || !entry.options.once);
        }

        for (handle, context) in matched {
            let listener = handle.borrow().clone();
            if let Some(listener) = listener {
                listener.call(&Event {
                    name: event.to_string(),
                    target: node,
                    context,
                });
            }
        }
    }

    /// Return the number of listeners subscribed on the given element.
    pub fn listener_count(&self, node: NodeId) -> usize {
        match &self.nodes[node.0].kind {
            NodeKind::Element(data) => data.listeners.len(),
            _ => 0,
        }
    }

    /// Deep copy a subtree out of another arena into this one, returning
    /// the id of the copied root.
    ///
    /// Attributes and character data are copied; properties and listeners
    /// are not, since only live trees carry them.
    pub fn import(&mut self, source: &Dom, node: NodeId) -> NodeId {
        let copied = match &source.nodes[node.0].kind {
            NodeKind::Fragment => self.create_fragment(),
            NodeKind::Element(data) => {
                let element = self.create_element(&data.tag);
                if let NodeKind::Element(target) = &mut self.nodes[element.0].kind {
                    target.attributes = data.attributes.clone();
                }
                element
            }
            NodeKind::Text(data) => self.create_text(data),
            NodeKind::Comment(data) => self.create_comment(data),
        };

        for child in &source.nodes[node.0].children {
            let child = self.import(source, *child);
            self.nodes[copied.0].children.push(child);
            self.nodes[child.0].parent = Some(copied);
        }

        copied
    }

    /// Serialize the given subtree as markup. Properties and listeners do
    /// not appear; bound attributes are written in authored order.
    pub fn markup_of(&self, node: NodeId) -> String {
        let mut buffer = String::new();
        self.write_markup(node, &mut buffer)
            .expect("writing markup to a string should not fail");

        buffer
    }

    /// Return the concatenated text content of the given subtree,
    /// ignoring comments.
    pub fn text_of(&self, node: NodeId) -> String {
        let mut buffer = String::new();
        self.collect_text(node, &mut buffer);

        buffer
    }

    fn collect_text(&self, node: NodeId, buffer: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(data) => buffer.push_str(data),
            NodeKind::Fragment | NodeKind::Element(_) => {
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, buffer);
                }
            }
            NodeKind::Comment(_) => {}
        }
    }

    fn write_markup(&self, node: NodeId, buffer: &mut String) -> std::fmt::Result {
        match &self.nodes[node.0].kind {
            NodeKind::Fragment => {
                for child in &self.nodes[node.0].children {
                    self.write_markup(*child, buffer)?;
                }
            }
            NodeKind::Element(data) => {
                write!(buffer, "<{}", data.tag)?;
                for (name, value) in &data.attributes {
                    write!(buffer, " {name}=\"{value}\"")?;
                }
                write!(buffer, ">")?;
                if VOID_ELEMENTS.contains(&data.tag.as_str()) {
                    return Ok(());
                }
                for child in &self.nodes[node.0].children {
                    self.write_markup(*child, buffer)?;
                }
                write!(buffer, "</{}>", data.tag)?;
            }
            NodeKind::Text(data) => write!(buffer, "{data}")?,
            NodeKind::Comment(data) => write!(buffer, "<!--{data}-->")?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Dom;
    use crate::value::Listener;
    use std::{cell::Cell, rc::Rc};

    #[test]
    fn test_structure() {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        let list = dom.create_element("ul");
        let first = dom.create_element("li");
        let second = dom.create_element("li");
        dom.append(root, list);
        dom.append(list, second);
        dom.insert_before(list, first, Some(second));

        assert_eq!(dom.children(list), [first, second]);
        assert_eq!(dom.next_sibling(first), Some(second));
        assert_eq!(dom.previous_sibling(second), Some(first));
        assert_eq!(dom.parent(first), Some(list));

        dom.remove(first);
        assert_eq!(dom.children(list), [second]);
        assert_eq!(dom.parent(first), None);
    }

    #[test]
    fn test_attributes() {
        let mut dom = Dom::new();
        let element = dom.create_element("input");
        dom.set_attribute(element, "type", "text");
        dom.set_attribute(element, "type", "number");

        assert_eq!(dom.attribute(element, "type"), Some("number"));

        dom.remove_attribute(element, "type");
        assert_eq!(dom.attribute(element, "type"), None);
    }

    #[test]
    fn test_markup_void_element() {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        let input = dom.create_element("input");
        dom.set_attribute(input, "type", "text");
        let br = dom.create_element("br");
        dom.append(root, input);
        dom.append(root, br);

        assert_eq!(dom.markup_of(root), "<input type=\"text\"><br>");
    }

    #[test]
    fn test_mutation_counter_ignores_reads() {
        let mut dom = Dom::new();
        let element = dom.create_element("div");
        dom.set_attribute(element, "id", "a");

        let before = dom.mutations();
        dom.attribute(element, "id");
        dom.children(element);
        assert_eq!(dom.mutations(), before);
    }

    #[test]
    fn test_import() {
        let mut source = Dom::new();
        let fragment = source.create_fragment();
        let span = source.create_element("span");
        let text = source.create_text("hello");
        source.set_attribute(span, "class", "greeting");
        source.append(fragment, span);
        source.append(span, text);

        let mut target = Dom::new();
        let copied = target.import(&source, fragment);

        assert_eq!(
            target.markup_of(copied),
            "<span class=\"greeting\">hello</span>"
        );
    }

    #[test]
    fn test_dispatch_once() {
        let mut dom = Dom::new();
        let button = dom.create_element("button");
        let count = Rc::new(Cell::new(0));

        let seen = Rc::clone(&count);
        let listener = Listener::new(move |_| seen.set(seen.get() + 1)).once();
        dom.subscribe(button, "click", listener, None);

        dom.dispatch(button, "click");
        dom.dispatch(button, "click");
        assert_eq!(count.get(), 1);
        assert_eq!(dom.listener_count(button), 0);
    }

    #[test]
    fn test_swapped_handler() {
        let mut dom = Dom::new();
        let button = dom.create_element("button");
        let seen = Rc::new(Cell::new(0));

        let first = Rc::clone(&seen);
        let handle = dom.subscribe(
            button,
            "click",
            Listener::new(move |_| first.set(1)),
            None,
        );

        let second = Rc::clone(&seen);
        *handle.borrow_mut() = Some(Listener::new(move |_| second.set(2)));

        dom.dispatch(button, "click");
        assert_eq!(seen.get(), 2);
    }
}
