mod attribute;
mod event;
mod node;

pub use attribute::{AttributeCommitter, BooleanAttributePart, CommitterKind};
pub(crate) use attribute::commit_shared;
pub use event::EventPart;
pub use node::NodePart;

use crate::{
    dom::{Dom, NodeId},
    log::Error,
    value::Value,
};

/// The directive-facing surface of any binding.
///
/// A directive receives the part it was staged into and may stage a
/// replacement value through it. Whatever is staged when the directive
/// returns commits in the same pass; staging nothing leaves the
/// previously committed content alone.
pub trait Part {
    /// Stage a value into the part.
    fn set_value(&mut self, value: Value);

    /// Return the currently staged value.
    fn staged(&self) -> &Value;
}

/// The binding object created for one attribute-position expression.
pub enum AttributeBinding {
    /// A committer coalescing one or more bindings into a single
    /// attribute or property write.
    Committer(AttributeCommitter),
    /// A presence toggle for a boolean attribute.
    Boolean(BooleanAttributePart),
    /// An event subscription.
    Event(EventPart),
}

/// Creates the parts that connect an instance to the live tree.
///
/// The processor is chosen per description, so embedders can reinterpret
/// binding names without touching the compiler.
pub trait Processor {
    /// Create the part for a binding at node position, anchored at the
    /// given node.
    fn text_part(&self, dom: &Dom, anchor: NodeId) -> NodePart;

    /// Create the binding for an attribute-position expression on the
    /// given element.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the authored name and surrounding
    /// literals cannot form a valid binding.
    fn attribute_binding(
        &self,
        element: NodeId,
        name: &str,
        strings: &[String],
        context: Option<NodeId>,
    ) -> Result<AttributeBinding, Error>;
}

/// The standard processor.
///
/// A leading `.` binds a property, `@` an event, `?` a boolean attribute,
/// and anything else an attribute.
#[derive(Debug, Default)]
pub struct DefaultProcessor;

impl Processor for DefaultProcessor {
    fn text_part(&self, dom: &Dom, anchor: NodeId) -> NodePart {
        let start = dom
            .previous_sibling(anchor)
            .expect("node binding anchors always follow a sibling");

        NodePart::spanning(start, anchor)
    }

    fn attribute_binding(
        &self,
        element: NodeId,
        name: &str,
        strings: &[String],
        context: Option<NodeId>,
    ) -> Result<AttributeBinding, Error> {
        match name.as_bytes().first().copied() {
            Some(b'.') => Ok(AttributeBinding::Committer(AttributeCommitter::new(
                element,
                &name[1..],
                strings,
                CommitterKind::Property,
            ))),
            Some(b'@') => Ok(AttributeBinding::Event(EventPart::new(
                element,
                &name[1..],
                strings,
                context,
            )?)),
            Some(b'?') => Ok(AttributeBinding::Boolean(BooleanAttributePart::new(
                element,
                &name[1..],
                strings,
            )?)),
            _ => Ok(AttributeBinding::Committer(AttributeCommitter::new(
                element,
                name,
                strings,
                CommitterKind::Attribute,
            ))),
        }
    }
}
