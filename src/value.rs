use crate::{
    directive::Directive,
    dom::{Event, NodeId},
    log::Error,
    template::Description,
};
use serde::Serialize;
use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

/// A renderable value flowing into a binding.
#[derive(Clone)]
pub enum Value {
    /// Plain data rendered as text.
    Scalar(serde_json::Value),
    /// An existing node adopted into the part's span.
    Node(NodeId),
    /// A nested template description, rendered in place.
    Template(Description),
    /// A sequence of values, reconciled positionally.
    List(Vec<Value>),
    /// A deferred computation that writes through a part.
    Directive(Rc<dyn Directive>),
    /// An event handler, valid only for event bindings.
    Listener(Listener),
    /// A sentinel that leaves whatever is committed untouched.
    NoChange,
    /// A sentinel that clears the binding entirely.
    Nothing,
}

impl Value {
    /// Create a Value from anything serializable.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn serialize<T: Serialize>(value: T) -> Result<Self, Error> {
        let scalar = serde_json::to_value(value)
            .map_err(|error| Error::build(error.to_string()))?;

        Ok(Self::Scalar(scalar))
    }

    /// Return true if the value is truthy.
    ///
    /// Text is truthy when non-empty, numbers when non-zero, null never.
    /// Every non-scalar value is truthy except [`Value::Nothing`].
    pub fn truthy(&self) -> bool {
        match self {
            Self::Scalar(scalar) => match scalar {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                serde_json::Value::String(s) => !s.is_empty(),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
            },
            Self::Nothing => false,
            _ => true,
        }
    }

    /// Return the text form of the value, as written into attributes
    /// and text nodes. Null and non-scalar values render as nothing.
    pub fn as_text(&self) -> String {
        match self {
            Self::Scalar(scalar) => match scalar {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            _ => String::new(),
        }
    }

    /// Return true if the value is a primitive committed as text,
    /// meaning a scalar, [`Value::Nothing`] or [`Value::NoChange`].
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Nothing | Self::NoChange)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => f.debug_tuple("Scalar").field(scalar).finish(),
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::Template(description) => {
                f.debug_tuple("Template").field(description).finish()
            }
            Self::List(values) => f.debug_tuple("List").field(values).finish(),
            Self::Directive(_) => f.write_str("Directive"),
            Self::Listener(listener) => f.debug_tuple("Listener").field(listener).finish(),
            Self::NoChange => f.write_str("NoChange"),
            Self::Nothing => f.write_str("Nothing"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(left), Self::Scalar(right)) => left == right,
            (Self::Node(left), Self::Node(right)) => left == right,
            (Self::Listener(left), Self::Listener(right)) => left.same_handler(right),
            (Self::NoChange, Self::NoChange) => true,
            (Self::Nothing, Self::Nothing) => true,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(serde_json::Value::String(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Scalar(serde_json::Value::Bool(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Scalar(serde_json::Value::Number(value.into()))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Scalar(serde_json::Value::Number(value.into()))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Scalar(serde_json::Value::Number(value.into()))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        match serde_json::Number::from_f64(value) {
            Some(number) => Self::Scalar(serde_json::Value::Number(number)),
            None => Self::Scalar(serde_json::Value::Null),
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<Description> for Value {
    fn from(value: Description) -> Self {
        Self::Template(value)
    }
}

impl From<Listener> for Value {
    fn from(value: Listener) -> Self {
        Self::Listener(value)
    }
}

/// Options describing how a listener is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Deliver during the capture phase.
    pub capture: bool,
    /// Drop the subscription after the first delivery.
    pub once: bool,
    /// The listener promises not to cancel the event.
    pub passive: bool,
}

/// An event handler paired with its attachment options.
#[derive(Clone)]
pub struct Listener {
    handler: Rc<dyn Fn(&Event)>,
    pub(crate) options: ListenerOptions,
}

impl Listener {
    /// Create a new Listener with default options.
    pub fn new<F: Fn(&Event) + 'static>(handler: F) -> Self {
        Self {
            handler: Rc::new(handler),
            options: ListenerOptions::default(),
        }
    }

    /// Mark the listener capture-phase.
    pub fn capture(mut self) -> Self {
        self.options.capture = true;
        self
    }

    /// Drop the subscription after the first delivery.
    pub fn once(mut self) -> Self {
        self.options.once = true;
        self
    }

    /// Mark the listener passive.
    pub fn passive(mut self) -> Self {
        self.options.passive = true;
        self
    }

    /// Return the attachment options.
    pub fn options(&self) -> ListenerOptions {
        self.options
    }

    /// Invoke the handler with the given event.
    pub fn call(&self, event: &Event) {
        (self.handler)(event)
    }

    /// Return true if both listeners share one handler.
    pub fn same_handler(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.handler, &other.handler)
    }
}

impl Debug for Listener {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}
