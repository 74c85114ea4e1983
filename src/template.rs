use crate::{
    part::{DefaultProcessor, Processor},
    value::Value,
};
use std::{
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

/// Distinguishes plain markup from vector markup, which parses in a
/// separate namespace and is cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkupKind {
    /// Ordinary markup.
    Markup,
    /// Vector graphics markup.
    Vector,
}

/// The static chunks of a template, shared by every description created
/// from the same source.
///
/// Identity is the address of the shared allocation, so descriptions built
/// from one `Strings` hit the template cache without comparing content.
#[derive(Debug, Clone)]
pub struct Strings(Rc<Vec<String>>);

impl Strings {
    /// Create a new Strings from the given chunks.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Rc::new(chunks.into_iter().map(Into::into).collect()))
    }

    /// Return the address of the shared allocation.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Return the static chunks.
    pub fn chunks(&self) -> &[String] {
        &self.0
    }

    /// Join the chunks with the given separator.
    pub fn join_with(&self, separator: &str) -> String {
        self.0.join(separator)
    }
}

impl<const N: usize> From<[&str; N]> for Strings {
    fn from(chunks: [&str; N]) -> Self {
        Self::new(chunks)
    }
}

/// A template paired with the values for one render.
///
/// Descriptions are cheap to create and carry no tree of their own; the
/// engine compiles the static chunks once and reuses the result.
#[derive(Clone)]
pub struct Description {
    /// The static chunks.
    pub strings: Strings,
    /// The dynamic values, one per gap between chunks.
    pub values: Vec<Value>,
    /// The namespace the chunks parse in.
    pub kind: MarkupKind,
    /// Creates the parts that apply values to an instance.
    pub processor: Rc<dyn Processor>,
}

impl Description {
    /// Create a Description with the given processor.
    pub fn with_processor<S: Into<Strings>>(
        strings: S,
        values: Vec<Value>,
        kind: MarkupKind,
        processor: Rc<dyn Processor>,
    ) -> Self {
        Self {
            strings: strings.into(),
            values,
            kind,
            processor,
        }
    }
}

impl Debug for Description {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Description")
            .field("strings", &self.strings)
            .field("values", &self.values)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Describe a render of ordinary markup.
///
/// # Examples
///
/// ```
/// use weft::{html, Value};
///
/// let strings = weft::Strings::new(["<p>", "</p>"]);
/// let greeting = html(strings, vec![Value::from("hello")]);
/// assert_eq!(greeting.values.len(), 1);
/// ```
pub fn html<S: Into<Strings>>(strings: S, values: Vec<Value>) -> Description {
    Description::with_processor(
        strings,
        values,
        MarkupKind::Markup,
        Rc::new(DefaultProcessor),
    )
}

/// Describe a render of vector graphics markup.
pub fn svg<S: Into<Strings>>(strings: S, values: Vec<Value>) -> Description {
    Description::with_processor(
        strings,
        values,
        MarkupKind::Vector,
        Rc::new(DefaultProcessor),
    )
}
