use crate::{engine::RenderContext, log::Error, part::Part, value::Value};
use std::rc::Rc;

/// Upper bound on how many nested directives one binding resolves in a
/// single commit before the engine reports a cycle.
pub const MAX_DIRECTIVE_TURNS: usize = 64;

/// A deferred computation that writes through a part instead of being
/// rendered directly.
///
/// When a binding receives a [`Value::Directive`], committing the binding
/// runs the directive against the part. The directive may stage a new
/// value, which commits in the same pass, or stage nothing to leave the
/// previously committed content in place.
pub trait Directive {
    /// Run against the part holding this directive.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the directive cannot produce a value.
    fn run(&self, part: &mut dyn Part, cx: &mut RenderContext<'_>) -> Result<(), Error>;
}

impl<F> Directive for F
where
    F: Fn(&mut dyn Part, &mut RenderContext<'_>) -> Result<(), Error>,
{
    fn run(&self, part: &mut dyn Part, cx: &mut RenderContext<'_>) -> Result<(), Error> {
        self(part, cx)
    }
}

/// Wrap the given action as a directive [`Value`].
///
/// # Examples
///
/// ```
/// use weft::{directive, Value};
///
/// let upper = directive(|part, _cx| {
///     part.set_value(Value::from("HELLO"));
///     Ok(())
/// });
/// assert!(matches!(upper, Value::Directive(_)));
/// ```
pub fn directive<F>(action: F) -> Value
where
    F: Fn(&mut dyn Part, &mut RenderContext<'_>) -> Result<(), Error> + 'static,
{
    Value::Directive(Rc::new(action))
}
