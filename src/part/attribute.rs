use super::Part;
use crate::{
    directive::MAX_DIRECTIVE_TURNS,
    dom::{Dom, NodeId},
    engine::RenderContext,
    log::{error_boolean_literal, error_directive_loop, Error},
    value::Value,
};
use std::rc::Rc;

/// Whether a committer writes an attribute or assigns a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitterKind {
    Attribute,
    Property,
}

/// Coalesces every binding inside one attribute value into a single write.
///
/// An attribute may interleave literal text with several bindings; staging
/// any of them marks the committer dirty, and one commit per update pass
/// composes the full value and writes it once.
#[derive(Debug)]
pub struct AttributeCommitter {
    element: NodeId,
    name: String,
    strings: Vec<String>,
    values: Vec<Value>,
    dirty: bool,
    kind: CommitterKind,
}

impl AttributeCommitter {
    /// Create a new AttributeCommitter over the given element and literal
    /// pieces.
    pub fn new(element: NodeId, name: &str, strings: &[String], kind: CommitterKind) -> Self {
        Self {
            element,
            name: name.to_string(),
            strings: strings.to_vec(),
            values: vec![Value::NoChange; strings.len().saturating_sub(1)],
            dirty: true,
            kind,
        }
    }

    /// Return the number of bindings the committer covers.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return true when the committer covers no bindings.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stage the value for the binding at the given position.
    ///
    /// A [`Value::NoChange`] leaves the previous value in place, and a
    /// primitive equal to the previous value does not dirty the committer.
    pub fn stage(&mut self, position: usize, value: Value) {
        if matches!(value, Value::NoChange) {
            return;
        }
        if value.is_primitive() && value == self.values[position] {
            return;
        }
        let is_directive = matches!(value, Value::Directive(_));
        self.values[position] = value;
        if !is_directive {
            self.dirty = true;
        }
    }

    /// Return the staged value at the given position.
    pub fn staged(&self, position: usize) -> &Value {
        &self.values[position]
    }

    /// Drop the staged value at the given position without dirtying the
    /// committer, used while resolving directives.
    fn unstage(&mut self, position: usize) {
        self.values[position] = Value::NoChange;
    }

    /// Return true when the binding spans the whole value with no literal
    /// text around it.
    fn single(&self) -> bool {
        self.strings.len() == 2 && self.strings[0].is_empty() && self.strings[1].is_empty()
    }

    /// Concatenate literal pieces and staged values into the full text.
    /// Lists flatten, item by item.
    fn compose(&self) -> String {
        let mut text = String::new();
        let last = self.strings.len() - 1;
        for (position, chunk) in self.strings[..last].iter().enumerate() {
            text.push_str(chunk);
            match &self.values[position] {
                Value::List(items) => {
                    for item in items {
                        text.push_str(&item.as_text());
                    }
                }
                value => text.push_str(&value.as_text()),
            }
        }
        text.push_str(&self.strings[last]);

        text
    }

    /// Write the composed value if any binding changed since the last
    /// commit.
    pub fn commit(&mut self, dom: &mut Dom) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        match self.kind {
            CommitterKind::Attribute => {
                let text = self.compose();
                dom.set_attribute(self.element, &self.name, &text);
            }
            CommitterKind::Property => {
                // A lone binding assigns the value itself, anything else
                // assigns the composed text.
                let value = if self.single() {
                    self.values[0].clone()
                } else {
                    Value::from(self.compose())
                };
                dom.set_property(self.element, &self.name, value);
            }
        }
    }
}

/// One binding position within an [`AttributeCommitter`], exposed to
/// directives as a part of its own.
pub(crate) struct SharedPart<'committer> {
    committer: &'committer mut AttributeCommitter,
    position: usize,
}

impl Part for SharedPart<'_> {
    fn set_value(&mut self, value: Value) {
        self.committer.stage(self.position, value);
    }

    fn staged(&self) -> &Value {
        self.committer.staged(self.position)
    }
}

/// Resolve directives staged at the given position, then commit the
/// committer if it is dirty.
///
/// # Errors
///
/// Returns an [`Error`] when a directive fails or loops.
pub(crate) fn commit_shared(
    committer: &mut AttributeCommitter,
    position: usize,
    cx: &mut RenderContext<'_>,
) -> Result<(), Error> {
    let mut turns = 0;
    loop {
        let directive = match committer.staged(position) {
            Value::Directive(directive) => Rc::clone(directive),
            _ => break,
        };
        committer.unstage(position);
        let mut part = SharedPart {
            committer: &mut *committer,
            position,
        };
        directive.run(&mut part, cx)?;
        turns += 1;
        if turns > MAX_DIRECTIVE_TURNS {
            return Err(error_directive_loop());
        }
    }

    if matches!(committer.staged(position), Value::NoChange) {
        return Ok(());
    }
    committer.commit(cx.dom);

    Ok(())
}

/// A binding toggling the presence of a boolean attribute.
///
/// Truthy values set the attribute to the empty string, falsy values
/// remove it, and nothing is written when the coerced value is unchanged.
#[derive(Debug)]
pub struct BooleanAttributePart {
    element: NodeId,
    name: String,
    current: Option<bool>,
    pending: Value,
}

impl Part for BooleanAttributePart {
    fn set_value(&mut self, value: Value) {
        self.pending = value;
    }

    fn staged(&self) -> &Value {
        &self.pending
    }
}

impl BooleanAttributePart {
    /// Create a new BooleanAttributePart on the given element.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when literal text surrounds the binding, since
    /// presence cannot be half of a string.
    pub fn new(element: NodeId, name: &str, strings: &[String]) -> Result<Self, Error> {
        if strings.len() != 2 || !strings[0].is_empty() || !strings[1].is_empty() {
            return Err(error_boolean_literal(name));
        }

        Ok(Self {
            element,
            name: name.to_string(),
            current: None,
            pending: Value::NoChange,
        })
    }

    /// Commit the staged value, toggling the attribute when the coerced
    /// presence changed.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a directive fails or loops.
    pub fn commit(&mut self, cx: &mut RenderContext<'_>) -> Result<(), Error> {
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

        if matches!(self.pending, Value::NoChange) {
            return Ok(());
        }
        let value = std::mem::replace(&mut self.pending, Value::NoChange);
        let present = value.truthy();
        if self.current != Some(present) {
            if present {
                cx.dom.set_attribute(self.element, &self.name, "");
            } else {
                cx.dom.remove_attribute(self.element, &self.name);
            }
            self.current = Some(present);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeCommitter, BooleanAttributePart, CommitterKind};
    use crate::{
        cache::Templates,
        dom::Dom,
        engine::{RenderContext, RenderOptions},
        part::Part,
        value::Value,
    };

    fn helper_strings(chunks: &[&str]) -> Vec<String> {
        chunks.iter().map(|chunk| chunk.to_string()).collect()
    }

    #[test]
    fn test_coalesced_write() {
        let mut dom = Dom::new();
        let element = dom.create_element("a");
        let mut committer = AttributeCommitter::new(
            element,
            "href",
            &helper_strings(&["/page/", "-", ""]),
            CommitterKind::Attribute,
        );

        committer.stage(0, Value::from("alpha"));
        committer.stage(1, Value::from("beta"));

        let before = dom.mutations();
        committer.commit(&mut dom);
        assert_eq!(dom.attribute(element, "href"), Some("/page/alpha-beta"));
        assert_eq!(dom.mutations(), before + 1);
    }

    #[test]
    fn test_clean_committer_writes_nothing() {
        let mut dom = Dom::new();
        let element = dom.create_element("a");
        let mut committer = AttributeCommitter::new(
            element,
            "href",
            &helper_strings(&["", ""]),
            CommitterKind::Attribute,
        );

        committer.stage(0, Value::from("/home"));
        committer.commit(&mut dom);

        let before = dom.mutations();
        committer.stage(0, Value::from("/home"));
        committer.commit(&mut dom);
        assert_eq!(dom.mutations(), before);
    }

    #[test]
    fn test_list_flattens() {
        let mut dom = Dom::new();
        let element = dom.create_element("div");
        let mut committer = AttributeCommitter::new(
            element,
            "class",
            &helper_strings(&["", ""]),
            CommitterKind::Attribute,
        );

        committer.stage(
            0,
            Value::List(vec![Value::from("a"), Value::from("b")]),
        );
        committer.commit(&mut dom);
        assert_eq!(dom.attribute(element, "class"), Some("ab"));
    }

    #[test]
    fn test_single_property_keeps_value() {
        let mut dom = Dom::new();
        let element = dom.create_element("input");
        let mut committer = AttributeCommitter::new(
            element,
            "valueAsNumber",
            &helper_strings(&["", ""]),
            CommitterKind::Property,
        );

        committer.stage(0, Value::from(3));
        committer.commit(&mut dom);
        assert_eq!(
            dom.property(element, "valueAsNumber"),
            Some(&Value::from(3))
        );
    }

    #[test]
    fn test_boolean_toggle() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let element = dom.create_element("input");
        let mut part =
            BooleanAttributePart::new(element, "disabled", &helper_strings(&["", ""])).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::from("yes"));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.attribute(element, "disabled"), Some(""));

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::from(false));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.attribute(element, "disabled"), None);
    }

    #[test]
    fn test_boolean_unchanged_writes_nothing() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let element = dom.create_element("input");
        let mut part =
            BooleanAttributePart::new(element, "disabled", &helper_strings(&["", ""])).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::from(true));
        part.commit(&mut cx).unwrap();

        let before = dom.mutations();
        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::from("also true"));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.mutations(), before);
    }

    #[test]
    fn test_boolean_rejects_literals() {
        let mut dom = Dom::new();
        let element = dom.create_element("input");
        let error =
            BooleanAttributePart::new(element, "disabled", &helper_strings(&["no", ""]))
                .unwrap_err();

        assert_eq!(error.get_reason(), "invalid binding");
    }
}
