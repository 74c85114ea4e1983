use super::Part;
use crate::{
    directive::MAX_DIRECTIVE_TURNS,
    dom::{ListenerHandle, NodeId},
    engine::RenderContext,
    log::{error_directive_loop, Error, INVALID_BINDING},
    value::{Listener, Value},
};
use std::{mem, rc::Rc};

/// A binding managing one event subscription on an element.
///
/// Swapping in a listener with the same attachment options replaces the
/// handler behind the existing subscription rather than resubscribing, so
/// delivery order among other listeners is preserved.
#[derive(Debug)]
pub struct EventPart {
    element: NodeId,
    event: String,
    current: Option<Listener>,
    pending: Value,
    handle: Option<ListenerHandle>,
    context: Option<NodeId>,
}

impl Part for EventPart {
    fn set_value(&mut self, value: Value) {
        self.pending = value;
    }

    fn staged(&self) -> &Value {
        &self.pending
    }
}

impl EventPart {
    /// Create a new EventPart on the given element.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when literal text surrounds the binding, since
    /// a listener cannot be part of a string.
    pub fn new(
        element: NodeId,
        event: &str,
        strings: &[String],
        context: Option<NodeId>,
    ) -> Result<Self, Error> {
        if strings.len() != 2 || !strings[0].is_empty() || !strings[1].is_empty() {
            return Err(Error::build(INVALID_BINDING).with_help(format!(
                "event binding `{event}` must contain a single listener and no literal text"
            )));
        }

        Ok(Self {
            element,
            event: event.to_string(),
            current: None,
            pending: Value::NoChange,
            handle: None,
            context,
        })
    }

    /// Commit the staged listener.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a directive fails or loops, or when the
    /// staged value is neither a listener nor empty.
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
        let next = match mem::replace(&mut self.pending, Value::NoChange) {
            Value::Listener(listener) => Some(listener),
            Value::Nothing => None,
            Value::Scalar(serde_json::Value::Null) => None,
            _ => {
                return Err(Error::build(INVALID_BINDING).with_help(format!(
                    "event binding `{}` received a value that is not a listener",
                    self.event
                )))
            }
        };

        let should_remove = next.is_none()
            || self
                .current
                .as_ref()
                .zip(next.as_ref())
                .is_some_and(|(old, new)| old.options() != new.options());
        let should_add = next.is_some() && (self.current.is_none() || should_remove);

        if should_remove {
            if let Some(handle) = self.handle.take() {
                cx.dom.unsubscribe(self.element, &self.event, &handle);
            }
        }
        match (&next, should_add) {
            (Some(listener), true) => {
                self.handle = Some(cx.dom.subscribe(
                    self.element,
                    &self.event,
                    listener.clone(),
                    self.context,
                ));
            }
            (Some(listener), false) => {
                // Same options, swap the handler behind the subscription.
                if let Some(handle) = &self.handle {
                    *handle.borrow_mut() = Some(listener.clone());
                }
            }
            (None, _) => {}
        }
        self.current = next;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::EventPart;
    use crate::{
        cache::Templates,
        dom::Dom,
        engine::{RenderContext, RenderOptions},
        part::Part,
        value::{Listener, Value},
    };
    use std::{cell::Cell, rc::Rc};

    fn helper_strings() -> Vec<String> {
        vec![String::new(), String::new()]
    }

    #[test]
    fn test_subscribe_and_replace() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let button = dom.create_element("button");
        let mut part = EventPart::new(button, "click", &helper_strings(), None).unwrap();

        let seen = Rc::new(Cell::new(0));
        let first = Rc::clone(&seen);
        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::Listener(Listener::new(move |_| first.set(1))));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.listener_count(button), 1);

        // Same options, so the subscription survives and only the handler
        // changes.
        let second = Rc::clone(&seen);
        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::Listener(Listener::new(move |_| second.set(2))));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.listener_count(button), 1);

        dom.dispatch(button, "click");
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_changed_options_resubscribe() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let button = dom.create_element("button");
        let mut part = EventPart::new(button, "click", &helper_strings(), None).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::Listener(Listener::new(|_| {})));
        part.commit(&mut cx).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::Listener(Listener::new(|_| {}).once()));
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.listener_count(button), 1);
    }

    #[test]
    fn test_nothing_unsubscribes() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();
        let button = dom.create_element("button");
        let mut part = EventPart::new(button, "click", &helper_strings(), None).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::Listener(Listener::new(|_| {})));
        part.commit(&mut cx).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        part.set_value(Value::Nothing);
        part.commit(&mut cx).unwrap();
        assert_eq!(dom.listener_count(button), 0);
    }

    #[test]
    fn test_literal_text_is_rejected() {
        let mut dom = Dom::new();
        let button = dom.create_element("button");
        let strings = vec!["handle(".to_string(), ")".to_string()];
        let error = EventPart::new(button, "click", &strings, None).unwrap_err();

        assert_eq!(error.get_reason(), "invalid binding");
    }
}
