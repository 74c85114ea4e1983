use crate::{
    cache::TemplateId,
    compile::StaticPartKind,
    dom::{NodeId, Walk},
    engine::RenderContext,
    log::{error_value_count, Error},
    part::{
        commit_shared, AttributeBinding, AttributeCommitter, BooleanAttributePart, EventPart,
        NodePart, Part, Processor,
    },
    value::Value,
};
use std::rc::Rc;

/// One binding position within an instance.
#[derive(Debug)]
enum Slot {
    /// Consumes a value without rendering it, for bindings compiled
    /// inside comments.
    Inactive,
    Node(NodePart),
    Boolean(BooleanAttributePart),
    Event(EventPart),
    /// One position of a committer shared between several bindings in
    /// the same attribute value.
    Shared { committer: usize, position: usize },
}

/// A live copy of a compiled template, bound into the tree.
///
/// Updating an instance stages every value first and then commits every
/// part in document order, so a directive observing the tree never sees a
/// half-applied pass.
#[derive(Debug)]
pub struct Instance {
    template: TemplateId,
    committers: Vec<AttributeCommitter>,
    slots: Vec<Slot>,
}

impl Instance {
    /// Import a fresh copy of the given template into the live tree and
    /// bind parts at its recorded positions, returning the instance and
    /// the detached fragment holding the copied nodes.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a binding cannot be constructed.
    pub fn instantiate(
        template: TemplateId,
        processor: &Rc<dyn Processor>,
        cx: &mut RenderContext<'_>,
    ) -> Result<(Self, NodeId), Error> {
        let compiled = cx.templates.get(template);
        let fragment = cx.dom.import(&compiled.dom, compiled.root);

        let mut committers = Vec::new();
        let mut slots = Vec::new();
        let mut walk = Walk::new(fragment);
        let mut current: Option<NodeId> = None;
        let mut walked: isize = -1;

        for static_part in &compiled.parts {
            let Some(target) = static_part.index else {
                // A deactivated descriptor still consumes every value it
                // was recorded for.
                let covered = match &static_part.kind {
                    StaticPartKind::Node => 1,
                    StaticPartKind::Attribute { strings, .. } => {
                        strings.len().saturating_sub(1)
                    }
                };
                for _ in 0..covered {
                    slots.push(Slot::Inactive);
                }
                continue;
            };
            while walked < target as isize {
                current = Some(
                    walk.next(cx.dom)
                        .expect("compiled part positions lie within the tree"),
                );
                walked += 1;
            }
            let node = current.expect("compiled part positions are in walk order");

            match &static_part.kind {
                StaticPartKind::Node => {
                    slots.push(Slot::Node(processor.text_part(cx.dom, node)));
                }
                StaticPartKind::Attribute { name, strings } => {
                    let binding = processor.attribute_binding(
                        node,
                        name,
                        strings,
                        cx.options.event_context,
                    )?;
                    match binding {
                        AttributeBinding::Committer(committer) => {
                            let index = committers.len();
                            let count = committer.len();
                            committers.push(committer);
                            for position in 0..count {
                                slots.push(Slot::Shared {
                                    committer: index,
                                    position,
                                });
                            }
                        }
                        AttributeBinding::Boolean(part) => slots.push(Slot::Boolean(part)),
                        AttributeBinding::Event(part) => slots.push(Slot::Event(part)),
                    }
                }
            }
        }

        Ok((
            Self {
                template,
                committers,
                slots,
            },
            fragment,
        ))
    }

    /// Return the id of the template this instance was created from.
    pub fn template(&self) -> TemplateId {
        self.template
    }

    /// Apply one pass of values: stage all, then commit all.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the value count does not match the
    /// template's bindings, or when any part fails to commit.
    pub fn update(&mut self, values: Vec<Value>, cx: &mut RenderContext<'_>) -> Result<(), Error> {
        if values.len() != self.slots.len() {
            return Err(error_value_count(self.slots.len(), values.len()));
        }

        let Self {
            committers, slots, ..
        } = self;
        for (slot, value) in slots.iter_mut().zip(values) {
            match slot {
                Slot::Inactive => {}
                Slot::Node(part) => part.set_value(value),
                Slot::Boolean(part) => part.set_value(value),
                Slot::Event(part) => part.set_value(value),
                Slot::Shared {
                    committer,
                    position,
                } => committers[*committer].stage(*position, value),
            }
        }

        for slot in slots.iter_mut() {
            match slot {
                Slot::Inactive => {}
                Slot::Node(part) => part.commit(cx)?,
                Slot::Boolean(part) => part.commit(cx)?,
                Slot::Event(part) => part.commit(cx)?,
                Slot::Shared {
                    committer,
                    position,
                } => commit_shared(&mut committers[*committer], *position, cx)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Instance;
    use crate::{
        adjust::remove_nodes_from_template,
        cache::Templates,
        dom::Dom,
        engine::{RenderContext, RenderOptions},
        template::{html, Strings},
        value::Value,
    };
    use std::collections::HashSet;

    #[test]
    fn test_instantiate_and_update() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();

        let strings = Strings::new(["<p class=\"", "\">", "</p>"]);
        let description = html(
            strings,
            vec![Value::from("note"), Value::from("first")],
        );
        let id = templates.obtain(&description, None).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        let (mut instance, fragment) =
            Instance::instantiate(id, &description.processor, &mut cx).unwrap();
        instance.update(description.values.clone(), &mut cx).unwrap();

        let p = dom.first_child(fragment).unwrap();
        assert_eq!(dom.attribute(p, "class"), Some("note"));
        assert_eq!(dom.text_of(p), "first");

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        instance
            .update(vec![Value::from("note"), Value::from("second")], &mut cx)
            .unwrap();
        assert_eq!(dom.text_of(p), "second");
    }

    #[test]
    fn test_deactivated_attribute_consumes_all_values() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();

        let strings = Strings::new(["<div a=\"", "-", "\"></div><p>", "</p>"]);
        let description = html(
            strings,
            vec![Value::from("x"), Value::from("y"), Value::from("body")],
        );
        let id = templates.obtain(&description, None).unwrap();

        // Hoisting the div deactivates both interpolations of its
        // two-binding attribute.
        let template = templates.get_mut(id);
        let div = template
            .dom
            .children(template.root)
            .iter()
            .copied()
            .find(|node| template.dom.tag(*node) == Some("div"))
            .unwrap();
        remove_nodes_from_template(template, &HashSet::from([div]));

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        let (mut instance, fragment) =
            Instance::instantiate(id, &description.processor, &mut cx).unwrap();
        instance.update(description.values.clone(), &mut cx).unwrap();

        let p = dom.first_child(fragment).unwrap();
        assert_eq!(dom.text_of(p), "body");
    }

    #[test]
    fn test_mismatched_values() {
        let mut dom = Dom::new();
        let mut templates = Templates::new();
        let options = RenderOptions::default();

        let description = html(Strings::new(["<p>", "</p>"]), vec![Value::from("x")]);
        let id = templates.obtain(&description, None).unwrap();

        let mut cx = RenderContext {
            dom: &mut dom,
            templates: &mut templates,
            options: &options,
        };
        let (mut instance, _) =
            Instance::instantiate(id, &description.processor, &mut cx).unwrap();
        let error = instance.update(vec![], &mut cx).unwrap_err();

        assert_eq!(error.get_reason(), "mismatched values");
    }
}
