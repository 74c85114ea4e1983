use crate::{adjust::remove_nodes_from_template, compile::CompiledTemplate, dom::Walk};
use std::collections::HashSet;

/// Extract every `<style>` element from a compiled template, returning
/// their text in document order.
///
/// The elements are removed through the index-maintaining path, so every
/// remaining binding stays attached to its node and bindings inside the
/// extracted styles are deactivated rather than dropped.
pub fn remove_styles_from_template(template: &mut CompiledTemplate) -> Vec<String> {
    let mut styles = Vec::new();
    let mut doomed = HashSet::new();
    let mut walk = Walk::new(template.root);
    while let Some(node) = walk.next(&template.dom) {
        if template.dom.tag(node) == Some("style") {
            styles.push(template.dom.text_of(node));
            doomed.insert(node);
        }
    }

    if !doomed.is_empty() {
        remove_nodes_from_template(template, &doomed);
    }

    styles
}
