use crate::{
    compile::{CompiledTemplate, StaticPart},
    dom::{Dom, NodeId, Walk},
};
use std::collections::HashSet;

/// Remove the given nodes, and their subtrees, from a compiled template
/// while keeping every binding attached to the node it was recorded
/// against.
///
/// Bindings anchored inside a removed subtree are deactivated, so they
/// keep consuming a value on update without rendering it. Bindings after
/// a removal shift down by the number of removed walk positions.
pub fn remove_nodes_from_template(template: &mut CompiledTemplate, nodes: &HashSet<NodeId>) {
    let CompiledTemplate {
        dom, root, parts, ..
    } = template;

    let mut walk = Walk::new(*root);
    let mut part_index = next_active(parts, 0);
    let mut node_index: isize = -1;
    let mut remove_count = 0;
    let mut doomed = Vec::new();
    let mut removing: Option<NodeId> = None;

    while let Some(node) = walk.next(dom) {
        node_index += 1;
        if removing.is_some() && dom.previous_sibling(node) == removing {
            removing = None;
        }
        if nodes.contains(&node) {
            doomed.push(node);
            if removing.is_none() {
                removing = Some(node);
            }
        }
        if removing.is_some() {
            remove_count += 1;
        }

        while let Some(at) = part_index {
            if parts[at].index != Some(node_index as usize) {
                break;
            }
            parts[at].index = if removing.is_some() {
                None
            } else {
                Some(node_index as usize - remove_count)
            };
            part_index = next_active(parts, at + 1);
        }
    }

    for node in doomed {
        dom.remove(node);
    }
}

/// Insert a node into a compiled template before the given reference,
/// shifting bindings at or after the insertion point by the size of the
/// inserted subtree. With no reference the node is appended, which moves
/// no binding.
pub fn insert_node_into_template(
    template: &mut CompiledTemplate,
    node: NodeId,
    reference: Option<NodeId>,
) {
    let CompiledTemplate {
        dom, root, parts, ..
    } = template;
    let Some(reference) = reference else {
        dom.append(*root, node);
        return;
    };

    let mut walk = Walk::new(*root);
    let mut part_index = next_active(parts, 0);
    let mut insert_count = 0;
    let mut walker_index: isize = -1;

    while let Some(walked) = walk.next(dom) {
        walker_index += 1;
        if walked == reference {
            insert_count = count_nodes(dom, node);
            let parent = dom
                .parent(reference)
                .expect("reference node is attached to the template");
            dom.insert_before(parent, node, Some(reference));
        }

        while let Some(at) = part_index {
            if parts[at].index != Some(walker_index as usize) {
                break;
            }
            if insert_count > 0 {
                parts[at].index = Some(walker_index as usize + insert_count);
            }
            part_index = next_active(parts, at + 1);
        }
    }
}

/// Return the position of the first active part at or after `from`.
fn next_active(parts: &[StaticPart], from: usize) -> Option<usize> {
    parts
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, part)| part.index.is_some())
        .map(|(position, _)| position)
}

/// Return the number of walk positions the given subtree occupies.
fn count_nodes(dom: &Dom, node: NodeId) -> usize {
    let mut count = 1;
    let mut walk = Walk::new(node);
    while walk.next(dom).is_some() {
        count += 1;
    }

    count
}
