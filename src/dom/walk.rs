use super::{Dom, NodeId};

/// A resumable depth-first cursor over a subtree.
///
/// `Walk` holds node ids rather than borrows, so the tree may be mutated
/// between calls to [`next`][Walk::next]. Nodes inserted before the cursor's
/// current position are not revisited; nodes inserted after it are yielded
/// in order. The root itself is never yielded.
#[derive(Debug)]
pub struct Walk {
    root: NodeId,
    current: Option<NodeId>,
}

impl Walk {
    /// Create a new Walk over the subtree rooted at the given node.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            current: None,
        }
    }

    /// Advance to the next node in document order, if any.
    pub fn next(&mut self, dom: &Dom) -> Option<NodeId> {
        let next = match self.current {
            None => dom.first_child(self.root),
            Some(current) => match dom.first_child(current) {
                Some(child) => Some(child),
                None => self.climb(dom, current),
            },
        };
        self.current = next;

        next
    }

    /// Find the nearest following sibling, climbing toward the root.
    fn climb(&self, dom: &Dom, from: NodeId) -> Option<NodeId> {
        let mut node = from;
        loop {
            if node == self.root {
                return None;
            }
            if let Some(sibling) = dom.next_sibling(node) {
                return Some(sibling);
            }
            node = dom.parent(node)?;
        }
    }
}
