use crate::ids::NodeId;
use crate::tree::Tree;

/// Visitor for depth-first traversal of a presentation tree.
///
/// `pre_visit` runs before a node's children; returning `false` skips the
/// subtree below it. `post_visit` runs after the children (or right away when
/// the subtree was skipped).
pub trait TreeVisitor {
    fn pre_visit(&mut self, tree: &Tree, node: NodeId) -> bool;

    fn post_visit(&mut self, _tree: &Tree, _node: NodeId) {
        // Nothing by default
    }
}

pub fn walk_depth_first<V: TreeVisitor>(visitor: &mut V, tree: &Tree, node: NodeId) {
    if visitor.pre_visit(tree, node) {
        if let Ok(children) = tree.children(node) {
            for child in children {
                walk_depth_first(visitor, tree, *child);
            }
        }
    }
    visitor.post_visit(tree, node);
}

/// Closure adapter: visit every node in pre-order.
pub struct PreOrder<F: FnMut(&Tree, NodeId)>(pub F);

impl<F: FnMut(&Tree, NodeId)> TreeVisitor for PreOrder<F> {
    fn pre_visit(&mut self, tree: &Tree, node: NodeId) -> bool {
        (self.0)(tree, node);
        true
    }
}
