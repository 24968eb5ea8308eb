//! Structural invariants of the content tree
//!
//! This tests:
//! - Single parent, no cycles, root never attached
//! - Removal keeps the detached subtree intact
//! - Node-scoped listeners only hear attached descendants
//! - Depth-first traversal order

use std::cell::RefCell;
use std::rc::Rc;
use url::Url;
use xuk_model::{
    ChannelKind, Command, EventKind, Media, ModelError, PreOrder, Presentation, Tree,
};

fn presentation() -> Presentation {
    Presentation::new(Url::parse("file:///tmp/tree/").unwrap())
}

/// root ─┬─ a ── a1
///       └─ b
fn sample(p: &mut Presentation) -> [xuk_model::NodeId; 4] {
    let root = p.root_node().unwrap();
    let a = p.create_node();
    let a1 = p.create_node();
    let b = p.create_node();
    let tree = p.tree_mut();
    tree.append_child(root, a).unwrap();
    tree.append_child(a, a1).unwrap();
    tree.append_child(root, b).unwrap();
    [root, a, a1, b]
}

#[test]
fn test_node_keeps_single_parent() {
    let mut p = presentation();
    let [_, a, a1, b] = sample(&mut p);

    let err = p.tree_mut().append_child(b, a1).unwrap_err();
    assert!(matches!(err, ModelError::HasParent(_)));
    assert_eq!(p.tree().parent(a1).unwrap(), Some(a));
    assert_eq!(p.tree().child_count(b).unwrap(), 0);
}

#[test]
fn test_cycle_and_root_attachment_rejected() {
    let mut p = presentation();
    let [root, a, a1, _] = sample(&mut p);

    // Detach `a`, then try to hang it under its own child.
    p.tree_mut().remove_child(root, 0).unwrap();
    let err = p.tree_mut().append_child(a1, a).unwrap_err();
    assert!(matches!(err, ModelError::CycleDetected { .. }));

    let err = p.tree_mut().append_child(a, root).unwrap_err();
    assert!(matches!(
        err,
        ModelError::RootCannotBeAttached(_) | ModelError::CycleDetected { .. }
    ));
}

#[test]
fn test_removed_subtree_survives_and_can_be_reinserted() {
    let mut p = presentation();
    let [root, a, a1, b] = sample(&mut p);

    p.execute(Command::RemoveNode { parent: root, index: 0 }).unwrap();
    assert_eq!(p.tree().children(root).unwrap(), &[b]);
    assert!(!p.tree().is_attached(a1));
    assert_eq!(p.tree().children(a).unwrap(), &[a1]);

    p.execute(Command::InsertNode { parent: root, index: 1, node: a }).unwrap();
    assert_eq!(p.tree().children(root).unwrap(), &[b, a]);
    assert!(p.tree().is_attached(a1));
}

#[test]
fn test_insert_out_of_bounds_leaves_tree_unchanged() {
    let mut p = presentation();
    let [root, _, _, _] = sample(&mut p);
    let extra = p.create_node();

    let err = p
        .execute(Command::InsertNode { parent: root, index: 7, node: extra })
        .unwrap_err();
    assert!(matches!(err, ModelError::IndexOutOfBounds { index: 7, count: 2 }));
    assert_eq!(p.tree().child_count(root).unwrap(), 2);
    assert_eq!(p.tree().parent(extra).unwrap(), None);
}

#[test]
fn test_node_listener_hears_attached_descendants_only() {
    let mut p = presentation();
    let [_, a, a1, _] = sample(&mut p);
    let text = p.channels_mut().add_channel("text", ChannelKind::Text).unwrap();

    let heard = Rc::new(RefCell::new(Vec::new()));
    let log = heard.clone();
    p.register_node_listener(a, EventKind::ChannelMediaChanged, move |event| {
        log.borrow_mut().push(event.source_node());
        Ok(())
    })
    .unwrap();

    p.set_media(a1, text, Media::text("below a")).unwrap();
    assert_eq!(*heard.borrow(), [Some(a1)]);

    let detached = p.create_node();
    p.set_media(detached, text, Media::text("elsewhere")).unwrap();
    assert_eq!(heard.borrow().len(), 1);
}

#[test]
fn test_depth_first_order() {
    let mut p = presentation();
    let [root, a, a1, b] = sample(&mut p);

    let mut visited = Vec::new();
    p.tree()
        .accept_depth_first(root, &mut PreOrder(|_: &Tree, node| visited.push(node)))
        .unwrap();
    assert_eq!(visited, [root, a, a1, b]);

    let iterated: Vec<_> = p.tree().depth_first(root).collect();
    assert_eq!(iterated, visited);
}

#[test]
fn test_nodes_from_other_presentation_rejected() {
    let mut p = presentation();
    let mut other = presentation();
    let foreign = other.create_node();
    let root = p.root_node().unwrap();

    let err = p.tree_mut().append_child(root, foreign).unwrap_err();
    assert!(matches!(err, ModelError::DifferentPresentation { .. }));
}
