//! Undo/redo behaviour over command sequences
//!
//! This tests:
//! - Undoing everything restores every intermediate state, in reverse
//! - Redoing everything replays the same states
//! - Rejected commands leave no trace in the model or the history
//! - A listener rejecting an event reverts the command that raised it
//! - Executing after undo discards the redo branch

use proptest::prelude::*;
use url::Url;
use xuk_model::{
    ChannelId, ChannelKind, ChannelsProperty, Command, EventKind, Media, Metadata, ModelError,
    NodeId, Presentation,
};

fn presentation() -> (Presentation, ChannelId) {
    let mut p = Presentation::new(Url::parse("file:///tmp/history/").unwrap());
    let text = p.channels_mut().add_channel("text", ChannelKind::Text).unwrap();
    (p, text)
}

fn snapshot(p: &Presentation) -> String {
    let mut out = format!("{:?} {:?}\n", p.language(), p.metadata());
    if let Some(root) = p.root_node() {
        for node in p.tree().depth_first(root) {
            out.push_str(&format!(
                "{node} {:?} {:?}\n",
                p.tree().children(node).unwrap(),
                p.tree().properties(node).unwrap()
            ));
        }
    }
    out
}

#[derive(Debug, Clone)]
enum Op {
    Insert { parent: usize, index: usize, node: usize },
    Remove { parent: usize, index: usize },
    AddChannels { node: usize },
    SetText { node: usize, text: String },
    ClearText { node: usize },
    AddMetadata { index: usize, name: String },
    RemoveMetadata { index: usize },
    SetLanguage { language: Option<String> },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize, 0..3usize, 0..8usize).prop_map(|(parent, index, node)| Op::Insert { parent, index, node }),
        (0..8usize, 0..3usize).prop_map(|(parent, index)| Op::Remove { parent, index }),
        (0..8usize).prop_map(|node| Op::AddChannels { node }),
        (0..8usize, "[a-z]{1,6}").prop_map(|(node, text)| Op::SetText { node, text }),
        (0..8usize).prop_map(|node| Op::ClearText { node }),
        (0..3usize, "[a-z]{1,4}").prop_map(|(index, name)| Op::AddMetadata { index, name }),
        (0..3usize).prop_map(|index| Op::RemoveMetadata { index }),
        proptest::option::of("en|fr|de").prop_map(|language| Op::SetLanguage { language }),
    ]
}

fn to_command(op: &Op, nodes: &[NodeId], text: ChannelId) -> Command {
    match op {
        Op::Insert { parent, index, node } => Command::InsertNode {
            parent: nodes[*parent],
            index: *index,
            node: nodes[*node],
        },
        Op::Remove { parent, index } => Command::RemoveNode {
            parent: nodes[*parent],
            index: *index,
        },
        Op::AddChannels { node } => Command::AddProperty {
            node: nodes[*node],
            property: ChannelsProperty::new().into(),
        },
        Op::SetText { node, text: value } => Command::SetChannelMedia {
            node: nodes[*node],
            channel: text,
            media: Some(Media::text(value.clone())),
        },
        Op::ClearText { node } => Command::SetChannelMedia {
            node: nodes[*node],
            channel: text,
            media: None,
        },
        Op::AddMetadata { index, name } => Command::AddMetadata {
            index: *index,
            metadata: Metadata::new(name.clone(), "content").unwrap(),
        },
        Op::RemoveMetadata { index } => Command::RemoveMetadata { index: *index },
        Op::SetLanguage { language } => Command::SetLanguage {
            language: language.clone(),
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_undo_all_then_redo_all_replays_states(ops in proptest::collection::vec(op(), 1..40)) {
        let (mut p, text) = presentation();
        let mut nodes = vec![p.root_node().unwrap()];
        while nodes.len() < 8 {
            nodes.push(p.create_node());
        }

        let mut states = vec![snapshot(&p)];
        for op in &ops {
            let before = snapshot(&p);
            let levels = p.undo_redo().undo_levels();
            match p.execute(to_command(op, &nodes, text)) {
                Ok(()) => states.push(snapshot(&p)),
                Err(_) => {
                    prop_assert_eq!(snapshot(&p), before);
                    prop_assert_eq!(p.undo_redo().undo_levels(), levels);
                }
            }
        }
        prop_assert_eq!(p.undo_redo().undo_levels(), states.len() - 1);

        for expected in states.iter().rev().skip(1) {
            prop_assert!(p.undo().unwrap());
            prop_assert_eq!(&snapshot(&p), expected);
        }
        prop_assert!(!p.can_undo());

        for expected in states.iter().skip(1) {
            prop_assert!(p.redo().unwrap());
            prop_assert_eq!(&snapshot(&p), expected);
        }
        prop_assert!(!p.can_redo());
    }
}

#[test]
fn test_execute_after_undo_discards_redo_branch() {
    let (mut p, text) = presentation();
    let root = p.root_node().unwrap();
    p.execute(Command::AddProperty {
        node: root,
        property: ChannelsProperty::new().into(),
    })
    .unwrap();
    p.execute(Command::SetChannelMedia {
        node: root,
        channel: text,
        media: Some(Media::text("first")),
    })
    .unwrap();

    p.undo().unwrap();
    assert_eq!(p.undo_redo().redo_description().as_deref(), Some("Set media"));

    p.execute(Command::SetChannelMedia {
        node: root,
        channel: text,
        media: Some(Media::text("second")),
    })
    .unwrap();
    assert!(!p.can_redo());

    p.undo().unwrap();
    assert!(p.media(root, text).is_err());
}

#[test]
fn test_undo_raises_inverse_event() {
    let (mut p, _) = presentation();
    let root = p.root_node().unwrap();
    let child = p.create_node();

    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let log = seen.clone();
    p.register_listener(EventKind::TreeChanged, move |event| {
        log.borrow_mut().push(event.clone());
        Ok(())
    });

    p.execute(Command::InsertNode { parent: root, index: 0, node: child }).unwrap();
    p.undo().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(matches!(
        seen[0],
        xuk_model::DataModelEvent::TreeChanged { before: None, after: Some(0), .. }
    ));
    assert!(matches!(
        seen[1],
        xuk_model::DataModelEvent::TreeChanged { before: Some(0), after: None, .. }
    ));
}

#[test]
fn test_listener_failure_is_reported_and_not_recorded() {
    let (mut p, _) = presentation();
    p.register_listener(EventKind::MetadataAdded, |_| {
        Err(ModelError::listener("read-only view"))
    });

    let err = p
        .execute(Command::AddMetadata {
            index: 0,
            metadata: Metadata::new("dc:title", "x").unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, ModelError::Listener(_)));
    assert!(!p.can_undo());
    assert!(p.metadata().is_empty());
}

#[test]
fn test_listener_failure_reverts_tree_change() {
    let (mut p, _) = presentation();
    let root = p.root_node().unwrap();
    let child = p.create_node();
    let before = snapshot(&p);
    p.register_listener(EventKind::TreeChanged, |_| {
        Err(ModelError::listener("read-only view"))
    });

    let err = p
        .execute(Command::InsertNode { parent: root, index: 0, node: child })
        .unwrap_err();
    assert!(matches!(err, ModelError::Listener(_)));
    assert_eq!(p.tree().parent(child).unwrap(), None);
    assert_eq!(p.tree().child_count(root).unwrap(), 0);
    assert_eq!(snapshot(&p), before);
    assert!(!p.can_undo());
}

#[test]
fn test_rejected_composite_raises_no_events() {
    let (mut p, _) = presentation();
    let seen = std::rc::Rc::new(std::cell::Cell::new(0));
    for kind in [EventKind::MetadataAdded, EventKind::MetadataRemoved] {
        let counter = seen.clone();
        p.register_listener(kind, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
    }

    let mut composite = xuk_model::CompositeCommand::new();
    composite.append(Command::AddMetadata {
        index: 0,
        metadata: Metadata::new("dc:title", "x").unwrap(),
    });
    composite.append(Command::RemoveMetadata { index: 7 });

    assert!(p.execute(composite).is_err());
    assert_eq!(seen.get(), 0);
    assert!(p.metadata().is_empty());
    assert!(!p.can_undo());
}
