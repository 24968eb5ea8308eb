//! # Event Bus
//!
//! Synchronous, single-threaded publish/subscribe for data-model changes.
//!
//! ## Dispatch
//!
//! - Events are a tagged enum ([`DataModelEvent`]); listeners subscribe to an
//!   [`EventKind`] tag and dispatch is a table lookup by tag.
//! - Every data-model event is additionally routed to
//!   [`EventKind::DataModelChanged`] listeners, so one subscription observes
//!   everything.
//! - Events raised by a tree node bubble: node-scoped listeners on the source
//!   node and each of its ancestors run first, and the event reaches the
//!   presentation-level listeners only while the source is attached under
//!   the presentation's root.
//! - Listeners run on the calling thread before `notify` returns. A listener
//!   may register, unregister or notify re-entrantly; an error returned by a
//!   listener stops dispatch and propagates to the mutation that raised it.
//! - While the bus is held, events are queued instead of dispatched. Commands
//!   hold the bus while they apply so listeners only ever see a command that
//!   applied completely.

use crate::error::{ModelError, ModelResult};
use crate::ids::{ChannelId, NodeId};
use crate::media::Media;
use crate::metadata::Metadata;
use crate::property::PropertyKind;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

/// Subscription tag. One per [`DataModelEvent`] variant plus the generic
/// `DataModelChanged` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DataModelChanged,
    LanguageChanged,
    RootUriChanged,
    RootNodeChanged,
    MetadataAdded,
    MetadataRemoved,
    MetadataContentChanged,
    TreeChanged,
    PropertyAdded,
    PropertyRemoved,
    ChannelMediaChanged,
    ChannelAdded,
    ChannelRemoved,
    CommandDone,
    CommandUndone,
    CommandRedone,
}

impl EventKind {
    /// History notifications describe the undo/redo stacks, not the model.
    pub fn is_data_model_change(&self) -> bool {
        !matches!(
            self,
            EventKind::CommandDone | EventKind::CommandUndone | EventKind::CommandRedone
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataModelEvent {
    LanguageChanged {
        before: Option<String>,
        after: Option<String>,
    },
    RootUriChanged {
        before: Url,
        after: Url,
    },
    RootNodeChanged {
        before: Option<NodeId>,
        after: Option<NodeId>,
    },
    MetadataAdded {
        index: usize,
        metadata: Metadata,
    },
    MetadataRemoved {
        index: usize,
        metadata: Metadata,
    },
    MetadataContentChanged {
        index: usize,
        before: String,
        after: String,
    },
    /// `child` moved under `parent`: `before`/`after` are its index in
    /// `parent` before and after the change (`None` means detached).
    TreeChanged {
        parent: NodeId,
        child: NodeId,
        before: Option<usize>,
        after: Option<usize>,
    },
    PropertyAdded {
        node: NodeId,
        kind: PropertyKind,
    },
    PropertyRemoved {
        node: NodeId,
        kind: PropertyKind,
    },
    ChannelMediaChanged {
        node: NodeId,
        channel: ChannelId,
        before: Option<Media>,
        after: Option<Media>,
    },
    ChannelAdded {
        channel: ChannelId,
        name: String,
    },
    ChannelRemoved {
        channel: ChannelId,
        name: String,
    },
    CommandDone {
        description: String,
    },
    CommandUndone {
        description: String,
    },
    CommandRedone {
        description: String,
    },
}

impl DataModelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DataModelEvent::LanguageChanged { .. } => EventKind::LanguageChanged,
            DataModelEvent::RootUriChanged { .. } => EventKind::RootUriChanged,
            DataModelEvent::RootNodeChanged { .. } => EventKind::RootNodeChanged,
            DataModelEvent::MetadataAdded { .. } => EventKind::MetadataAdded,
            DataModelEvent::MetadataRemoved { .. } => EventKind::MetadataRemoved,
            DataModelEvent::MetadataContentChanged { .. } => EventKind::MetadataContentChanged,
            DataModelEvent::TreeChanged { .. } => EventKind::TreeChanged,
            DataModelEvent::PropertyAdded { .. } => EventKind::PropertyAdded,
            DataModelEvent::PropertyRemoved { .. } => EventKind::PropertyRemoved,
            DataModelEvent::ChannelMediaChanged { .. } => EventKind::ChannelMediaChanged,
            DataModelEvent::ChannelAdded { .. } => EventKind::ChannelAdded,
            DataModelEvent::ChannelRemoved { .. } => EventKind::ChannelRemoved,
            DataModelEvent::CommandDone { .. } => EventKind::CommandDone,
            DataModelEvent::CommandUndone { .. } => EventKind::CommandUndone,
            DataModelEvent::CommandRedone { .. } => EventKind::CommandRedone,
        }
    }

    /// Tree node that raised the event, if it bubbles.
    pub fn source_node(&self) -> Option<NodeId> {
        match self {
            DataModelEvent::TreeChanged { parent, .. } => Some(*parent),
            DataModelEvent::PropertyAdded { node, .. }
            | DataModelEvent::PropertyRemoved { node, .. }
            | DataModelEvent::ChannelMediaChanged { node, .. } => Some(*node),
            _ => None,
        }
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&DataModelEvent) -> ModelResult<()>>;

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    presentation: Vec<Registration>,
    nodes: HashMap<NodeId, Vec<Registration>>,
    held: Option<Vec<HeldEvent>>,
}

/// An event queued while the bus was held, with the bubbling chain it was
/// raised on.
#[derive(Debug, Clone)]
pub(crate) struct HeldEvent {
    chain: Vec<NodeId>,
    reaches_presentation: bool,
    event: DataModelEvent,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

/// Shared handle to one presentation's listener registry.
///
/// Cloning the bus clones the handle, not the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("EventBus")
            .field("presentation_listeners", &registry.presentation.len())
            .field("node_scopes", &registry.nodes.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `kind` at presentation level.
    pub fn register<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DataModelEvent) -> ModelResult<()> + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.allocate();
        registry.presentation.push(Registration {
            id,
            kind,
            listener: Rc::new(listener),
        });
        id
    }

    /// Subscribe to `kind` for events raised by `node` or its descendants.
    pub fn register_node<F>(&self, node: NodeId, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DataModelEvent) -> ModelResult<()> + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.allocate();
        registry.nodes.entry(node).or_default().push(Registration {
            id,
            kind,
            listener: Rc::new(listener),
        });
        id
    }

    pub fn unregister(&self, id: ListenerId) -> ModelResult<()> {
        let mut registry = self.registry.borrow_mut();
        let before = registry.presentation.len();
        registry.presentation.retain(|r| r.id != id);
        if registry.presentation.len() != before {
            return Ok(());
        }

        let mut found = false;
        registry.nodes.retain(|_, regs| {
            let len = regs.len();
            regs.retain(|r| r.id != id);
            found |= regs.len() != len;
            !regs.is_empty()
        });
        if found {
            Ok(())
        } else {
            Err(ModelError::ListenerNotFound(id.0))
        }
    }

    /// Number of presentation-level listeners subscribed to `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .borrow()
            .presentation
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Dispatch a presentation-level event.
    pub fn notify(&self, event: &DataModelEvent) -> ModelResult<()> {
        self.notify_bubbling(&[], true, event)
    }

    /// Dispatch an event raised at `chain[0]`, bubbling through the rest of
    /// `chain` (its ancestors, nearest first). Presentation-level listeners
    /// only run when `reaches_presentation` is set.
    pub(crate) fn notify_bubbling(
        &self,
        chain: &[NodeId],
        reaches_presentation: bool,
        event: &DataModelEvent,
    ) -> ModelResult<()> {
        if let Some(held) = self.registry.borrow_mut().held.as_mut() {
            held.push(HeldEvent {
                chain: chain.to_vec(),
                reaches_presentation,
                event: event.clone(),
            });
            return Ok(());
        }
        let listeners = self.collect(chain, reaches_presentation, event.kind());
        for listener in listeners {
            listener(event)?;
        }
        Ok(())
    }

    /// Start queueing events. Returns `false` if the bus was already held,
    /// in which case the caller must not release it.
    pub(crate) fn hold(&self) -> bool {
        let mut registry = self.registry.borrow_mut();
        if registry.held.is_some() {
            return false;
        }
        registry.held = Some(Vec::new());
        true
    }

    /// Stop queueing and hand back what was queued, oldest first.
    pub(crate) fn release(&self) -> Vec<HeldEvent> {
        self.registry.borrow_mut().held.take().unwrap_or_default()
    }

    /// Dispatch released events in order, stopping at the first listener
    /// error.
    pub(crate) fn dispatch(&self, events: Vec<HeldEvent>) -> ModelResult<()> {
        for held in events {
            self.notify_bubbling(&held.chain, held.reaches_presentation, &held.event)?;
        }
        Ok(())
    }

    fn collect(&self, chain: &[NodeId], reaches_presentation: bool, kind: EventKind) -> Vec<Listener> {
        let registry = self.registry.borrow();
        let matches = |r: &&Registration| {
            r.kind == kind || (r.kind == EventKind::DataModelChanged && kind.is_data_model_change())
        };

        let mut listeners: Vec<Listener> = Vec::new();
        for node in chain {
            if let Some(regs) = registry.nodes.get(node) {
                listeners.extend(regs.iter().filter(matches).map(|r| Rc::clone(&r.listener)));
            }
        }
        if reaches_presentation {
            listeners.extend(
                registry
                    .presentation
                    .iter()
                    .filter(|r| r.kind == kind)
                    .map(|r| Rc::clone(&r.listener)),
            );
            if kind.is_data_model_change() {
                listeners.extend(
                    registry
                        .presentation
                        .iter()
                        .filter(|r| r.kind == EventKind::DataModelChanged)
                        .map(|r| Rc::clone(&r.listener)),
                );
            }
        }
        listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PresentationId;
    use std::cell::Cell;

    fn language_event() -> DataModelEvent {
        DataModelEvent::LanguageChanged {
            before: None,
            after: Some("en".to_string()),
        }
    }

    #[test]
    fn test_exact_kind_and_generic_dispatch() {
        let bus = EventBus::new();
        let exact = Rc::new(Cell::new(0));
        let generic = Rc::new(Cell::new(0));
        let other = Rc::new(Cell::new(0));

        let e = Rc::clone(&exact);
        bus.register(EventKind::LanguageChanged, move |_| {
            e.set(e.get() + 1);
            Ok(())
        });
        let g = Rc::clone(&generic);
        bus.register(EventKind::DataModelChanged, move |_| {
            g.set(g.get() + 1);
            Ok(())
        });
        let o = Rc::clone(&other);
        bus.register(EventKind::RootUriChanged, move |_| {
            o.set(o.get() + 1);
            Ok(())
        });

        bus.notify(&language_event()).unwrap();
        assert_eq!(exact.get(), 1);
        assert_eq!(generic.get(), 1);
        assert_eq!(other.get(), 0);
    }

    #[test]
    fn test_history_events_skip_generic_bus() {
        let bus = EventBus::new();
        let generic = Rc::new(Cell::new(0));
        let g = Rc::clone(&generic);
        bus.register(EventKind::DataModelChanged, move |_| {
            g.set(g.get() + 1);
            Ok(())
        });

        bus.notify(&DataModelEvent::CommandDone {
            description: "x".to_string(),
        })
        .unwrap();
        assert_eq!(generic.get(), 0);
    }

    #[test]
    fn test_unregister() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = bus.register(EventKind::LanguageChanged, move |_| {
            h.set(h.get() + 1);
            Ok(())
        });
        assert_eq!(bus.listener_count(EventKind::LanguageChanged), 1);

        bus.unregister(id).unwrap();
        bus.notify(&language_event()).unwrap();
        assert_eq!(hits.get(), 0);
        assert!(matches!(
            bus.unregister(id),
            Err(ModelError::ListenerNotFound(_))
        ));
    }

    #[test]
    fn test_listener_error_propagates() {
        let bus = EventBus::new();
        let later = Rc::new(Cell::new(false));
        bus.register(EventKind::LanguageChanged, |_| Err(ModelError::listener("boom")));
        let l = Rc::clone(&later);
        bus.register(EventKind::LanguageChanged, move |_| {
            l.set(true);
            Ok(())
        });

        let err = bus.notify(&language_event()).unwrap_err();
        assert!(matches!(err, ModelError::Listener(_)));
        assert!(!later.get());
    }

    #[test]
    fn test_reentrant_registration_during_dispatch() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        bus.register(EventKind::LanguageChanged, move |_| {
            inner_bus.register(EventKind::RootUriChanged, |_| Ok(()));
            Ok(())
        });
        bus.notify(&language_event()).unwrap();
        assert_eq!(bus.listener_count(EventKind::RootUriChanged), 1);
    }

    #[test]
    fn test_bubbling_respects_attachment() {
        let bus = EventBus::new();
        let p = PresentationId::next();
        let child = NodeId::new(p, 1);
        let parent = NodeId::new(p, 0);

        let at_parent = Rc::new(Cell::new(0));
        let at_presentation = Rc::new(Cell::new(0));
        let a = Rc::clone(&at_parent);
        bus.register_node(parent, EventKind::DataModelChanged, move |_| {
            a.set(a.get() + 1);
            Ok(())
        });
        let b = Rc::clone(&at_presentation);
        bus.register(EventKind::PropertyAdded, move |_| {
            b.set(b.get() + 1);
            Ok(())
        });

        let event = DataModelEvent::PropertyAdded {
            node: child,
            kind: PropertyKind::Channels,
        };
        bus.notify_bubbling(&[child, parent], false, &event).unwrap();
        assert_eq!(at_parent.get(), 1);
        assert_eq!(at_presentation.get(), 0);

        bus.notify_bubbling(&[child, parent], true, &event).unwrap();
        assert_eq!(at_parent.get(), 2);
        assert_eq!(at_presentation.get(), 1);
    }

    #[test]
    fn test_held_events_are_queued_until_dispatched() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        bus.register(EventKind::LanguageChanged, move |_| {
            h.set(h.get() + 1);
            Ok(())
        });

        assert!(bus.hold());
        assert!(!bus.hold());
        bus.notify(&language_event()).unwrap();
        bus.notify(&language_event()).unwrap();
        assert_eq!(hits.get(), 0);

        let held = bus.release();
        assert_eq!(held.len(), 2);
        bus.dispatch(held).unwrap();
        assert_eq!(hits.get(), 2);

        // Released: events flow directly again.
        bus.notify(&language_event()).unwrap();
        assert_eq!(hits.get(), 3);
    }
}
