//! # Content Tree
//!
//! Arena of tree nodes owned by one presentation.
//!
//! ## Invariants
//!
//! - A node has at most one parent.
//! - The presentation root never has a parent.
//! - Removing a node from its parent keeps it alive as the root of a detached
//!   subtree; it can be re-attached later (this is what undo relies on).
//! - Every failed mutation leaves the arena untouched, and the tree-changed
//!   event is raised only after the mutation is fully applied.

use crate::error::{ModelError, ModelResult};
use crate::events::{DataModelEvent, EventBus};
use crate::ids::{ChannelId, NodeId, PresentationId};
use crate::media::Media;
use crate::property::{ChannelsProperty, Property, PropertyKind};
use crate::visitor::{walk_depth_first, TreeVisitor};

#[derive(Debug, Clone, Default)]
struct NodeSlot {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: Vec<Property>,
}

#[derive(Debug)]
pub struct Tree {
    presentation: PresentationId,
    nodes: Vec<NodeSlot>,
    root: Option<NodeId>,
    events: EventBus,
}

impl Tree {
    pub(crate) fn new(presentation: PresentationId, events: EventBus) -> Self {
        Self {
            presentation,
            nodes: Vec::new(),
            root: None,
            events,
        }
    }

    /// A tree holding a single default root node.
    pub(crate) fn with_root(presentation: PresentationId, events: EventBus) -> Self {
        let mut tree = Self::new(presentation, events);
        tree.root = Some(tree.create_node());
        tree
    }

    /// Copy of the arena wired to a private event bus, for trying out edits
    /// without anyone observing them.
    pub(crate) fn scratch_copy(&self) -> Tree {
        Tree {
            presentation: self.presentation,
            nodes: self.nodes.clone(),
            root: self.root,
            events: EventBus::new(),
        }
    }

    pub fn presentation(&self) -> PresentationId {
        self.presentation
    }

    /// Allocate a new detached node with no properties.
    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId::new(self.presentation, self.nodes.len());
        self.nodes.push(NodeSlot::default());
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Replace the root node. The new root must be detached.
    pub(crate) fn set_root(&mut self, root: Option<NodeId>) -> ModelResult<Option<NodeId>> {
        if let Some(node) = root {
            if self.slot(node)?.parent.is_some() {
                return Err(ModelError::HasParent(node.to_string()));
            }
        }
        let before = std::mem::replace(&mut self.root, root);
        if before != root {
            self.events
                .notify(&DataModelEvent::RootNodeChanged { before, after: root })?;
        }
        Ok(before)
    }

    /// Total number of nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node in the arena, attached or detached, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|index| NodeId::new(self.presentation, index))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.presentation() == self.presentation && node.index() < self.nodes.len()
    }

    pub fn parent(&self, node: NodeId) -> ModelResult<Option<NodeId>> {
        Ok(self.slot(node)?.parent)
    }

    pub fn children(&self, node: NodeId) -> ModelResult<&[NodeId]> {
        Ok(&self.slot(node)?.children)
    }

    pub fn child(&self, node: NodeId, index: usize) -> ModelResult<NodeId> {
        let children = &self.slot(node)?.children;
        children
            .get(index)
            .copied()
            .ok_or_else(|| ModelError::index_out_of_bounds(index, children.len()))
    }

    pub fn child_count(&self, node: NodeId) -> ModelResult<usize> {
        Ok(self.slot(node)?.children.len())
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> ModelResult<Option<usize>> {
        Ok(self.slot(parent)?.children.iter().position(|c| *c == child))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> ModelResult<()> {
        let index = self.child_count(parent)?;
        self.insert_child(parent, index, child)
    }

    /// Attach the detached node `child` at `index` in `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> ModelResult<()> {
        self.check_insert(parent, index, child)?;

        self.nodes[parent.index()].children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);

        self.emit(&DataModelEvent::TreeChanged {
            parent,
            child,
            before: None,
            after: Some(index),
        })
    }

    /// Validate an insertion without applying it.
    pub fn check_insert(&self, parent: NodeId, index: usize, child: NodeId) -> ModelResult<()> {
        let count = self.slot(parent)?.children.len();
        let child_slot = self.slot(child)?;
        if child_slot.parent.is_some() {
            return Err(ModelError::HasParent(child.to_string()));
        }
        if self.root == Some(child) {
            return Err(ModelError::RootCannotBeAttached(child.to_string()));
        }
        if self.ancestors(parent)?.contains(&child) {
            return Err(ModelError::CycleDetected {
                node: child.to_string(),
                parent: parent.to_string(),
            });
        }
        if index > count {
            return Err(ModelError::index_out_of_bounds(index, count));
        }
        Ok(())
    }

    /// Detach the child at `index`; it survives as a detached subtree root.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> ModelResult<NodeId> {
        let child = self.child(parent, index)?;

        self.nodes[parent.index()].children.remove(index);
        self.nodes[child.index()].parent = None;

        self.emit(&DataModelEvent::TreeChanged {
            parent,
            child,
            before: Some(index),
            after: None,
        })?;
        Ok(child)
    }

    /// Detach `node` from its parent, returning where it was.
    pub fn detach(&mut self, node: NodeId) -> ModelResult<Option<(NodeId, usize)>> {
        let Some(parent) = self.slot(node)?.parent else {
            return Ok(None);
        };
        let index = self
            .index_of(parent, node)?
            .ok_or_else(|| ModelError::node_not_found(node))?;
        self.remove_child(parent, index)?;
        Ok(Some((parent, index)))
    }

    /// `node` followed by its ancestors, nearest first.
    pub fn ancestors(&self, node: NodeId) -> ModelResult<Vec<NodeId>> {
        let mut chain = vec![node];
        let mut current = self.slot(node)?.parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.nodes[parent.index()].parent;
        }
        Ok(chain)
    }

    /// True when `node` is the root or a descendant of it.
    pub fn is_attached(&self, node: NodeId) -> bool {
        match (self.ancestors(node), self.root) {
            (Ok(chain), Some(root)) => chain.last() == Some(&root),
            _ => false,
        }
    }

    /// Visit `node`, then each child recursively, in child order.
    pub fn accept_depth_first<V: TreeVisitor>(&self, node: NodeId, visitor: &mut V) -> ModelResult<()> {
        self.slot(node)?;
        walk_depth_first(visitor, self, node);
        Ok(())
    }

    /// Pre-order iterator over the subtree rooted at `node`.
    pub fn depth_first(&self, node: NodeId) -> DepthFirst<'_> {
        let stack = if self.contains(node) { vec![node] } else { Vec::new() };
        DepthFirst { tree: self, stack }
    }

    pub fn properties(&self, node: NodeId) -> ModelResult<&[Property]> {
        Ok(&self.slot(node)?.properties)
    }

    pub fn property(&self, node: NodeId, kind: PropertyKind) -> ModelResult<Option<&Property>> {
        Ok(self.slot(node)?.properties.iter().find(|p| p.kind() == kind))
    }

    pub fn channels_property(&self, node: NodeId) -> ModelResult<Option<&ChannelsProperty>> {
        Ok(self
            .property(node, PropertyKind::Channels)?
            .and_then(Property::as_channels))
    }

    pub(crate) fn channels_property_mut(&mut self, node: NodeId) -> ModelResult<Option<&mut ChannelsProperty>> {
        Ok(self
            .slot_mut(node)?
            .properties
            .iter_mut()
            .find_map(Property::as_channels_mut))
    }

    /// Attach `property` to `node`. A node holds at most one property per kind.
    pub fn add_property(&mut self, node: NodeId, property: Property) -> ModelResult<()> {
        let kind = property.kind();
        let slot = self.slot_mut(node)?;
        if slot.properties.iter().any(|p| p.kind() == kind) {
            return Err(ModelError::DuplicateProperty {
                node: node.to_string(),
                kind: kind.name(),
            });
        }
        slot.properties.push(property);
        self.emit(&DataModelEvent::PropertyAdded { node, kind })
    }

    pub fn remove_property(&mut self, node: NodeId, kind: PropertyKind) -> ModelResult<Property> {
        let slot = self.slot_mut(node)?;
        let pos = slot
            .properties
            .iter()
            .position(|p| p.kind() == kind)
            .ok_or_else(|| ModelError::PropertyNotFound {
                node: node.to_string(),
                kind: kind.name(),
            })?;
        let property = slot.properties.remove(pos);
        self.emit(&DataModelEvent::PropertyRemoved { node, kind })?;
        Ok(property)
    }

    /// Map (or with `None`, clear) media on one channel of `node`'s channels
    /// property, returning the previous media. Setting equal media is a
    /// no-op and raises nothing.
    pub(crate) fn set_channel_media(
        &mut self,
        node: NodeId,
        channel: ChannelId,
        media: Option<Media>,
    ) -> ModelResult<Option<Media>> {
        let property = self
            .channels_property_mut(node)?
            .ok_or_else(|| ModelError::NoChannelsProperty(node.to_string()))?;

        let unchanged = match &media {
            Some(m) => property.media(channel).ok() == Some(m),
            None => !property.has_channel(channel),
        };
        if unchanged {
            return Ok(media);
        }

        let before = match media.clone() {
            Some(m) => property.set_media(channel, m),
            None => property.clear_channel(channel),
        };
        self.emit(&DataModelEvent::ChannelMediaChanged {
            node,
            channel,
            before: before.clone(),
            after: media,
        })?;
        Ok(before)
    }

    /// Dispatch an event raised by a node, bubbling through its ancestors.
    pub(crate) fn emit(&self, event: &DataModelEvent) -> ModelResult<()> {
        match event.source_node() {
            Some(source) => {
                let chain = self.ancestors(source)?;
                let attached = self.root.is_some() && chain.last() == self.root.as_ref();
                self.events.notify_bubbling(&chain, attached, event)
            }
            None => self.events.notify(event),
        }
    }

    pub(crate) fn check_node(&self, node: NodeId) -> ModelResult<()> {
        self.slot(node).map(|_| ())
    }

    fn slot(&self, node: NodeId) -> ModelResult<&NodeSlot> {
        if node.presentation() != self.presentation {
            return Err(ModelError::DifferentPresentation {
                node: node.to_string(),
            });
        }
        self.nodes
            .get(node.index())
            .ok_or_else(|| ModelError::node_not_found(node))
    }

    fn slot_mut(&mut self, node: NodeId) -> ModelResult<&mut NodeSlot> {
        if node.presentation() != self.presentation {
            return Err(ModelError::DifferentPresentation {
                node: node.to_string(),
            });
        }
        self.nodes
            .get_mut(node.index())
            .ok_or_else(|| ModelError::node_not_found(node))
    }
}

/// Pre-order traversal. Consumed once; start a new one to repeat.
pub struct DepthFirst<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        if let Ok(children) = self.tree.children(node) {
            self.stack.extend(children.iter().rev().copied());
        }
        Some(node)
    }
}
