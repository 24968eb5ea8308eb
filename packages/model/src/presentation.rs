//! # Presentation
//!
//! Aggregate root of one document: the content tree, its channels, media
//! data and data providers, metadata, undo/redo history and factories.
//!
//! All entities are owned by arenas inside the presentation and referenced
//! by handles carrying the presentation's id. Moving content into another
//! presentation goes through [`Presentation::export_subtree`].

use crate::channel::{ChannelKind, ChannelsManager};
use crate::command::{Command, EditContext};
use crate::data_provider::{DataProviderKind, DataProviderManager};
use crate::error::{ModelError, ModelResult};
use crate::events::{DataModelEvent, EventBus, EventKind, ListenerId};
use crate::factory::{
    DefaultChannelFactory, DefaultDataProviderFactory, DefaultMediaDataFactory, DefaultMediaFactory,
    DefaultNodeFactory, DefaultPropertyFactory, Factory, NodeKind,
};
use crate::ids::{ChannelId, DataProviderId, MediaDataId, NodeId, PresentationId};
use crate::media::Media;
use crate::media_data::{MediaData, MediaDataManager};
use crate::metadata::Metadata;
use crate::property::{ChannelsProperty, Property};
use crate::tree::Tree;
use crate::undo::UndoRedoManager;
use crate::ValueEquals;
use serde::Serialize;
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};
use url::Url;

#[derive(Default)]
struct Factories {
    node: OnceCell<Box<dyn Factory<NodeKind>>>,
    property: OnceCell<Box<dyn Factory<Property>>>,
    media: OnceCell<Box<dyn Factory<Media>>>,
    channel: OnceCell<Box<dyn Factory<ChannelKind>>>,
    media_data: OnceCell<Box<dyn Factory<MediaData>>>,
    data_provider: OnceCell<Box<dyn Factory<DataProviderKind>>>,
}

impl fmt::Debug for Factories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factories")
            .field("node", &self.node.get().is_some())
            .field("property", &self.property.get().is_some())
            .field("media", &self.media.get().is_some())
            .field("channel", &self.channel.get().is_some())
            .field("media_data", &self.media_data.get().is_some())
            .field("data_provider", &self.data_provider.get().is_some())
            .finish()
    }
}

macro_rules! factory_slot {
    ($field:ident, $ty:ty, $setter:ident, $getter:ident, $label:literal) => {
        /// Install the factory. Fails if one is already set.
        pub fn $setter(&self, factory: impl Factory<$ty> + 'static) -> ModelResult<()> {
            self.factories
                .$field
                .set(Box::new(factory))
                .map_err(|_| ModelError::AlreadyInitialized($label))
        }

        pub fn $getter(&self) -> ModelResult<&dyn Factory<$ty>> {
            self.factories
                .$field
                .get()
                .map(|f| &**f)
                .ok_or(ModelError::NotInitialized($label))
        }
    };
}

/// Outcome of [`Presentation::cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed_media_data: usize,
    pub removed_data_providers: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub name: String,
    pub kind: ChannelKind,
    pub language: Option<String>,
    pub media_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSummary {
    pub root_uri: String,
    pub language: Option<String>,
    pub node_count: usize,
    pub depth: usize,
    pub channels: Vec<ChannelSummary>,
    pub media_counts: BTreeMap<String, usize>,
    pub metadata: Vec<Metadata>,
    pub media_data_count: usize,
    pub data_provider_count: usize,
    pub undo_levels: usize,
    pub redo_levels: usize,
}

impl PresentationSummary {
    pub fn to_json(&self) -> ModelResult<String> {
        serde_json::to_string_pretty(self).map_err(ModelError::serialization)
    }
}

#[derive(Debug)]
pub struct Presentation {
    id: PresentationId,
    events: EventBus,
    root_uri: Url,
    language: Option<String>,
    tree: Tree,
    channels: ChannelsManager,
    data_providers: DataProviderManager,
    media_data: MediaDataManager,
    metadata: Vec<Metadata>,
    undo_redo: UndoRedoManager,
    factories: Factories,
}

impl Presentation {
    /// A presentation with a default root node and no factories installed.
    pub fn new(root_uri: Url) -> Self {
        let id = PresentationId::next();
        let events = EventBus::new();
        let root_uri = directory_url(root_uri);
        let mut data_providers = DataProviderManager::new(id);
        data_providers.set_base_path(root_uri.to_file_path().ok());

        Self {
            id,
            tree: Tree::with_root(id, events.clone()),
            channels: ChannelsManager::new(id, events.clone()),
            data_providers,
            media_data: MediaDataManager::new(id),
            metadata: Vec::new(),
            undo_redo: UndoRedoManager::new(),
            language: None,
            root_uri,
            events,
            factories: Factories::default(),
        }
    }

    pub fn id(&self) -> PresentationId {
        self.id
    }

    // Factories

    factory_slot!(node, NodeKind, set_node_factory, node_factory, "node factory");
    factory_slot!(property, Property, set_property_factory, property_factory, "property factory");
    factory_slot!(media, Media, set_media_factory, media_factory, "media factory");
    factory_slot!(channel, ChannelKind, set_channel_factory, channel_factory, "channel factory");
    factory_slot!(
        media_data,
        MediaData,
        set_media_data_factory,
        media_data_factory,
        "media data factory"
    );
    factory_slot!(
        data_provider,
        DataProviderKind,
        set_data_provider_factory,
        data_provider_factory,
        "data provider factory"
    );

    /// Fill every factory slot that is still empty with the default factory.
    pub fn install_default_factories(&self) {
        // Already-set slots keep their factory; the error is expected there.
        let _ = self.factories.node.set(Box::new(DefaultNodeFactory));
        let _ = self.factories.property.set(Box::new(DefaultPropertyFactory));
        let _ = self.factories.media.set(Box::new(DefaultMediaFactory));
        let _ = self.factories.channel.set(Box::new(DefaultChannelFactory));
        let _ = self.factories.media_data.set(Box::new(DefaultMediaDataFactory));
        let _ = self.factories.data_provider.set(Box::new(DefaultDataProviderFactory));
    }

    // Events

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn register_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DataModelEvent) -> ModelResult<()> + 'static,
    {
        self.events.register(kind, listener)
    }

    /// Listen to events raised by `node` or bubbling up from its descendants.
    pub fn register_node_listener<F>(&self, node: NodeId, kind: EventKind, listener: F) -> ModelResult<ListenerId>
    where
        F: Fn(&DataModelEvent) -> ModelResult<()> + 'static,
    {
        self.tree.check_node(node)?;
        Ok(self.events.register_node(node, kind, listener))
    }

    pub fn unregister_listener(&self, id: ListenerId) -> ModelResult<()> {
        self.events.unregister(id)
    }

    // Scalars

    pub fn root_uri(&self) -> &Url {
        &self.root_uri
    }

    /// Move the presentation root. Relative media locations and the data
    /// directory resolve against it.
    pub fn set_root_uri(&mut self, root_uri: Url) -> ModelResult<()> {
        let root_uri = directory_url(root_uri);
        if root_uri == self.root_uri {
            return Ok(());
        }
        let before = std::mem::replace(&mut self.root_uri, root_uri.clone());
        self.data_providers.set_base_path(root_uri.to_file_path().ok());
        self.events.notify(&DataModelEvent::RootUriChanged {
            before,
            after: root_uri,
        })
    }

    /// Resolve a media `src` against the root URI. `"."` denotes the root.
    pub fn resolve_src(&self, src: &str) -> ModelResult<Url> {
        if src.is_empty() || src == "." {
            return Ok(self.root_uri.clone());
        }
        self.root_uri
            .join(src)
            .map_err(|e| ModelError::invalid_uri(src, e))
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Set the language directly, outside the undo/redo history.
    pub fn set_language(&mut self, language: Option<String>) -> ModelResult<()> {
        let (_, mut ctx) = self.split();
        ctx.set_language(language).map(|_| ())
    }

    // Tree

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn root_node(&self) -> Option<NodeId> {
        self.tree.root()
    }

    pub fn set_root_node(&mut self, node: Option<NodeId>) -> ModelResult<Option<NodeId>> {
        self.tree.set_root(node)
    }

    pub fn create_node(&mut self) -> NodeId {
        self.tree.create_node()
    }

    // Channels

    pub fn channels(&self) -> &ChannelsManager {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelsManager {
        &mut self.channels
    }

    /// Unregister a channel nothing in the tree or the history maps media through.
    pub fn remove_channel(&mut self, channel: ChannelId) -> ModelResult<()> {
        let name = self.channels.channel(channel)?.name().to_string();
        let mapped_in_tree = self.tree.nodes().any(|node| {
            matches!(self.tree.channels_property(node), Ok(Some(p)) if p.has_channel(channel))
        });
        if mapped_in_tree || self.undo_redo.referenced_channels().contains(&channel) {
            return Err(ModelError::ChannelInUse(name));
        }
        self.channels.remove_channel(channel).map(|_| ())
    }

    // Media

    /// Map `media` on `channel` of `node` directly, outside the history.
    /// Creates the node's channels property if it has none.
    pub fn set_media(&mut self, node: NodeId, channel: ChannelId, media: Media) -> ModelResult<Option<Media>> {
        let (_, mut ctx) = self.split();
        ctx.tree.check_node(node)?;
        ctx.check_media(channel, &media)?;
        if ctx.tree.channels_property(node)?.is_none() {
            ctx.tree.add_property(node, ChannelsProperty::new().into())?;
        }
        ctx.tree.set_channel_media(node, channel, Some(media))
    }

    pub fn media(&self, node: NodeId, channel: ChannelId) -> ModelResult<&Media> {
        self.tree
            .channels_property(node)?
            .ok_or_else(|| ModelError::NoChannelsProperty(node.to_string()))?
            .media(channel)
    }

    pub fn clear_channel(&mut self, node: NodeId, channel: ChannelId) -> ModelResult<Option<Media>> {
        self.tree.set_channel_media(node, channel, None)
    }

    /// Every media mapped on `node`, across its channels properties.
    pub fn used_media(&self, node: NodeId) -> ModelResult<Vec<&Media>> {
        Ok(self
            .tree
            .properties(node)?
            .iter()
            .filter_map(Property::as_channels)
            .flat_map(|p| p.mappings().map(|(_, media)| media))
            .collect())
    }

    /// Every mapping in the tree below the root, depth first.
    pub fn used_media_all(&self) -> Vec<(NodeId, ChannelId, &Media)> {
        match self.tree.root() {
            Some(root) => self.subtree_media(root),
            None => Vec::new(),
        }
    }

    fn subtree_media(&self, node: NodeId) -> Vec<(NodeId, ChannelId, &Media)> {
        let mut out = Vec::new();
        for node in self.tree.depth_first(node) {
            if let Ok(Some(property)) = self.tree.channels_property(node) {
                out.extend(property.mappings().map(|(channel, media)| (node, channel, media)));
            }
        }
        out
    }

    // Media data and data providers

    pub fn media_data(&self) -> &MediaDataManager {
        &self.media_data
    }

    pub fn media_data_mut(&mut self) -> &mut MediaDataManager {
        &mut self.media_data
    }

    pub fn data_providers(&self) -> &DataProviderManager {
        &self.data_providers
    }

    pub fn data_providers_mut(&mut self) -> &mut DataProviderManager {
        &mut self.data_providers
    }

    // Metadata

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn metadata_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Metadata> + 'a {
        self.metadata.iter().filter(move |m| m.name() == name)
    }

    pub fn add_metadata(&mut self, metadata: Metadata) -> ModelResult<()> {
        let index = self.metadata.len();
        self.insert_metadata(index, metadata)
    }

    pub fn insert_metadata(&mut self, index: usize, metadata: Metadata) -> ModelResult<()> {
        let (_, mut ctx) = self.split();
        ctx.insert_metadata(index, metadata)
    }

    pub fn remove_metadata(&mut self, index: usize) -> ModelResult<Metadata> {
        let (_, mut ctx) = self.split();
        ctx.remove_metadata(index)
    }

    pub fn set_metadata_content(&mut self, index: usize, content: impl Into<String>) -> ModelResult<()> {
        let (_, mut ctx) = self.split();
        ctx.set_metadata_content(index, content.into()).map(|_| ())
    }

    // History

    pub fn undo_redo(&self) -> &UndoRedoManager {
        &self.undo_redo
    }

    pub fn undo_redo_mut(&mut self) -> &mut UndoRedoManager {
        &mut self.undo_redo
    }

    pub fn execute(&mut self, command: impl Into<Command>) -> ModelResult<()> {
        let (undo_redo, mut ctx) = self.split();
        undo_redo.execute(command.into(), &mut ctx)
    }

    pub fn undo(&mut self) -> ModelResult<bool> {
        let (undo_redo, mut ctx) = self.split();
        undo_redo.undo(&mut ctx)
    }

    pub fn redo(&mut self) -> ModelResult<bool> {
        let (undo_redo, mut ctx) = self.split();
        undo_redo.redo(&mut ctx)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_redo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_redo.can_redo()
    }

    pub fn start_transaction(&mut self, description: impl Into<String>) -> ModelResult<()> {
        self.undo_redo.start_transaction(description)
    }

    pub fn end_transaction(&mut self) -> ModelResult<()> {
        let (undo_redo, mut ctx) = self.split();
        undo_redo.end_transaction(&mut ctx)
    }

    pub fn cancel_transaction(&mut self) -> ModelResult<()> {
        let (undo_redo, mut ctx) = self.split();
        undo_redo.cancel_transaction(&mut ctx)
    }

    /// Check a command against the current state without running it.
    pub fn validate_command(&mut self, command: &Command) -> ModelResult<()> {
        let (_, ctx) = self.split();
        command.validate(&ctx)
    }

    fn split(&mut self) -> (&mut UndoRedoManager, EditContext<'_>) {
        let ctx = EditContext {
            tree: &mut self.tree,
            channels: &self.channels,
            media_data: &self.media_data,
            metadata: &mut self.metadata,
            language: &mut self.language,
            events: &self.events,
        };
        (&mut self.undo_redo, ctx)
    }

    // Copy and export

    /// Deep copy of a subtree as a new detached node of this presentation.
    /// Managed audio in the copy shares the original's media data.
    pub fn copy_subtree(&mut self, node: NodeId) -> ModelResult<NodeId> {
        let properties = self.tree.properties(node)?.to_vec();
        let children = self.tree.children(node)?.to_vec();

        let copy = self.tree.create_node();
        for property in properties {
            self.tree.add_property(copy, property)?;
        }
        for child in children {
            let child_copy = self.copy_subtree(child)?;
            self.tree.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Copy a subtree into `dest` as a new detached node.
    ///
    /// Channels are matched by name and created in `dest` when missing; media
    /// data and their data-provider files are copied.
    pub fn export_subtree(&self, node: NodeId, dest: &mut Presentation) -> ModelResult<NodeId> {
        self.tree.check_node(node)?;
        let mut export = Export::default();

        // Check every mapping against the channel it lands in, existing or
        // yet to be created, before `dest` is touched.
        let media = self.subtree_media(node);
        for (_, channel, media) in &media {
            let source = self.channels.channel(*channel)?;
            let kind = dest
                .channels
                .channel_by_name(source.name())
                .map(|existing| existing.kind())
                .unwrap_or(source.kind());
            kind.check_accepts(source.name(), media)?;
        }
        for (_, channel, _) in &media {
            export.channel(self, dest, *channel)?;
        }
        for (_, _, media) in media {
            let mut referenced = Vec::new();
            media.collect_media_data(&mut referenced);
            for id in referenced {
                export.media_data(self, dest, id)?;
            }
        }

        let copy = self.export_node(node, dest, &export)?;
        debug!(node = %node, copy = %copy, "exported subtree");
        Ok(copy)
    }

    fn export_node(&self, node: NodeId, dest: &mut Presentation, export: &Export) -> ModelResult<NodeId> {
        let copy = dest.tree.create_node();
        for property in self.tree.properties(node)? {
            let property = match property {
                Property::Channels(channels) => {
                    let mut remapped = ChannelsProperty::new();
                    for (channel, media) in channels.mappings() {
                        let mut media = media.clone();
                        media.remap_media_data(&mut |id| export.media_data.get(&id).copied().unwrap_or(id));
                        let dest_channel = export
                            .channels
                            .get(&channel)
                            .copied()
                            .ok_or_else(|| ModelError::ChannelNotFound(channel.to_string()))?;
                        remapped.set_media(dest_channel, media);
                    }
                    Property::Channels(remapped)
                }
                other => other.clone(),
            };
            dest.tree.add_property(copy, property)?;
        }
        for child in self.tree.children(node)? {
            let child_copy = self.export_node(*child, dest, export)?;
            dest.tree.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    // Cleanup

    /// Media data reachable from the tree below the root or from the history.
    pub fn referenced_media_data(&self) -> HashSet<MediaDataId> {
        let mut referenced = Vec::new();
        for (_, _, media) in self.used_media_all() {
            media.collect_media_data(&mut referenced);
        }
        for node in self.undo_redo.referenced_nodes() {
            if self.tree.contains(node) {
                for (_, _, media) in self.subtree_media(node) {
                    media.collect_media_data(&mut referenced);
                }
            }
        }
        referenced.extend(self.undo_redo.referenced_media_data());
        referenced.into_iter().collect()
    }

    /// Delete media data nothing references, then data providers no
    /// remaining media data uses.
    pub fn cleanup(&mut self) -> ModelResult<CleanupReport> {
        let mut report = CleanupReport::default();

        let referenced = self.referenced_media_data();
        let (kept, removed): (Vec<MediaDataId>, Vec<MediaDataId>) = self
            .media_data
            .ids()
            .into_iter()
            .partition(|id| referenced.contains(id));

        let mut used = HashSet::new();
        for id in kept {
            used.extend(self.media_data.get(id)?.data_providers());
        }
        let unused: Vec<DataProviderId> = self
            .data_providers
            .data_providers()
            .map(|p| p.id())
            .filter(|id| !used.contains(id))
            .collect();
        // Nothing is removed while a doomed provider still has a stream open.
        if let Some(busy) = unused
            .iter()
            .find(|id| matches!(self.data_providers.get(**id), Ok(p) if p.open_stream_count() > 0))
        {
            return Err(ModelError::DataProviderInUse(busy.to_string()));
        }

        for id in removed {
            self.media_data.remove(id)?;
            report.removed_media_data += 1;
        }
        for id in unused {
            self.data_providers.delete(id)?;
            report.removed_data_providers += 1;
        }

        info!(
            presentation = %self.id,
            removed_media_data = report.removed_media_data,
            removed_data_providers = report.removed_data_providers,
            "cleanup complete"
        );
        Ok(report)
    }

    // Inspection

    /// Re-check every mapping reachable from the root: channel registered
    /// and accepting, media valid, media data and data providers present.
    pub fn validate(&self) -> ModelResult<()> {
        for (_, channel, media) in self.used_media_all() {
            self.channels.check_accepts(channel, media)?;
            media.validate()?;
            let mut referenced = Vec::new();
            media.collect_media_data(&mut referenced);
            for id in referenced {
                for provider in self.media_data.get(id)?.data_providers() {
                    self.data_providers.get(provider)?;
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> PresentationSummary {
        let mut media_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut per_channel: HashMap<ChannelId, usize> = HashMap::new();
        for (_, channel, media) in self.used_media_all() {
            *media_counts.entry(media.xuk_local_name().to_string()).or_default() += 1;
            *per_channel.entry(channel).or_default() += 1;
        }

        let (node_count, depth) = match self.tree.root() {
            Some(root) => {
                let nodes: Vec<NodeId> = self.tree.depth_first(root).collect();
                let depth = nodes
                    .iter()
                    .filter_map(|n| self.tree.ancestors(*n).ok())
                    .map(|chain| chain.len())
                    .max()
                    .unwrap_or(0);
                (nodes.len(), depth)
            }
            None => (0, 0),
        };

        PresentationSummary {
            root_uri: self.root_uri.to_string(),
            language: self.language.clone(),
            node_count,
            depth,
            channels: self
                .channels
                .channels()
                .map(|c| ChannelSummary {
                    name: c.name().to_string(),
                    kind: c.kind(),
                    language: c.language().map(str::to_string),
                    media_count: per_channel.get(&c.id()).copied().unwrap_or(0),
                })
                .collect(),
            media_counts,
            metadata: self.metadata.clone(),
            media_data_count: self.media_data.len(),
            data_provider_count: self.data_providers.len(),
            undo_levels: self.undo_redo.undo_levels(),
            redo_levels: self.undo_redo.redo_levels(),
        }
    }

    // Value equality helpers

    fn node_value_equals(&self, a: NodeId, other: &Presentation, b: NodeId) -> bool {
        let (Ok(props_a), Ok(props_b)) = (self.tree.properties(a), other.tree.properties(b)) else {
            return false;
        };
        let (Ok(children_a), Ok(children_b)) = (self.tree.children(a), other.tree.children(b)) else {
            return false;
        };
        props_a.len() == props_b.len()
            && props_a.iter().all(|pa| {
                props_b
                    .iter()
                    .any(|pb| self.property_value_equals(pa, other, pb))
            })
            && children_a.len() == children_b.len()
            && children_a
                .iter()
                .zip(children_b.iter())
                .all(|(ca, cb)| self.node_value_equals(*ca, other, *cb))
    }

    fn property_value_equals(&self, a: &Property, other: &Presentation, b: &Property) -> bool {
        match (a, b) {
            (Property::Xml(a), Property::Xml(b)) => a == b,
            (Property::Channels(a), Property::Channels(b)) => {
                a.len() == b.len()
                    && a.mappings().all(|(channel, media)| {
                        let Ok(name) = self.channels.channel(channel).map(|c| c.name()) else {
                            return false;
                        };
                        let Ok(other_channel) = other.channels.channel_by_name(name) else {
                            return false;
                        };
                        b.media(other_channel.id())
                            .map(|other_media| self.media_value_equals(media, other, other_media))
                            .unwrap_or(false)
                    })
            }
            _ => false,
        }
    }

    fn media_value_equals(&self, a: &Media, other: &Presentation, b: &Media) -> bool {
        match (a, b) {
            (Media::ManagedAudio(a), Media::ManagedAudio(b)) => {
                a.language == b.language
                    && self.media_data.position(a.media_data).is_some()
                    && self.media_data.position(a.media_data) == other.media_data.position(b.media_data)
            }
            (Media::Sequence(a), Media::Sequence(b)) => {
                a.allows_multiple_types() == b.allows_multiple_types()
                    && a.language == b.language
                    && a.len() == b.len()
                    && a.items()
                        .iter()
                        .zip(b.items())
                        .all(|(x, y)| self.media_value_equals(x, other, y))
            }
            (a, b) => a == b,
        }
    }

    fn media_data_value_equals(&self, other: &Presentation) -> bool {
        self.media_data.len() == other.media_data.len()
            && self
                .media_data
                .media_data()
                .zip(other.media_data.media_data())
                .all(|((_, a), (_, b))| match (a, b) {
                    (MediaData::WavAudio(a), MediaData::WavAudio(b)) => {
                        a.pcm == b.pcm
                            && a.clips().len() == b.clips().len()
                            && a.clips().iter().zip(b.clips()).all(|(x, y)| {
                                x.clip == y.clip
                                    && self.data_providers.position(x.data_provider)
                                        == other.data_providers.position(y.data_provider)
                            })
                    }
                })
    }
}

impl ValueEquals for Presentation {
    /// Root URIs are not compared: a presentation read from another location
    /// is re-based but otherwise equal.
    fn value_equals(&self, other: &Self) -> bool {
        let roots_equal = match (self.tree.root(), other.tree.root()) {
            (Some(a), Some(b)) => self.node_value_equals(a, other, b),
            (None, None) => true,
            _ => false,
        };
        self.language == other.language
            && self.metadata == other.metadata
            && self.channels.value_equals(&other.channels)
            && self.data_providers.value_equals(&other.data_providers)
            && self.media_data_value_equals(other)
            && roots_equal
    }
}

/// Handle translation tables used while exporting into another presentation.
#[derive(Default)]
struct Export {
    channels: HashMap<ChannelId, ChannelId>,
    media_data: HashMap<MediaDataId, MediaDataId>,
    data_providers: HashMap<DataProviderId, DataProviderId>,
}

impl Export {
    fn channel(&mut self, source: &Presentation, dest: &mut Presentation, id: ChannelId) -> ModelResult<ChannelId> {
        if let Some(mapped) = self.channels.get(&id) {
            return Ok(*mapped);
        }
        let channel = source.channels.channel(id)?;
        let mapped = match dest.channels.channel_by_name(channel.name()) {
            Ok(existing) => existing.id(),
            Err(_) => {
                let created = dest.channels.add_channel(channel.name(), channel.kind())?;
                dest.channels
                    .set_channel_language(created, channel.language().map(str::to_string))?;
                created
            }
        };
        self.channels.insert(id, mapped);
        Ok(mapped)
    }

    fn media_data(&mut self, source: &Presentation, dest: &mut Presentation, id: MediaDataId) -> ModelResult<MediaDataId> {
        if let Some(mapped) = self.media_data.get(&id) {
            return Ok(*mapped);
        }
        let mut data = source.media_data.get(id)?.clone();
        let mut remapped: HashMap<DataProviderId, DataProviderId> = HashMap::new();
        for provider in data.data_providers() {
            let copy = match self.data_providers.get(&provider) {
                Some(copy) => *copy,
                None => {
                    let copy = dest.data_providers.import(&source.data_providers, provider)?;
                    self.data_providers.insert(provider, copy);
                    copy
                }
            };
            remapped.insert(provider, copy);
        }
        data.remap_data_providers(&mut |p| remapped.get(&p).copied().unwrap_or(p));
        let mapped = dest.media_data.add(data);
        self.media_data.insert(id, mapped);
        Ok(mapped)
    }
}

/// Root URIs name directories; make sure relative joins stay inside them.
fn directory_url(mut url: Url) -> Url {
    if !url.cannot_be_a_base() && !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
