//! # Commands
//!
//! Reversible units of change, applied to a presentation through an
//! [`EditContext`].
//!
//! ## Design
//!
//! - Each command validates against the current state before touching it
//! - The inverse is computed before applying, from the state it replaces
//! - Applying raises exactly the event describing the change; undoing runs
//!   the inverse, which raises the same event kind with before/after swapped
//! - A composite applies its sub-commands in order, each validated against
//!   the state its predecessors left; if one fails, the ones already
//!   applied are rolled back
//! - Events are held while a command applies and dispatched once it has
//!   applied completely. A rolled back composite raises nothing; a listener
//!   rejecting a dispatched event reverts the whole command

use crate::channel::ChannelsManager;
use crate::error::{ModelError, ModelResult};
use crate::events::{DataModelEvent, EventBus};
use crate::ids::{ChannelId, MediaDataId, NodeId};
use crate::media::Media;
use crate::media_data::MediaDataManager;
use crate::metadata::Metadata;
use crate::property::{Property, PropertyKind};
use crate::tree::Tree;
use tracing::warn;

/// Mutable view of the parts of a presentation that commands edit.
pub struct EditContext<'a> {
    pub(crate) tree: &'a mut Tree,
    pub(crate) channels: &'a ChannelsManager,
    pub(crate) media_data: &'a MediaDataManager,
    pub(crate) metadata: &'a mut Vec<Metadata>,
    pub(crate) language: &'a mut Option<String>,
    pub(crate) events: &'a EventBus,
}

impl EditContext<'_> {
    pub fn tree(&self) -> &Tree {
        &*self.tree
    }

    pub fn metadata(&self) -> &[Metadata] {
        self.metadata.as_slice()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Validate and apply `command` with its events held back, then dispatch
    /// them. If a listener rejects one, the command is reverted and the
    /// listener's error returned. Returns the inverse.
    pub(crate) fn run(&mut self, command: &Command) -> ModelResult<Command> {
        if !self.events.hold() {
            return command.execute(self);
        }
        let applied = command.execute(self);
        let held = self.events.release();
        let inverse = applied?;

        if let Err(err) = self.events.dispatch(held) {
            warn!(command = %command.description(), error = %err, "listener rejected command, reverting");
            self.revert(&inverse);
            return Err(err);
        }
        Ok(inverse)
    }

    /// Apply an inverse after a listener failure. Its events still reach the
    /// listeners that saw the original change; their errors are only logged.
    fn revert(&mut self, inverse: &Command) {
        let held = self.events.hold();
        if let Err(err) = inverse.execute(self) {
            warn!(error = %err, "revert failed");
        }
        if held {
            let events = self.events.release();
            if let Err(err) = self.events.dispatch(events) {
                warn!(error = %err, "listener failed while reverting");
            }
        }
    }

    /// Check a media value against the channel it is about to be mapped on.
    pub(crate) fn check_media(&self, channel: ChannelId, media: &Media) -> ModelResult<()> {
        self.channels.check_accepts(channel, media)?;
        media.validate()?;
        let mut referenced = Vec::new();
        media.collect_media_data(&mut referenced);
        for id in referenced {
            self.media_data.get(id)?;
        }
        Ok(())
    }

    pub(crate) fn check_property(&self, property: &Property) -> ModelResult<()> {
        if let Property::Channels(channels) = property {
            for (channel, media) in channels.mappings() {
                self.check_media(channel, media)?;
            }
        }
        Ok(())
    }

    pub(crate) fn insert_metadata(&mut self, index: usize, metadata: Metadata) -> ModelResult<()> {
        if index > self.metadata.len() {
            return Err(ModelError::index_out_of_bounds(index, self.metadata.len()));
        }
        self.metadata.insert(index, metadata.clone());
        self.events
            .notify(&DataModelEvent::MetadataAdded { index, metadata })
    }

    pub(crate) fn remove_metadata(&mut self, index: usize) -> ModelResult<Metadata> {
        if index >= self.metadata.len() {
            return Err(ModelError::index_out_of_bounds(index, self.metadata.len()));
        }
        let metadata = self.metadata.remove(index);
        self.events.notify(&DataModelEvent::MetadataRemoved {
            index,
            metadata: metadata.clone(),
        })?;
        Ok(metadata)
    }

    pub(crate) fn set_metadata_content(&mut self, index: usize, content: String) -> ModelResult<String> {
        let count = self.metadata.len();
        let entry = self
            .metadata
            .get_mut(index)
            .ok_or_else(|| ModelError::index_out_of_bounds(index, count))?;
        if entry.content() == content {
            return Ok(content);
        }
        let before = entry.set_content(content.clone());
        self.events.notify(&DataModelEvent::MetadataContentChanged {
            index,
            before: before.clone(),
            after: content,
        })?;
        Ok(before)
    }

    pub(crate) fn set_language(&mut self, language: Option<String>) -> ModelResult<Option<String>> {
        let language = language.filter(|l| !l.is_empty());
        if *self.language == language {
            return Ok(language);
        }
        let before = std::mem::replace(self.language, language.clone());
        self.events.notify(&DataModelEvent::LanguageChanged {
            before: before.clone(),
            after: language,
        })?;
        Ok(before)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Attach the detached `node` at `index` under `parent`.
    InsertNode {
        parent: NodeId,
        index: usize,
        node: NodeId,
    },
    /// Detach the child at `index`. The node survives for undo.
    RemoveNode { parent: NodeId, index: usize },
    AddProperty { node: NodeId, property: Property },
    RemoveProperty { node: NodeId, kind: PropertyKind },
    /// Map media on a channel of the node's channels property; `None` clears.
    SetChannelMedia {
        node: NodeId,
        channel: ChannelId,
        media: Option<Media>,
    },
    AddMetadata { index: usize, metadata: Metadata },
    RemoveMetadata { index: usize },
    SetMetadataContent { index: usize, content: String },
    SetLanguage { language: Option<String> },
    Composite(CompositeCommand),
}

impl Command {
    /// Check preconditions without applying.
    pub fn validate(&self, ctx: &EditContext<'_>) -> ModelResult<()> {
        match self {
            Command::InsertNode {
                parent,
                index,
                node,
            } => ctx.tree.check_insert(*parent, *index, *node),

            Command::RemoveNode { parent, index } => ctx.tree.child(*parent, *index).map(|_| ()),

            Command::AddProperty { node, property } => {
                ctx.tree.check_node(*node)?;
                let kind = property.kind();
                if ctx.tree.property(*node, kind)?.is_some() {
                    return Err(ModelError::DuplicateProperty {
                        node: node.to_string(),
                        kind: kind.name(),
                    });
                }
                ctx.check_property(property)
            }

            Command::RemoveProperty { node, kind } => match ctx.tree.property(*node, *kind)? {
                Some(_) => Ok(()),
                None => Err(ModelError::PropertyNotFound {
                    node: node.to_string(),
                    kind: kind.name(),
                }),
            },

            Command::SetChannelMedia {
                node,
                channel,
                media,
            } => {
                if ctx.tree.channels_property(*node)?.is_none() {
                    return Err(ModelError::NoChannelsProperty(node.to_string()));
                }
                ctx.channels.channel(*channel)?;
                match media {
                    Some(media) => ctx.check_media(*channel, media),
                    None => Ok(()),
                }
            }

            Command::AddMetadata { index, .. } => {
                let count = ctx.metadata.len();
                if *index > count {
                    return Err(ModelError::index_out_of_bounds(*index, count));
                }
                Ok(())
            }

            Command::RemoveMetadata { index } | Command::SetMetadataContent { index, .. } => {
                let count = ctx.metadata.len();
                if *index >= count {
                    return Err(ModelError::index_out_of_bounds(*index, count));
                }
                Ok(())
            }

            Command::SetLanguage { .. } => Ok(()),

            Command::Composite(composite) => composite.validate(ctx),
        }
    }

    /// Command that reverts this one, computed from the current state.
    ///
    /// Composites build their inverse while applying; see [`Command::execute`].
    pub fn to_inverse(&self, ctx: &EditContext<'_>) -> ModelResult<Command> {
        let inverse = match self {
            Command::InsertNode { parent, index, .. } => Command::RemoveNode {
                parent: *parent,
                index: *index,
            },

            Command::RemoveNode { parent, index } => Command::InsertNode {
                parent: *parent,
                index: *index,
                node: ctx.tree.child(*parent, *index)?,
            },

            Command::AddProperty { node, property } => Command::RemoveProperty {
                node: *node,
                kind: property.kind(),
            },

            Command::RemoveProperty { node, kind } => {
                let property = ctx
                    .tree
                    .property(*node, *kind)?
                    .cloned()
                    .ok_or_else(|| ModelError::PropertyNotFound {
                        node: node.to_string(),
                        kind: kind.name(),
                    })?;
                Command::AddProperty {
                    node: *node,
                    property,
                }
            }

            Command::SetChannelMedia { node, channel, .. } => {
                let property = ctx
                    .tree
                    .channels_property(*node)?
                    .ok_or_else(|| ModelError::NoChannelsProperty(node.to_string()))?;
                Command::SetChannelMedia {
                    node: *node,
                    channel: *channel,
                    media: property.media(*channel).ok().cloned(),
                }
            }

            Command::AddMetadata { index, .. } => Command::RemoveMetadata { index: *index },

            Command::RemoveMetadata { index } => Command::AddMetadata {
                index: *index,
                metadata: ctx
                    .metadata
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| ModelError::index_out_of_bounds(*index, ctx.metadata.len()))?,
            },

            Command::SetMetadataContent { index, .. } => Command::SetMetadataContent {
                index: *index,
                content: ctx
                    .metadata
                    .get(*index)
                    .map(|m| m.content().to_string())
                    .ok_or_else(|| ModelError::index_out_of_bounds(*index, ctx.metadata.len()))?,
            },

            Command::SetLanguage { .. } => Command::SetLanguage {
                language: ctx.language.clone(),
            },

            Command::Composite(_) => {
                return Err(ModelError::NotInitialized("composite inverse before execution"))
            }
        };
        Ok(inverse)
    }

    /// Apply a single (non-composite) command. Callers validate first.
    fn apply(&self, ctx: &mut EditContext<'_>) -> ModelResult<()> {
        match self {
            Command::InsertNode {
                parent,
                index,
                node,
            } => ctx.tree.insert_child(*parent, *index, *node),

            Command::RemoveNode { parent, index } => ctx.tree.remove_child(*parent, *index).map(|_| ()),

            Command::AddProperty { node, property } => ctx.tree.add_property(*node, property.clone()),

            Command::RemoveProperty { node, kind } => ctx.tree.remove_property(*node, *kind).map(|_| ()),

            Command::SetChannelMedia {
                node,
                channel,
                media,
            } => ctx
                .tree
                .set_channel_media(*node, *channel, media.clone())
                .map(|_| ()),

            Command::AddMetadata { index, metadata } => ctx.insert_metadata(*index, metadata.clone()),

            Command::RemoveMetadata { index } => ctx.remove_metadata(*index).map(|_| ()),

            Command::SetMetadataContent { index, content } => {
                ctx.set_metadata_content(*index, content.clone()).map(|_| ())
            }

            Command::SetLanguage { language } => ctx.set_language(language.clone()).map(|_| ()),

            Command::Composite(composite) => composite.execute(ctx).map(|_| ()),
        }
    }

    /// Validate, apply, and return the inverse.
    pub(crate) fn execute(&self, ctx: &mut EditContext<'_>) -> ModelResult<Command> {
        if let Command::Composite(composite) = self {
            return composite.execute(ctx);
        }
        self.validate(ctx)?;
        let inverse = self.to_inverse(ctx)?;
        self.apply(ctx)?;
        Ok(inverse)
    }

    pub fn description(&self) -> String {
        match self {
            Command::InsertNode { .. } => "Insert node".to_string(),
            Command::RemoveNode { .. } => "Remove node".to_string(),
            Command::AddProperty { property, .. } => format!("Add {} property", property.kind().name()),
            Command::RemoveProperty { kind, .. } => format!("Remove {} property", kind.name()),
            Command::SetChannelMedia { media: Some(_), .. } => "Set media".to_string(),
            Command::SetChannelMedia { media: None, .. } => "Clear media".to_string(),
            Command::AddMetadata { metadata, .. } => format!("Add metadata {}", metadata.name()),
            Command::RemoveMetadata { .. } => "Remove metadata".to_string(),
            Command::SetMetadataContent { .. } => "Set metadata content".to_string(),
            Command::SetLanguage { .. } => "Set language".to_string(),
            Command::Composite(composite) => composite.description(),
        }
    }

    /// Media data referenced by media this command carries.
    pub fn collect_media_data(&self, out: &mut Vec<MediaDataId>) {
        match self {
            Command::AddProperty {
                property: Property::Channels(channels),
                ..
            } => {
                for (_, media) in channels.mappings() {
                    media.collect_media_data(out);
                }
            }
            Command::SetChannelMedia { media: Some(media), .. } => media.collect_media_data(out),
            Command::Composite(composite) => {
                for command in &composite.commands {
                    command.collect_media_data(out);
                }
            }
            _ => {}
        }
    }

    /// Detached nodes this command would attach.
    pub fn collect_nodes(&self, out: &mut Vec<NodeId>) {
        match self {
            Command::InsertNode { node, .. } => out.push(*node),
            Command::Composite(composite) => {
                for command in &composite.commands {
                    command.collect_nodes(out);
                }
            }
            _ => {}
        }
    }

    /// Channels this command maps media through.
    pub fn collect_channels(&self, out: &mut Vec<ChannelId>) {
        match self {
            Command::AddProperty {
                property: Property::Channels(channels),
                ..
            } => out.extend(channels.used_channels()),
            Command::SetChannelMedia { channel, .. } => out.push(*channel),
            Command::Composite(composite) => {
                for command in &composite.commands {
                    command.collect_channels(out);
                }
            }
            _ => {}
        }
    }
}

impl From<CompositeCommand> for Command {
    fn from(composite: CompositeCommand) -> Self {
        Command::Composite(composite)
    }
}

/// Ordered group of commands undone and redone as one step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositeCommand {
    description: Option<String>,
    commands: Vec<Command>,
}

impl CompositeCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            commands: Vec::new(),
        }
    }

    pub fn append(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn description(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("{} commands", self.commands.len()),
        }
    }

    /// Checks the sub-commands in order on a scratch copy of the edited
    /// state, so a later step sees what the earlier ones would have done.
    pub fn validate(&self, ctx: &EditContext<'_>) -> ModelResult<()> {
        let mut tree = ctx.tree.scratch_copy();
        let mut metadata = ctx.metadata.clone();
        let mut language = ctx.language.clone();
        let events = EventBus::new();
        let mut scratch = EditContext {
            tree: &mut tree,
            channels: ctx.channels,
            media_data: ctx.media_data,
            metadata: &mut metadata,
            language: &mut language,
            events: &events,
        };
        self.execute(&mut scratch).map(|_| ())
    }

    fn execute(&self, ctx: &mut EditContext<'_>) -> ModelResult<Command> {
        let mut inverses: Vec<Command> = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            match command.execute(ctx) {
                Ok(inverse) => inverses.push(inverse),
                Err(err) => {
                    for inverse in inverses.iter().rev() {
                        if let Err(rollback) = inverse.execute(ctx) {
                            warn!(error = %rollback, "composite rollback step failed");
                        }
                    }
                    return Err(err);
                }
            }
        }

        inverses.reverse();
        Ok(Command::Composite(CompositeCommand {
            description: self.description.clone(),
            commands: inverses,
        }))
    }

    pub(crate) fn from_parts(description: Option<String>, commands: Vec<Command>) -> Self {
        Self {
            description,
            commands,
        }
    }
}
