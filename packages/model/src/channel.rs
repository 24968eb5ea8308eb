//! # Channels
//!
//! Named, typed conduits through which media is attached to tree nodes.
//! Channel names are unique within a presentation.

use crate::error::{ModelError, ModelResult};
use crate::events::{DataModelEvent, EventBus};
use crate::ids::{ChannelId, PresentationId};
use crate::media::{Media, MediaType};
use crate::ValueEquals;
use indexmap::IndexMap;
use serde::Serialize;

/// What a channel carries. Typed channels reject media of other types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Generic,
    Text,
    Audio,
    Video,
    Image,
}

impl ChannelKind {
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            ChannelKind::Generic => None,
            ChannelKind::Text => Some(MediaType::Text),
            ChannelKind::Audio => Some(MediaType::Audio),
            ChannelKind::Video => Some(MediaType::Video),
            ChannelKind::Image => Some(MediaType::Image),
        }
    }

    /// Sequences are judged by their items; an empty sequence fits anywhere.
    pub fn accepts(&self, media: &Media) -> bool {
        match self.media_type() {
            None => true,
            Some(expected) => media.content_types().into_iter().all(|t| t == expected),
        }
    }

    /// Like [`accepts`](Self::accepts), reporting the rejection against the
    /// channel named `channel`.
    pub(crate) fn check_accepts(&self, channel: &str, media: &Media) -> ModelResult<()> {
        if self.accepts(media) {
            return Ok(());
        }
        let rejected = media
            .content_types()
            .into_iter()
            .find(|t| Some(*t) != self.media_type());
        match rejected {
            Some(media_type) => Err(ModelError::MediaRejected {
                channel: channel.to_string(),
                kind: *self,
                media: media_type,
            }),
            None => Ok(()),
        }
    }

    pub fn xuk_local_name(&self) -> &'static str {
        match self {
            ChannelKind::Generic => "Channel",
            ChannelKind::Text => "TextChannel",
            ChannelKind::Audio => "AudioChannel",
            ChannelKind::Video => "VideoChannel",
            ChannelKind::Image => "ImageChannel",
        }
    }

    pub fn from_xuk_local_name(name: &str) -> Option<Self> {
        match name {
            "Channel" => Some(ChannelKind::Generic),
            "TextChannel" => Some(ChannelKind::Text),
            "AudioChannel" => Some(ChannelKind::Audio),
            "VideoChannel" => Some(ChannelKind::Video),
            "ImageChannel" => Some(ChannelKind::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    id: ChannelId,
    name: String,
    kind: ChannelKind,
    language: Option<String>,
}

impl Channel {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// Per-presentation registry of channels.
#[derive(Debug)]
pub struct ChannelsManager {
    presentation: PresentationId,
    channels: IndexMap<ChannelId, Channel>,
    next_index: usize,
    events: EventBus,
}

impl ChannelsManager {
    pub(crate) fn new(presentation: PresentationId, events: EventBus) -> Self {
        Self {
            presentation,
            channels: IndexMap::new(),
            next_index: 0,
            events,
        }
    }

    /// Register a new channel. Names must be non-empty and unique.
    pub fn add_channel(&mut self, name: impl Into<String>, kind: ChannelKind) -> ModelResult<ChannelId> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::MissingArgument("channel name"));
        }
        if self.find_by_name(&name).is_some() {
            return Err(ModelError::DuplicateChannel(name));
        }
        let id = self.reserve();
        self.insert_reserved(id, name, kind, None)?;
        Ok(id)
    }

    /// Allocate a handle whose channel is registered later.
    pub(crate) fn reserve(&mut self) -> ChannelId {
        let id = ChannelId::new(self.presentation, self.next_index);
        self.next_index += 1;
        id
    }

    pub(crate) fn insert_reserved(
        &mut self,
        id: ChannelId,
        name: String,
        kind: ChannelKind,
        language: Option<String>,
    ) -> ModelResult<()> {
        if name.is_empty() {
            return Err(ModelError::MissingArgument("channel name"));
        }
        if self.find_by_name(&name).is_some() {
            return Err(ModelError::DuplicateChannel(name));
        }
        self.channels.insert(
            id,
            Channel {
                id,
                name: name.clone(),
                kind,
                language: language.filter(|l| !l.is_empty()),
            },
        );
        self.events
            .notify(&DataModelEvent::ChannelAdded { channel: id, name })
    }

    pub fn channel(&self, id: ChannelId) -> ModelResult<&Channel> {
        self.channels
            .get(&id)
            .ok_or_else(|| ModelError::ChannelNotFound(id.to_string()))
    }

    pub fn channel_by_name(&self, name: &str) -> ModelResult<&Channel> {
        self.find_by_name(name)
            .ok_or_else(|| ModelError::ChannelNotFound(name.to_string()))
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn rename_channel(&mut self, id: ChannelId, name: impl Into<String>) -> ModelResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::MissingArgument("channel name"));
        }
        if let Some(existing) = self.find_by_name(&name) {
            if existing.id != id {
                return Err(ModelError::DuplicateChannel(name));
            }
        }
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or_else(|| ModelError::ChannelNotFound(id.to_string()))?;
        channel.name = name;
        Ok(())
    }

    pub fn set_channel_language(&mut self, id: ChannelId, language: Option<String>) -> ModelResult<()> {
        let channel = self
            .channels
            .get_mut(&id)
            .ok_or_else(|| ModelError::ChannelNotFound(id.to_string()))?;
        channel.language = language.filter(|l| !l.is_empty());
        Ok(())
    }

    /// Fails with a domain error if the channel's kind rejects `media`.
    pub fn check_accepts(&self, id: ChannelId, media: &Media) -> ModelResult<()> {
        let channel = self.channel(id)?;
        channel.kind.check_accepts(&channel.name, media)
    }

    /// Position of the channel in registration order.
    pub fn position(&self, id: ChannelId) -> Option<usize> {
        self.channels.get_index_of(&id)
    }

    /// Callers must make sure no property still maps media through `id`.
    pub(crate) fn remove_channel(&mut self, id: ChannelId) -> ModelResult<Channel> {
        let channel = self
            .channels
            .shift_remove(&id)
            .ok_or_else(|| ModelError::ChannelNotFound(id.to_string()))?;
        self.events.notify(&DataModelEvent::ChannelRemoved {
            channel: id,
            name: channel.name.clone(),
        })?;
        Ok(channel)
    }

    fn find_by_name(&self, name: &str) -> Option<&Channel> {
        self.channels.values().find(|c| c.name == name)
    }
}

impl ValueEquals for ChannelsManager {
    fn value_equals(&self, other: &Self) -> bool {
        self.channels.len() == other.channels.len()
            && self
                .channels
                .values()
                .zip(other.channels.values())
                .all(|(a, b)| a.name == b.name && a.kind == b.kind && a.language == b.language)
    }
}
