//! # Properties
//!
//! Traits attached to tree nodes. A node owns its properties, so a property
//! is attached to at most one node at a time by construction: adding moves it
//! into the node and removing hands it back to the caller.

use crate::error::{ModelError, ModelResult};
use crate::ids::ChannelId;
use crate::media::Media;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Channels,
    Xml,
}

impl PropertyKind {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyKind::Channels => "channels",
            PropertyKind::Xml => "xml",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Channels(ChannelsProperty),
    Xml(XmlProperty),
}

impl Property {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Channels(_) => PropertyKind::Channels,
            Property::Xml(_) => PropertyKind::Xml,
        }
    }

    pub fn as_channels(&self) -> Option<&ChannelsProperty> {
        match self {
            Property::Channels(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn as_channels_mut(&mut self) -> Option<&mut ChannelsProperty> {
        match self {
            Property::Channels(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&XmlProperty> {
        match self {
            Property::Xml(p) => Some(p),
            _ => None,
        }
    }

    pub fn xuk_local_name(&self) -> &'static str {
        match self {
            Property::Channels(_) => "ChannelsProperty",
            Property::Xml(_) => "XmlProperty",
        }
    }
}

impl From<ChannelsProperty> for Property {
    fn from(property: ChannelsProperty) -> Self {
        Property::Channels(property)
    }
}

impl From<XmlProperty> for Property {
    fn from(property: XmlProperty) -> Self {
        Property::Xml(property)
    }
}

/// Channel → media association. At most one media per channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelsProperty {
    mappings: IndexMap<ChannelId, Media>,
}

impl ChannelsProperty {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `media` on `channel`, returning the media it replaced.
    pub fn set_media(&mut self, channel: ChannelId, media: Media) -> Option<Media> {
        self.mappings.insert(channel, media)
    }

    pub fn media(&self, channel: ChannelId) -> ModelResult<&Media> {
        self.mappings
            .get(&channel)
            .ok_or_else(|| ModelError::ChannelNotOnProperty(channel.to_string()))
    }

    pub fn has_channel(&self, channel: ChannelId) -> bool {
        self.mappings.contains_key(&channel)
    }

    pub fn clear_channel(&mut self, channel: ChannelId) -> Option<Media> {
        self.mappings.shift_remove(&channel)
    }

    pub fn used_channels(&self) -> Vec<ChannelId> {
        self.mappings.keys().copied().collect()
    }

    pub fn mappings(&self) -> impl Iterator<Item = (ChannelId, &Media)> {
        self.mappings.iter().map(|(c, m)| (*c, m))
    }

    pub(crate) fn mappings_mut(&mut self) -> impl Iterator<Item = (&ChannelId, &mut Media)> {
        self.mappings.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub local_name: String,
    pub namespace_uri: String,
    pub value: String,
}

/// The XML element a tree node stands for in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlProperty {
    local_name: String,
    namespace_uri: String,
    attributes: Vec<XmlAttribute>,
}

impl XmlProperty {
    pub fn new(local_name: impl Into<String>, namespace_uri: impl Into<String>) -> ModelResult<Self> {
        let local_name = local_name.into();
        if local_name.is_empty() {
            return Err(ModelError::MissingArgument("xml local name"));
        }
        Ok(Self {
            local_name,
            namespace_uri: namespace_uri.into(),
            attributes: Vec::new(),
        })
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, local_name: &str, namespace_uri: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.local_name == local_name && a.namespace_uri == namespace_uri)
            .map(|a| a.value.as_str())
    }

    /// Set or replace an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        local_name: impl Into<String>,
        namespace_uri: impl Into<String>,
        value: impl Into<String>,
    ) -> ModelResult<Option<String>> {
        let local_name = local_name.into();
        if local_name.is_empty() {
            return Err(ModelError::MissingArgument("xml attribute name"));
        }
        let namespace_uri = namespace_uri.into();
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.local_name == local_name && a.namespace_uri == namespace_uri)
        {
            return Ok(Some(std::mem::replace(&mut existing.value, value)));
        }
        self.attributes.push(XmlAttribute {
            local_name,
            namespace_uri,
            value,
        });
        Ok(None)
    }

    pub fn remove_attribute(&mut self, local_name: &str, namespace_uri: &str) -> Option<String> {
        let pos = self
            .attributes
            .iter()
            .position(|a| a.local_name == local_name && a.namespace_uri == namespace_uri)?;
        Some(self.attributes.remove(pos).value)
    }
}
