//! Factories resolve a qualified XML name to a fresh instance of a concrete
//! variant. The XUK reader asks the owning presentation's factories for every
//! element it meets; `None` means "not mine" and the element is skipped.

use crate::channel::ChannelKind;
use crate::data_provider::DataProviderKind;
use crate::media::{
    ExternalAudioMedia, ExternalImageMedia, ExternalTextMedia, ExternalVideoMedia,
    ManagedAudioMedia, Media, SequenceMedia, TextMedia,
};
use crate::media_data::{MediaData, WavAudioMediaData};
use crate::property::{ChannelsProperty, Property};
use crate::xuk::XUK_NAMESPACE;

pub trait Factory<T> {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<T>;
}

impl<T, F> Factory<T> for F
where
    F: Fn(&str, &str) -> Option<T>,
{
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<T> {
        self(local_name, namespace_uri)
    }
}

/// Tree nodes have a single concrete kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    TreeNode,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNodeFactory;

impl Factory<NodeKind> for DefaultNodeFactory {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<NodeKind> {
        match (namespace_uri, local_name) {
            (XUK_NAMESPACE, "TreeNode") => Some(NodeKind::TreeNode),
            _ => None,
        }
    }
}

/// Creates properties. `XmlProperty` needs its element name, so the reader
/// builds it directly and this factory only covers `ChannelsProperty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPropertyFactory;

impl Factory<Property> for DefaultPropertyFactory {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<Property> {
        match (namespace_uri, local_name) {
            (XUK_NAMESPACE, "ChannelsProperty") => Some(ChannelsProperty::new().into()),
            _ => None,
        }
    }
}

/// Creates media with neutral attribute values; the reader fills them in,
/// including the media data reference of `ManagedAudioMedia`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMediaFactory;

impl Factory<Media> for DefaultMediaFactory {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<Media> {
        if namespace_uri != XUK_NAMESPACE {
            return None;
        }
        let media = match local_name {
            "TextMedia" => TextMedia::default().into(),
            "ExternalTextMedia" => ExternalTextMedia::default().into(),
            "ExternalAudioMedia" => ExternalAudioMedia::default().into(),
            "ExternalVideoMedia" => ExternalVideoMedia::default().into(),
            "ExternalImageMedia" => ExternalImageMedia::default().into(),
            "SequenceMedia" => SequenceMedia::default().into(),
            "ManagedAudioMedia" => ManagedAudioMedia::default().into(),
            _ => return None,
        };
        Some(media)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChannelFactory;

impl Factory<ChannelKind> for DefaultChannelFactory {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<ChannelKind> {
        if namespace_uri != XUK_NAMESPACE {
            return None;
        }
        ChannelKind::from_xuk_local_name(local_name)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMediaDataFactory;

impl Factory<MediaData> for DefaultMediaDataFactory {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<MediaData> {
        match (namespace_uri, local_name) {
            (XUK_NAMESPACE, "WavAudioMediaData") => Some(WavAudioMediaData::default().into()),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDataProviderFactory;

impl Factory<DataProviderKind> for DefaultDataProviderFactory {
    fn create(&self, local_name: &str, namespace_uri: &str) -> Option<DataProviderKind> {
        match (namespace_uri, local_name) {
            (XUK_NAMESPACE, "FileDataProvider") => Some(DataProviderKind::File),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_factory_resolves_qualified_names() {
        let factory = DefaultMediaFactory;
        assert!(matches!(
            factory.create("ExternalAudioMedia", XUK_NAMESPACE),
            Some(Media::ExternalAudio(_))
        ));
        assert!(factory.create("ExternalAudioMedia", "urn:other").is_none());
        assert!(factory.create("HologramMedia", XUK_NAMESPACE).is_none());
    }

    #[test]
    fn test_managed_audio_starts_unbound() {
        let Some(Media::ManagedAudio(media)) = DefaultMediaFactory.create("ManagedAudioMedia", XUK_NAMESPACE) else {
            panic!("managed audio not created");
        };
        assert_eq!(media.media_data.presentation(), crate::ids::PresentationId::UNBOUND);
        assert_eq!(media.language, None);
    }

    #[test]
    fn test_closures_are_factories() {
        let factory = |name: &str, _ns: &str| (name == "TextChannel").then_some(ChannelKind::Text);
        assert_eq!(factory.create("TextChannel", ""), Some(ChannelKind::Text));
        assert_eq!(factory.create("Channel", ""), None);
    }
}
