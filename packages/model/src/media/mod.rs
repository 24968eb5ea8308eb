//! # Media
//!
//! Content payloads attached to tree nodes through channels.
//!
//! Media are plain values: copying a media clones every kind-specific
//! attribute, and equality is structural. The only reference a media holds
//! into its presentation is the [`MediaDataId`] of managed audio, which
//! [`Presentation::export_subtree`](crate::Presentation::export_subtree)
//! remaps when moving content across presentations.

mod sequence;
mod time;

pub use sequence::SequenceMedia;
pub use time::Time;

use crate::error::{ModelError, ModelResult};
use crate::ids::{MediaDataId, PresentationId};
use serde::Serialize;
use std::collections::BTreeSet;

/// Coarse content type of a media, used for channel and sequence checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Text,
    Audio,
    Video,
    Image,
}

/// A `[begin, end]` range in media time. `begin <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clip {
    begin: Time,
    end: Time,
}

impl Clip {
    pub fn new(begin: Time, end: Time) -> ModelResult<Self> {
        if begin > end {
            return Err(ModelError::ClipOrder { begin, end });
        }
        Ok(Self { begin, end })
    }

    pub fn begin(&self) -> Time {
        self.begin
    }

    pub fn end(&self) -> Time {
        self.end
    }

    pub fn duration(&self) -> Time {
        Time::from_micros(self.end.as_micros() - self.begin.as_micros())
    }
}

/// Pixel dimensions of visual media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextMedia {
    pub text: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalTextMedia {
    pub src: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalAudioMedia {
    pub src: String,
    pub clip: Clip,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalVideoMedia {
    pub src: String,
    pub clip: Clip,
    pub size: Size,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalImageMedia {
    pub src: String,
    pub size: Size,
    pub language: Option<String>,
}

/// Audio whose payload is stored in the presentation's media data manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedAudioMedia {
    pub media_data: MediaDataId,
    pub language: Option<String>,
}

/// The default refers to no media data until `media_data` is set.
impl Default for ManagedAudioMedia {
    fn default() -> Self {
        Self {
            media_data: MediaDataId::new(PresentationId::UNBOUND, 0),
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Text(TextMedia),
    ExternalText(ExternalTextMedia),
    ExternalAudio(ExternalAudioMedia),
    ExternalVideo(ExternalVideoMedia),
    ExternalImage(ExternalImageMedia),
    ManagedAudio(ManagedAudioMedia),
    Sequence(SequenceMedia),
}

impl Media {
    /// Inline text media without a language.
    pub fn text(text: impl Into<String>) -> Self {
        Media::Text(TextMedia {
            text: text.into(),
            language: None,
        })
    }

    /// External audio clip referenced by `src`.
    pub fn external_audio(src: impl Into<String>, clip: Clip) -> Self {
        Media::ExternalAudio(ExternalAudioMedia {
            src: src.into(),
            clip,
            language: None,
        })
    }

    pub fn external_image(src: impl Into<String>, size: Size) -> Self {
        Media::ExternalImage(ExternalImageMedia {
            src: src.into(),
            size,
            language: None,
        })
    }

    pub fn managed_audio(media_data: MediaDataId) -> Self {
        Media::ManagedAudio(ManagedAudioMedia {
            media_data,
            language: None,
        })
    }

    /// Content type of this media; `None` for sequences.
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            Media::Text(_) | Media::ExternalText(_) => Some(MediaType::Text),
            Media::ExternalAudio(_) | Media::ManagedAudio(_) => Some(MediaType::Audio),
            Media::ExternalVideo(_) => Some(MediaType::Video),
            Media::ExternalImage(_) => Some(MediaType::Image),
            Media::Sequence(_) => None,
        }
    }

    /// Every leaf content type reachable from this media.
    pub fn content_types(&self) -> BTreeSet<MediaType> {
        let mut types = BTreeSet::new();
        self.collect_content_types(&mut types);
        types
    }

    fn collect_content_types(&self, types: &mut BTreeSet<MediaType>) {
        match self {
            Media::Sequence(seq) => {
                for item in seq.items() {
                    item.collect_content_types(types);
                }
            }
            other => {
                if let Some(media_type) = other.media_type() {
                    types.insert(media_type);
                }
            }
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Media::Text(m) => m.language.as_deref(),
            Media::ExternalText(m) => m.language.as_deref(),
            Media::ExternalAudio(m) => m.language.as_deref(),
            Media::ExternalVideo(m) => m.language.as_deref(),
            Media::ExternalImage(m) => m.language.as_deref(),
            Media::ManagedAudio(m) => m.language.as_deref(),
            Media::Sequence(m) => m.language.as_deref(),
        }
    }

    pub fn set_language(&mut self, language: Option<String>) {
        let slot = match self {
            Media::Text(m) => &mut m.language,
            Media::ExternalText(m) => &mut m.language,
            Media::ExternalAudio(m) => &mut m.language,
            Media::ExternalVideo(m) => &mut m.language,
            Media::ExternalImage(m) => &mut m.language,
            Media::ManagedAudio(m) => &mut m.language,
            Media::Sequence(m) => &mut m.language,
        };
        *slot = language.filter(|l| !l.is_empty());
    }

    /// Location of externally stored content, relative to the root URI.
    pub fn src(&self) -> Option<&str> {
        match self {
            Media::ExternalText(m) => Some(&m.src),
            Media::ExternalAudio(m) => Some(&m.src),
            Media::ExternalVideo(m) => Some(&m.src),
            Media::ExternalImage(m) => Some(&m.src),
            _ => None,
        }
    }

    /// Audio and video play over time; everything else is static.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            Media::ExternalAudio(_) | Media::ExternalVideo(_) | Media::ManagedAudio(_)
        )
    }

    /// XUK element name for this media kind.
    pub fn xuk_local_name(&self) -> &'static str {
        match self {
            Media::Text(_) => "TextMedia",
            Media::ExternalText(_) => "ExternalTextMedia",
            Media::ExternalAudio(_) => "ExternalAudioMedia",
            Media::ExternalVideo(_) => "ExternalVideoMedia",
            Media::ExternalImage(_) => "ExternalImageMedia",
            Media::ManagedAudio(_) => "ManagedAudioMedia",
            Media::Sequence(_) => "SequenceMedia",
        }
    }

    /// Re-check every invariant, descending into sequences.
    pub fn validate(&self) -> ModelResult<()> {
        match self {
            Media::ExternalAudio(m) => Clip::new(m.clip.begin, m.clip.end).map(|_| ()),
            Media::ExternalVideo(m) => Clip::new(m.clip.begin, m.clip.end).map(|_| ()),
            Media::Sequence(seq) => {
                for item in seq.items() {
                    item.validate()?;
                }
                seq.check_homogeneous()
            }
            _ => Ok(()),
        }
    }

    /// Push every media data handle referenced by this media.
    pub fn collect_media_data(&self, out: &mut Vec<MediaDataId>) {
        match self {
            Media::ManagedAudio(m) => out.push(m.media_data),
            Media::Sequence(seq) => {
                for item in seq.items() {
                    item.collect_media_data(out);
                }
            }
            _ => {}
        }
    }

    /// Rewrite every media data handle through `map`.
    pub(crate) fn remap_media_data(&mut self, map: &mut dyn FnMut(MediaDataId) -> MediaDataId) {
        match self {
            Media::ManagedAudio(m) => m.media_data = map(m.media_data),
            Media::Sequence(seq) => {
                for item in seq.items_mut() {
                    item.remap_media_data(map);
                }
            }
            _ => {}
        }
    }
}

impl From<TextMedia> for Media {
    fn from(media: TextMedia) -> Self {
        Media::Text(media)
    }
}

impl From<ExternalTextMedia> for Media {
    fn from(media: ExternalTextMedia) -> Self {
        Media::ExternalText(media)
    }
}

impl From<ExternalAudioMedia> for Media {
    fn from(media: ExternalAudioMedia) -> Self {
        Media::ExternalAudio(media)
    }
}

impl From<ExternalVideoMedia> for Media {
    fn from(media: ExternalVideoMedia) -> Self {
        Media::ExternalVideo(media)
    }
}

impl From<ExternalImageMedia> for Media {
    fn from(media: ExternalImageMedia) -> Self {
        Media::ExternalImage(media)
    }
}

impl From<ManagedAudioMedia> for Media {
    fn from(media: ManagedAudioMedia) -> Self {
        Media::ManagedAudio(media)
    }
}

impl From<SequenceMedia> for Media {
    fn from(media: SequenceMedia) -> Self {
        Media::Sequence(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_rejects_reversed_range() {
        let err = Clip::new(Time::from_secs(5), Time::from_secs(1)).unwrap_err();
        assert!(matches!(err, ModelError::ClipOrder { .. }));

        let clip = Clip::new(Time::zero(), Time::from_secs(10)).unwrap();
        assert_eq!(clip.duration(), Time::from_secs(10));
    }

    #[test]
    fn test_media_types() {
        assert_eq!(Media::text("hi").media_type(), Some(MediaType::Text));
        let audio = Media::external_audio("a.mp3", Clip::default());
        assert_eq!(audio.media_type(), Some(MediaType::Audio));
        assert!(audio.is_continuous());
        assert_eq!(audio.src(), Some("a.mp3"));

        let mut seq = SequenceMedia::new(true);
        seq.append(Media::text("a")).unwrap();
        seq.append(audio).unwrap();
        let seq = Media::from(seq);
        assert_eq!(seq.media_type(), None);
        assert_eq!(
            seq.content_types().into_iter().collect::<Vec<_>>(),
            vec![MediaType::Text, MediaType::Audio]
        );
    }

    #[test]
    fn test_set_language_drops_empty() {
        let mut media = Media::text("hello");
        media.set_language(Some("en".to_string()));
        assert_eq!(media.language(), Some("en"));
        media.set_language(Some(String::new()));
        assert_eq!(media.language(), None);
    }
}
