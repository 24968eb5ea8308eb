//! # Media Data
//!
//! Descriptions of managed media payloads. A media data object records the
//! audio format and the ordered clips of data-provider files that make up
//! its content; decoding the bytes is left to callers.

use crate::error::{ModelError, ModelResult};
use crate::ids::{DataProviderId, MediaDataId, PresentationId};
use crate::media::{Clip, Time};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// PCM stream format. Metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcmFormat {
    pub number_of_channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            number_of_channels: 1,
            sample_rate: 44_100,
            bit_depth: 16,
        }
    }
}

/// A range of one data provider's audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavClip {
    pub data_provider: DataProviderId,
    pub clip: Clip,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WavAudioMediaData {
    pub pcm: PcmFormat,
    clips: Vec<WavClip>,
}

impl WavAudioMediaData {
    pub fn new(pcm: PcmFormat) -> Self {
        Self {
            pcm,
            clips: Vec::new(),
        }
    }

    pub fn clips(&self) -> &[WavClip] {
        &self.clips
    }

    pub fn append_clip(&mut self, data_provider: DataProviderId, clip: Clip) {
        self.clips.push(WavClip { data_provider, clip });
    }

    pub fn remove_clip(&mut self, index: usize) -> ModelResult<WavClip> {
        if index >= self.clips.len() {
            return Err(ModelError::index_out_of_bounds(index, self.clips.len()));
        }
        Ok(self.clips.remove(index))
    }

    /// Sum of clip durations.
    pub fn duration(&self) -> Time {
        Time::from_micros(self.clips.iter().map(|c| c.clip.duration().as_micros()).sum())
    }

    pub(crate) fn clips_mut(&mut self) -> &mut [WavClip] {
        &mut self.clips
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaData {
    WavAudio(WavAudioMediaData),
}

impl MediaData {
    pub fn xuk_local_name(&self) -> &'static str {
        match self {
            MediaData::WavAudio(_) => "WavAudioMediaData",
        }
    }

    pub fn as_wav_audio(&self) -> Option<&WavAudioMediaData> {
        match self {
            MediaData::WavAudio(data) => Some(data),
        }
    }

    pub fn as_wav_audio_mut(&mut self) -> Option<&mut WavAudioMediaData> {
        match self {
            MediaData::WavAudio(data) => Some(data),
        }
    }

    pub fn data_providers(&self) -> Vec<DataProviderId> {
        match self {
            MediaData::WavAudio(data) => data.clips.iter().map(|c| c.data_provider).collect(),
        }
    }

    pub fn duration(&self) -> Time {
        match self {
            MediaData::WavAudio(data) => data.duration(),
        }
    }

    pub(crate) fn remap_data_providers(&mut self, map: &mut dyn FnMut(DataProviderId) -> DataProviderId) {
        match self {
            MediaData::WavAudio(data) => {
                for clip in data.clips_mut() {
                    clip.data_provider = map(clip.data_provider);
                }
            }
        }
    }
}

impl From<WavAudioMediaData> for MediaData {
    fn from(data: WavAudioMediaData) -> Self {
        MediaData::WavAudio(data)
    }
}

#[derive(Debug)]
pub struct MediaDataManager {
    presentation: PresentationId,
    items: IndexMap<MediaDataId, MediaData>,
    next_index: usize,
}

impl MediaDataManager {
    pub(crate) fn new(presentation: PresentationId) -> Self {
        Self {
            presentation,
            items: IndexMap::new(),
            next_index: 0,
        }
    }

    pub fn add(&mut self, data: impl Into<MediaData>) -> MediaDataId {
        let id = self.reserve();
        self.items.insert(id, data.into());
        id
    }

    pub(crate) fn reserve(&mut self) -> MediaDataId {
        let id = MediaDataId::new(self.presentation, self.next_index);
        self.next_index += 1;
        id
    }

    pub(crate) fn insert_reserved(&mut self, id: MediaDataId, data: MediaData) {
        self.items.insert(id, data);
    }

    pub fn get(&self, id: MediaDataId) -> ModelResult<&MediaData> {
        self.items
            .get(&id)
            .ok_or_else(|| ModelError::MediaDataNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: MediaDataId) -> ModelResult<&mut MediaData> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| ModelError::MediaDataNotFound(id.to_string()))
    }

    pub fn contains(&self, id: MediaDataId) -> bool {
        self.items.contains_key(&id)
    }

    /// Unregister a media data object. Its data providers are left alone.
    pub fn remove(&mut self, id: MediaDataId) -> ModelResult<MediaData> {
        self.items
            .shift_remove(&id)
            .ok_or_else(|| ModelError::MediaDataNotFound(id.to_string()))
    }

    pub fn ids(&self) -> Vec<MediaDataId> {
        self.items.keys().copied().collect()
    }

    pub fn media_data(&self) -> impl Iterator<Item = (MediaDataId, &MediaData)> {
        self.items.iter().map(|(id, data)| (*id, data))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, id: MediaDataId) -> Option<usize> {
        self.items.get_index_of(&id)
    }

    /// Every data provider referenced by a registered media data object.
    pub fn used_data_providers(&self) -> Vec<DataProviderId> {
        let mut used: Vec<DataProviderId> = Vec::new();
        for data in self.items.values() {
            for provider in data.data_providers() {
                if !used.contains(&provider) {
                    used.push(provider);
                }
            }
        }
        used
    }
}
