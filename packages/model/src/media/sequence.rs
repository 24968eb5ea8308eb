use super::{Media, MediaType};
use crate::error::{ModelError, ModelResult};
use std::collections::BTreeSet;

/// Ordered list of media played one after another.
///
/// Unless `allow_multiple_types` is set, every leaf item must share one
/// [`MediaType`]; a rejected append or insert leaves the sequence unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMedia {
    items: Vec<Media>,
    allow_multiple_types: bool,
    pub language: Option<String>,
}

impl SequenceMedia {
    pub fn new(allow_multiple_types: bool) -> Self {
        Self {
            items: Vec::new(),
            allow_multiple_types,
            language: None,
        }
    }

    pub fn allows_multiple_types(&self) -> bool {
        self.allow_multiple_types
    }

    /// Switching to single-type mode fails if the items already mix types.
    pub fn set_allow_multiple_types(&mut self, allow: bool) -> ModelResult<()> {
        if !allow {
            let types = self.content_types();
            if types.len() > 1 {
                let mut iter = types.into_iter();
                if let (Some(existing), Some(rejected)) = (iter.next(), iter.next()) {
                    return Err(ModelError::SequenceTypeMismatch { existing, rejected });
                }
            }
        }
        self.allow_multiple_types = allow;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Media] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Media] {
        &mut self.items
    }

    pub fn get(&self, index: usize) -> ModelResult<&Media> {
        self.items
            .get(index)
            .ok_or_else(|| ModelError::index_out_of_bounds(index, self.items.len()))
    }

    /// Check whether `media` could be added without breaking homogeneity.
    pub fn can_accept(&self, media: &Media) -> ModelResult<()> {
        if self.allow_multiple_types {
            return Ok(());
        }
        let existing = self.content_types();
        let Some(&first) = existing.iter().next() else {
            // Empty sequence: the candidate only has to be homogeneous itself.
            let incoming = media.content_types();
            let mut iter = incoming.into_iter();
            if let (Some(existing), Some(rejected)) = (iter.next(), iter.next()) {
                return Err(ModelError::SequenceTypeMismatch { existing, rejected });
            }
            return Ok(());
        };
        for rejected in media.content_types() {
            if rejected != first {
                return Err(ModelError::SequenceTypeMismatch {
                    existing: first,
                    rejected,
                });
            }
        }
        Ok(())
    }

    pub fn append(&mut self, media: Media) -> ModelResult<()> {
        self.can_accept(&media)?;
        self.items.push(media);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, media: Media) -> ModelResult<()> {
        if index > self.items.len() {
            return Err(ModelError::index_out_of_bounds(index, self.items.len()));
        }
        self.can_accept(&media)?;
        self.items.insert(index, media);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> ModelResult<Media> {
        if index >= self.items.len() {
            return Err(ModelError::index_out_of_bounds(index, self.items.len()));
        }
        Ok(self.items.remove(index))
    }

    fn content_types(&self) -> BTreeSet<MediaType> {
        self.items
            .iter()
            .flat_map(|item| item.content_types())
            .collect()
    }

    pub(crate) fn check_homogeneous(&self) -> ModelResult<()> {
        if self.allow_multiple_types {
            return Ok(());
        }
        let mut iter = self.content_types().into_iter();
        if let (Some(existing), Some(rejected)) = (iter.next(), iter.next()) {
            return Err(ModelError::SequenceTypeMismatch { existing, rejected });
        }
        Ok(())
    }
}

impl Default for SequenceMedia {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Clip;

    fn audio(src: &str) -> Media {
        Media::external_audio(src, Clip::default())
    }

    #[test]
    fn test_single_type_sequence_rejects_text_after_audio() {
        let mut seq = SequenceMedia::new(false);
        seq.append(audio("a.mp3")).unwrap();
        seq.append(audio("b.mp3")).unwrap();

        let err = seq.append(Media::text("nope")).unwrap_err();
        assert!(matches!(
            err,
            ModelError::SequenceTypeMismatch {
                existing: MediaType::Audio,
                rejected: MediaType::Text
            }
        ));
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_multi_type_sequence_accepts_anything() {
        let mut seq = SequenceMedia::new(true);
        seq.append(audio("a.mp3")).unwrap();
        seq.append(Media::text("ok")).unwrap();
        assert_eq!(seq.len(), 2);

        // Cannot switch back to single-type while mixed
        assert!(seq.set_allow_multiple_types(false).is_err());
        assert!(seq.allows_multiple_types());

        seq.remove(1).unwrap();
        seq.set_allow_multiple_types(false).unwrap();
        assert!(!seq.allows_multiple_types());
    }

    #[test]
    fn test_insert_bounds() {
        let mut seq = SequenceMedia::new(false);
        assert!(seq.insert(1, Media::text("x")).is_err());
        seq.insert(0, Media::text("b")).unwrap();
        seq.insert(0, Media::text("a")).unwrap();
        assert_eq!(seq.get(0).unwrap(), &Media::text("a"));
        assert!(seq.get(2).is_err());
        assert!(seq.remove(5).is_err());
    }

    #[test]
    fn test_nested_sequence_types_are_checked() {
        let mut inner = SequenceMedia::new(true);
        inner.append(audio("a.mp3")).unwrap();
        inner.append(Media::text("t")).unwrap();

        let mut outer = SequenceMedia::new(false);
        assert!(outer.append(Media::Sequence(inner)).is_err());
        assert!(outer.is_empty());
    }
}
