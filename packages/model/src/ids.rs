//! Handle types for entities owned by a presentation.
//!
//! Every node, channel, media data and data provider lives in an arena owned
//! by exactly one [`Presentation`](crate::Presentation). Handles carry the
//! owning presentation's id so that cross-presentation use is detected
//! instead of silently indexing the wrong arena.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PRESENTATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PresentationId(u64);

impl PresentationId {
    /// Owner of handles not yet bound to a presentation. Never issued, so
    /// such a handle is rejected by every arena.
    pub(crate) const UNBOUND: PresentationId = PresentationId(0);

    pub(crate) fn next() -> Self {
        Self(NEXT_PRESENTATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name {
            presentation: PresentationId,
            index: u32,
        }

        impl $name {
            pub(crate) fn new(presentation: PresentationId, index: usize) -> Self {
                Self {
                    presentation,
                    index: index as u32,
                }
            }

            /// Presentation that owns the referenced entity.
            pub fn presentation(&self) -> PresentationId {
                self.presentation
            }

            pub(crate) fn index(&self) -> usize {
                self.index as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}:{}", $prefix, self.presentation, self.index)
            }
        }
    };
}

arena_handle!(
    /// Handle to a tree node.
    NodeId,
    "node@"
);
arena_handle!(
    /// Handle to a channel registered in a channels manager.
    ChannelId,
    "channel@"
);
arena_handle!(
    /// Handle to a media data object in a media data manager.
    MediaDataId,
    "mediadata@"
);
arena_handle!(
    /// Handle to a data provider in a data provider manager.
    DataProviderId,
    "dataprovider@"
);
