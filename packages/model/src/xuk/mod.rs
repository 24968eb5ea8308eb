//! # XUK
//!
//! Streaming XML persistence of a project.
//!
//! ```text
//! Xuk
//! └── Project
//!     └── mPresentations
//!         └── Presentation [rootUri, language]
//!             ├── mChannelsManager      channels, by uid
//!             ├── mDataProviderManager  payload files, by uid
//!             ├── mMediaDataManager     media data, referencing providers
//!             ├── mUndoRedoManager      always empty
//!             ├── mMetadata
//!             └── mRootNode
//!                 └── TreeNode
//!                     ├── mProperties
//!                     └── mChildren
//! ```
//!
//! Cross references (channel mappings, managed audio, wav clips) use uids
//! assigned on write from registration order. On read, elements are
//! dispatched by name in any order and references may precede the element
//! they point to. Unknown elements are skipped with their whole subtree.

mod progress;
mod reader;
mod writer;

pub use progress::{NoProgress, Progress, ProgressObserver};
pub(crate) use reader::read_project;
pub(crate) use writer::write_project;

pub const XUK_NAMESPACE: &str = "http://www.daisy.org/urakawa/xuk/2.0";

/// File extension of XUK documents.
pub const XUK_EXTENSION: &str = "xuk";
