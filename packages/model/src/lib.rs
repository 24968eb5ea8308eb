//! # XUK Model
//!
//! Tree-structured multimedia publication model with reversible editing and
//! XUK persistence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Project: presentations + XUK open/save      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ Presentation                                │
//! │  - Tree of nodes with properties            │
//! │  - Channels, media data, data providers     │
//! │  - Metadata, factories                      │
//! │  - Undo/redo history of commands            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ EventBus: typed, bubbling change events     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Handles, not pointers**: nodes, channels and media data live in
//!    arenas owned by one presentation and are addressed by typed ids
//! 2. **Validate, then apply**: a rejected command leaves the model untouched
//! 3. **Every edit is reversible**: commands compute their inverse before
//!    they run
//! 4. **Lossless persistence**: read after write yields an equal presentation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use xuk_model::{ChannelKind, ChannelsProperty, Command, Media, Project};
//!
//! let mut project = Project::new();
//! let p = project.add_new_presentation(Url::parse("file:///books/moby/")?)?;
//! let text = p.channels_mut().add_channel("text", ChannelKind::Text)?;
//!
//! let root = p.root_node().unwrap();
//! let chapter = p.create_node();
//! p.execute(Command::InsertNode { parent: root, index: 0, node: chapter })?;
//! p.execute(Command::AddProperty { node: chapter, property: ChannelsProperty::new().into() })?;
//! p.execute(Command::SetChannelMedia {
//!     node: chapter,
//!     channel: text,
//!     media: Some(Media::text("Call me Ishmael.")),
//! })?;
//! p.undo()?;
//!
//! project.save_xuk(&Url::parse("file:///books/moby/book.xuk")?)?;
//! ```

mod channel;
mod command;
mod data_provider;
mod error;
mod events;
mod factory;
mod ids;
mod media_data;
mod metadata;
mod options;
mod presentation;
mod project;
mod property;
mod tree;
mod undo;
mod visitor;

pub mod media;
pub mod xuk;

pub use channel::{Channel, ChannelKind, ChannelsManager};
pub use command::{Command, CompositeCommand, EditContext};
pub use data_provider::{
    DataProviderKind, DataProviderManager, FileDataProvider, InputStream, OutputStream,
    DEFAULT_DATA_DIRECTORY,
};
pub use error::{ErrorKind, ModelError, ModelResult};
pub use events::{DataModelEvent, EventBus, EventKind, ListenerId};
pub use factory::{
    DefaultChannelFactory, DefaultDataProviderFactory, DefaultMediaDataFactory,
    DefaultMediaFactory, DefaultNodeFactory, DefaultPropertyFactory, Factory, NodeKind,
};
pub use ids::{ChannelId, DataProviderId, MediaDataId, NodeId, PresentationId};
pub use media::{
    Clip, ExternalAudioMedia, ExternalImageMedia, ExternalTextMedia, ExternalVideoMedia,
    ManagedAudioMedia, Media, MediaType, SequenceMedia, Size, TextMedia, Time,
};
pub use media_data::{MediaData, MediaDataManager, PcmFormat, WavAudioMediaData, WavClip};
pub use metadata::Metadata;
pub use options::XukOptions;
pub use presentation::{ChannelSummary, CleanupReport, Presentation, PresentationSummary};
pub use project::Project;
pub use property::{ChannelsProperty, Property, PropertyKind, XmlAttribute, XmlProperty};
pub use tree::{DepthFirst, Tree};
pub use undo::UndoRedoManager;
pub use visitor::{walk_depth_first, PreOrder, TreeVisitor};

/// Structural equality that ignores identity: handles are compared by what
/// they point at, not by their index.
pub trait ValueEquals<Rhs: ?Sized = Self> {
    fn value_equals(&self, other: &Rhs) -> bool;
}
