#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Transport-agnostic release relay interfaces and DTOs.
//!
//! Layout: `model.rs` (ids, media projections, drafts), `service.rs`
//! (collaborator traits), `error.rs` (remote transport failures).

pub mod error;
pub mod model;
pub mod service;

pub use error::{TransportError, TransportResult};
pub use model::{
    ArchivedFile, ChannelId, ChannelPost, FileEvent, FooterButton, MediaFile, MediaKind, MessageRef,
    NormalizedTitle, OwnerId, OwnerPreferences, PostDraft,
};
pub use service::{NoPoster, PersistenceStore, PostComposer, PosterLookup, RemoteTransport};
