//! Shared DTOs exchanged between the relay pipeline and its adapters.
//!
//! # Design
//! - Identifiers are thin newtypes over the remote platform's `i64` chat ids.
//! - Media payloads are resolved once into a tagged [`MediaKind`] plus a uniform
//!   [`MediaFile`] projection, so downstream code never inspects raw updates.
//! - Drafts and archived references are plain data; ownership moves through the
//!   pipeline rather than being shared.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Account that owns a set of watched and destination channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub i64);

impl OwnerId {
    /// Private chat used to reach the owner directly.
    #[must_use]
    pub const fn direct_chat(self) -> ChannelId {
        ChannelId(self.0)
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote chat identifier (channel, group, or private chat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pointer to a single message inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Chat holding the message.
    pub chat_id: ChannelId,
    /// Message identifier scoped to `chat_id`.
    pub message_id: i64,
}

impl MessageRef {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(chat_id: ChannelId, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// Which media slot of a channel post carried the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Generic document attachment.
    Document,
    /// Video attachment.
    Video,
    /// Audio attachment.
    Audio,
}

impl MediaKind {
    /// Stable lowercase label used in logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Uniform projection of a media attachment regardless of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Media slot the attachment arrived in.
    pub kind: MediaKind,
    /// Original filename as uploaded.
    pub file_name: String,
    /// Size in bytes when the platform reported one.
    pub size_bytes: Option<u64>,
    /// Stable identifier shared by every copy of the same file.
    pub unique_id: String,
}

/// A message observed in some channel, before any owner lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPost {
    /// Where the message was posted.
    pub message: MessageRef,
    /// Attachment projection when the post carried a document, video, or audio.
    pub media: Option<MediaFile>,
}

/// A new file observed in a watched source channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// Owner of the watched channel.
    pub owner_id: OwnerId,
    /// Message carrying the file in the source channel.
    pub source: MessageRef,
    /// Resolved attachment metadata.
    pub media: MediaFile,
}

impl FileEvent {
    /// Filename as uploaded, before any normalisation.
    #[must_use]
    pub fn raw_filename(&self) -> &str {
        &self.media.file_name
    }
}

/// A file that has been copied into the archive channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedFile {
    /// Owner the file belongs to.
    pub owner_id: OwnerId,
    /// Original message in the source channel.
    pub source: MessageRef,
    /// Copy inside the archive channel.
    pub archived: MessageRef,
    /// Attachment metadata carried over from the source event.
    pub media: MediaFile,
}

impl ArchivedFile {
    /// Build the archived reference for `event` once its copy exists.
    #[must_use]
    pub fn from_event(event: FileEvent, archived: MessageRef) -> Self {
        Self {
            owner_id: event.owner_id,
            source: event.source,
            archived,
            media: event.media,
        }
    }
}

/// Base title and optional release year extracted from a filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTitle {
    /// Cleaned title, never empty.
    pub base_title: String,
    /// Four digit year when one was present.
    pub year: Option<String>,
}

/// Inline link button attached beneath a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FooterButton {
    /// Button caption.
    pub label: String,
    /// Target URL.
    pub url: String,
}

/// A single post ready to be sent to destination channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    /// Poster image; when present the caption is sent alongside it.
    pub poster_url: Option<String>,
    /// Markdown caption text.
    pub caption: String,
    /// Buttons rendered under the post.
    pub footer: Vec<FooterButton>,
}

/// Per-owner presentation preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerPreferences {
    /// Whether posts should carry a poster image.
    pub show_poster: bool,
    /// Buttons appended to every post.
    pub footer_buttons: Vec<FooterButton>,
}

impl Default for OwnerPreferences {
    fn default() -> Self {
        Self {
            show_poster: true,
            footer_buttons: Vec::new(),
        }
    }
}
