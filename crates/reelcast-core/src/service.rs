//! Collaborator traits consumed by the relay pipeline.

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::model::{
    ArchivedFile, ChannelId, FooterButton, MessageRef, OwnerId, OwnerPreferences, PostDraft,
};

/// Outbound messaging surface (copy, send, delete).
///
/// Implementations report throttling through
/// [`TransportError::RateLimited`](crate::TransportError::RateLimited) and
/// must not retry on their own.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Copy the message at `source` into the `archive` chat.
    async fn copy_to_archive(
        &self,
        source: MessageRef,
        archive: ChannelId,
    ) -> TransportResult<MessageRef>;

    /// Send a markdown text message.
    async fn send_text(
        &self,
        channel: ChannelId,
        text: &str,
        footer: &[FooterButton],
    ) -> TransportResult<MessageRef>;

    /// Send an image by URL with a markdown caption.
    async fn send_image(
        &self,
        channel: ChannelId,
        image_url: &str,
        caption: &str,
        footer: &[FooterButton],
    ) -> TransportResult<MessageRef>;

    /// Delete a previously sent message.
    async fn delete_message(&self, message: MessageRef) -> TransportResult<()>;
}

/// Durable storage for owner settings and archived file records.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Record (or refresh) the archived copy of a file.
    async fn save_file_record(&self, file: &ArchivedFile) -> anyhow::Result<()>;

    /// Channels the owner publishes releases to.
    async fn destination_channels(&self, owner: OwnerId) -> anyhow::Result<Vec<ChannelId>>;

    /// Owner watching `channel` for uploads, if any.
    async fn owner_for_watched_channel(&self, channel: ChannelId)
    -> anyhow::Result<Option<OwnerId>>;

    /// Process-wide archive chat; `None` until an operator configures it.
    async fn archive_channel(&self) -> anyhow::Result<Option<ChannelId>>;

    /// Presentation preferences; defaults when the owner has none stored.
    async fn owner_preferences(&self, owner: OwnerId) -> anyhow::Result<OwnerPreferences> {
        let _ = owner;
        Ok(OwnerPreferences::default())
    }
}

/// Turns a finalized batch into publishable drafts.
#[async_trait]
pub trait PostComposer: Send + Sync {
    /// Compose every draft needed to publish `files`, in send order.
    async fn compose_posts(
        &self,
        owner: OwnerId,
        files: &[ArchivedFile],
    ) -> anyhow::Result<Vec<PostDraft>>;
}

/// Poster image lookup for a release title.
#[async_trait]
pub trait PosterLookup: Send + Sync {
    /// URL of a poster for `title`, if one can be found.
    async fn find_poster(&self, title: &str, year: Option<&str>) -> anyhow::Result<Option<String>>;
}

/// Lookup that never finds a poster.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPoster;

#[async_trait]
impl PosterLookup for NoPoster {
    async fn find_poster(&self, title: &str, year: Option<&str>) -> anyhow::Result<Option<String>> {
        let _ = (title, year);
        Ok(None)
    }
}
