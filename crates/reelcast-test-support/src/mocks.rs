//! In-memory collaborators for pipeline and adapter tests.
//!
//! Every mock is cheap to clone and shares its state between clones, so a test
//! can hand one copy to the code under test and inspect another.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reelcast_core::{
    ArchivedFile, ChannelId, FileEvent, FooterButton, MediaFile, MediaKind, MessageRef, OwnerId,
    OwnerPreferences, PersistenceStore, PosterLookup, RemoteTransport, TransportError,
    TransportResult,
};
use tokio::time::Instant;

/// Chat the default fixtures pretend files were uploaded to.
pub const SOURCE_CHANNEL: ChannelId = ChannelId(-100_100);

/// Chat the default fixtures pretend files were archived into.
pub const ARCHIVE_CHANNEL: ChannelId = ChannelId(-100_900);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn media(name: &str) -> MediaFile {
    MediaFile {
        kind: MediaKind::Document,
        file_name: name.to_string(),
        size_bytes: Some(700 * 1024 * 1024),
        unique_id: format!("uid-{}", name.replace(' ', "_")),
    }
}

/// A file event for `name` uploaded to `channel` by `owner`.
#[must_use]
pub fn file_event(owner: i64, message_id: i64, name: &str) -> FileEvent {
    FileEvent {
        owner_id: OwnerId(owner),
        source: MessageRef::new(SOURCE_CHANNEL, message_id),
        media: media(name),
    }
}

/// An already archived file for `name` owned by `owner`.
#[must_use]
pub fn archived_file(owner: i64, name: &str) -> ArchivedFile {
    ArchivedFile::from_event(
        file_event(owner, 1, name),
        MessageRef::new(ARCHIVE_CHANNEL, 1),
    )
}

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Transport method name (`copy_to_archive`, `send_text`, `send_image`, `delete_message`).
    pub operation: &'static str,
    /// Target chat.
    pub channel: ChannelId,
    /// Text or caption; empty for copies and deletes.
    pub text: String,
    /// Image URL for `send_image`.
    pub image_url: Option<String>,
    /// Footer buttons for sends.
    pub footer: Vec<FooterButton>,
    /// Source message for copies, target message for deletes.
    pub message: Option<MessageRef>,
    /// Message produced by the call; `None` when it failed.
    pub reply: Option<MessageRef>,
    /// When the call was made (tokio clock, so paused time applies).
    pub at: Instant,
}

#[derive(Debug)]
enum Scripted {
    RateLimited(Duration),
    Rejected,
}

#[derive(Default)]
struct TransportState {
    calls: Vec<RecordedCall>,
    scripted: HashMap<&'static str, VecDeque<Scripted>>,
    denied: Vec<ChannelId>,
}

/// Remote transport that records every call and replays scripted failures.
#[derive(Clone)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
    next_message_id: Arc<AtomicI64>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Transport that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState::default())),
            next_message_id: Arc::new(AtomicI64::new(1_000)),
        }
    }

    /// Answer the next `times` calls of `operation` with a throttling signal.
    pub fn rate_limit_next(&self, operation: &'static str, times: usize, retry_after: Duration) {
        let mut state = lock(&self.state);
        let queue = state.scripted.entry(operation).or_default();
        queue.extend((0..times).map(|_| Scripted::RateLimited(retry_after)));
    }

    /// Reject the next `times` calls of `operation` with a generic error.
    pub fn fail_next(&self, operation: &'static str, times: usize) {
        let mut state = lock(&self.state);
        let queue = state.scripted.entry(operation).or_default();
        queue.extend((0..times).map(|_| Scripted::Rejected));
    }

    /// Refuse every copy or send targeting `channel` with a permission error.
    pub fn deny_channel(&self, channel: ChannelId) {
        lock(&self.state).denied.push(channel);
    }

    /// Every call in the order it was made.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state).calls.clone()
    }

    /// Calls of a single transport method.
    #[must_use]
    pub fn calls_for(&self, operation: &str) -> Vec<RecordedCall> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    fn record(&self, mut call: RecordedCall, target_checked: bool) -> TransportResult<MessageRef> {
        let mut state = lock(&self.state);
        let scripted = state
            .scripted
            .get_mut(call.operation)
            .and_then(VecDeque::pop_front);
        let outcome = match scripted {
            Some(Scripted::RateLimited(retry_after)) => Err(TransportError::RateLimited {
                operation: call.operation,
                retry_after,
            }),
            Some(Scripted::Rejected) => Err(TransportError::Rejected {
                operation: call.operation,
                code: 400,
                description: "scripted failure".to_string(),
            }),
            None if target_checked && state.denied.contains(&call.channel) => {
                Err(TransportError::PermissionDenied {
                    operation: call.operation,
                    channel: call.channel,
                    detail: "not enough rights to send messages".to_string(),
                })
            }
            None => Ok(MessageRef::new(
                call.channel,
                self.next_message_id.fetch_add(1, Ordering::SeqCst),
            )),
        };
        call.reply = outcome.as_ref().ok().copied();
        state.calls.push(call);
        outcome
    }

    fn call(operation: &'static str, channel: ChannelId) -> RecordedCall {
        RecordedCall {
            operation,
            channel,
            text: String::new(),
            image_url: None,
            footer: Vec::new(),
            message: None,
            reply: None,
            at: Instant::now(),
        }
    }
}

#[async_trait]
impl RemoteTransport for RecordingTransport {
    async fn copy_to_archive(
        &self,
        source: MessageRef,
        archive: ChannelId,
    ) -> TransportResult<MessageRef> {
        let call = RecordedCall {
            message: Some(source),
            ..Self::call("copy_to_archive", archive)
        };
        self.record(call, true)
    }

    async fn send_text(
        &self,
        channel: ChannelId,
        text: &str,
        footer: &[FooterButton],
    ) -> TransportResult<MessageRef> {
        let call = RecordedCall {
            text: text.to_string(),
            footer: footer.to_vec(),
            ..Self::call("send_text", channel)
        };
        self.record(call, true)
    }

    async fn send_image(
        &self,
        channel: ChannelId,
        image_url: &str,
        caption: &str,
        footer: &[FooterButton],
    ) -> TransportResult<MessageRef> {
        let call = RecordedCall {
            text: caption.to_string(),
            image_url: Some(image_url.to_string()),
            footer: footer.to_vec(),
            ..Self::call("send_image", channel)
        };
        self.record(call, true)
    }

    async fn delete_message(&self, message: MessageRef) -> TransportResult<()> {
        let call = RecordedCall {
            message: Some(message),
            ..Self::call("delete_message", message.chat_id)
        };
        self.record(call, false).map(|_| ())
    }
}

#[derive(Default)]
struct StoreState {
    watched: HashMap<ChannelId, OwnerId>,
    destinations: HashMap<OwnerId, Vec<ChannelId>>,
    archive: Option<ChannelId>,
    preferences: HashMap<OwnerId, OwnerPreferences>,
    saved: Vec<ArchivedFile>,
    fail_saves: bool,
    archive_lookups: usize,
}

/// Persistence store backed by in-process maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// Empty store with no archive channel configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store archiving into [`ARCHIVE_CHANNEL`].
    #[must_use]
    pub fn with_archive() -> Self {
        let store = Self::new();
        store.set_archive_channel(Some(ARCHIVE_CHANNEL));
        store
    }

    /// Mark `channel` as watched by `owner`.
    pub fn watch(&self, channel: ChannelId, owner: OwnerId) {
        lock(&self.state).watched.insert(channel, owner);
    }

    /// Add a destination channel for `owner`.
    pub fn add_destination(&self, owner: OwnerId, channel: ChannelId) {
        lock(&self.state)
            .destinations
            .entry(owner)
            .or_default()
            .push(channel);
    }

    /// Configure (or clear) the archive channel.
    pub fn set_archive_channel(&self, channel: Option<ChannelId>) {
        lock(&self.state).archive = channel;
    }

    /// Store presentation preferences for `owner`.
    pub fn set_preferences(&self, owner: OwnerId, preferences: OwnerPreferences) {
        lock(&self.state).preferences.insert(owner, preferences);
    }

    /// Make every subsequent `save_file_record` fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        lock(&self.state).fail_saves = fail;
    }

    /// Records saved so far, in save order.
    #[must_use]
    pub fn saved_files(&self) -> Vec<ArchivedFile> {
        lock(&self.state).saved.clone()
    }

    /// Number of archive channel lookups served.
    #[must_use]
    pub fn archive_lookups(&self) -> usize {
        lock(&self.state).archive_lookups
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn save_file_record(&self, file: &ArchivedFile) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_saves {
            anyhow::bail!("scripted save failure");
        }
        state.saved.retain(|saved| {
            saved.owner_id != file.owner_id || saved.media.unique_id != file.media.unique_id
        });
        state.saved.push(file.clone());
        Ok(())
    }

    async fn destination_channels(&self, owner: OwnerId) -> anyhow::Result<Vec<ChannelId>> {
        Ok(lock(&self.state)
            .destinations
            .get(&owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn owner_for_watched_channel(
        &self,
        channel: ChannelId,
    ) -> anyhow::Result<Option<OwnerId>> {
        Ok(lock(&self.state).watched.get(&channel).copied())
    }

    async fn archive_channel(&self) -> anyhow::Result<Option<ChannelId>> {
        let mut state = lock(&self.state);
        state.archive_lookups += 1;
        Ok(state.archive)
    }

    async fn owner_preferences(&self, owner: OwnerId) -> anyhow::Result<OwnerPreferences> {
        Ok(lock(&self.state)
            .preferences
            .get(&owner)
            .cloned()
            .unwrap_or_default())
    }
}

/// Poster lookup that always answers with the same image.
#[derive(Clone)]
pub struct StaticPosters {
    url: String,
    lookups: Arc<AtomicUsize>,
}

impl StaticPosters {
    /// Lookup returning `url` for every title.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of lookups performed.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PosterLookup for StaticPosters {
    async fn find_poster(&self, title: &str, year: Option<&str>) -> anyhow::Result<Option<String>> {
        let _ = (title, year);
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let transport = RecordingTransport::new();
        transport.rate_limit_next("send_text", 1, Duration::from_secs(3));
        transport.fail_next("send_text", 1);

        let first = transport.send_text(ChannelId(1), "a", &[]).await;
        let second = transport.send_text(ChannelId(1), "b", &[]).await;
        let third = transport.send_text(ChannelId(1), "c", &[]).await;

        assert_eq!(
            first.err().and_then(|err| err.retry_after()),
            Some(Duration::from_secs(3))
        );
        assert!(matches!(second, Err(TransportError::Rejected { .. })));
        assert!(third.is_ok());
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn denied_channels_refuse_sends_but_not_deletes() {
        let transport = RecordingTransport::new();
        transport.deny_channel(ChannelId(5));
        let sent = transport.send_text(ChannelId(5), "x", &[]).await;
        assert!(matches!(
            sent,
            Err(TransportError::PermissionDenied { channel: ChannelId(5), .. })
        ));
        assert!(
            transport
                .delete_message(MessageRef::new(ChannelId(5), 1))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn memory_store_upserts_by_owner_and_unique_id() -> anyhow::Result<()> {
        let store = MemoryStore::with_archive();
        let file = archived_file(1, "Alpha.mkv");
        store.save_file_record(&file).await?;
        store.save_file_record(&file).await?;
        assert_eq!(store.saved_files().len(), 1);
        assert_eq!(store.archive_channel().await?, Some(ARCHIVE_CHANNEL));
        assert_eq!(store.archive_lookups(), 1);
        Ok(())
    }
}
