//! Postgres-backed [`PersistenceStore`].

use async_trait::async_trait;
use reelcast_core::{
    ArchivedFile, ChannelId, FooterButton, MessageRef, OwnerId, OwnerPreferences,
    PersistenceStore,
};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Decode, PgPool, Postgres, Row, Type};
use tracing::debug;

use crate::error::{DataError, Result, map_query_err};

const MAX_CONNECTIONS: u32 = 5;

const ENSURE_OWNER: &str = r"
    INSERT INTO reelcast.owners (owner_id) VALUES ($1)
    ON CONFLICT (owner_id) DO NOTHING
";

const WATCH_CHANNEL: &str = r"
    INSERT INTO reelcast.watched_channels (channel_id, owner_id) VALUES ($1, $2)
    ON CONFLICT (channel_id) DO UPDATE SET owner_id = EXCLUDED.owner_id, added_at = now()
";

const UNWATCH_CHANNEL: &str = r"DELETE FROM reelcast.watched_channels WHERE channel_id = $1";

const ADD_DESTINATION: &str = r"
    INSERT INTO reelcast.destination_channels (owner_id, channel_id) VALUES ($1, $2)
    ON CONFLICT (owner_id, channel_id) DO NOTHING
";

const REMOVE_DESTINATION: &str =
    r"DELETE FROM reelcast.destination_channels WHERE owner_id = $1 AND channel_id = $2";

const SELECT_DESTINATIONS: &str = r"
    SELECT channel_id FROM reelcast.destination_channels
    WHERE owner_id = $1
    ORDER BY position
";

const SELECT_WATCHING_OWNER: &str =
    r"SELECT owner_id FROM reelcast.watched_channels WHERE channel_id = $1";

const SET_ARCHIVE_CHANNEL: &str = r"
    INSERT INTO reelcast.relay_settings (singleton, archive_channel_id) VALUES (TRUE, $1)
    ON CONFLICT (singleton) DO UPDATE
    SET archive_channel_id = EXCLUDED.archive_channel_id, updated_at = now()
";

const SELECT_ARCHIVE_CHANNEL: &str =
    r"SELECT archive_channel_id FROM reelcast.relay_settings WHERE singleton";

const SET_PREFERENCES: &str = r"
    INSERT INTO reelcast.owners (owner_id, show_poster, footer_buttons) VALUES ($1, $2, $3)
    ON CONFLICT (owner_id) DO UPDATE
    SET show_poster = EXCLUDED.show_poster, footer_buttons = EXCLUDED.footer_buttons
";

const SELECT_PREFERENCES: &str =
    r"SELECT show_poster, footer_buttons FROM reelcast.owners WHERE owner_id = $1";

const UPSERT_FILE_CALL: &str = r"
    SELECT reelcast.upsert_file(
        _owner_id => $1,
        _file_unique_id => $2,
        _archive_chat_id => $3,
        _archive_message_id => $4,
        _file_name => $5,
        _file_size => $6,
        _media_kind => $7,
        _raw_link => $8
    )
";

const SELECT_FILE: &str = r"
    SELECT owner_id, file_unique_id, archive_chat_id, archive_message_id,
           file_name, file_size, media_kind, raw_link
    FROM reelcast.files
    WHERE owner_id = $1 AND file_unique_id = $2
";

/// Deep link to a message inside a private channel.
///
/// Channel ids carry a `-100` prefix that the link format omits.
#[must_use]
pub fn raw_link(message: MessageRef) -> String {
    let chat = message.chat_id.0.to_string();
    let internal = chat.replacen("-100", "", 1);
    format!("https://t.me/c/{internal}/{}", message.message_id)
}

/// Archived file record as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Owner the record belongs to.
    pub owner_id: OwnerId,
    /// Stable identifier shared by every copy of the file.
    pub unique_id: String,
    /// Copy inside the archive channel.
    pub archived: MessageRef,
    /// Original filename.
    pub file_name: String,
    /// Size in bytes when known.
    pub size_bytes: Option<u64>,
    /// Media slot label (`document`, `video`, `audio`).
    pub media_kind: String,
    /// Deep link to the archived copy.
    pub raw_link: String,
}

impl StoredFile {
    fn from_row(row: &PgRow) -> Result<Self> {
        let size: Option<i64> = column(row, "file_size")?;
        let size_bytes = size
            .map(u64::try_from)
            .transpose()
            .map_err(|_| DataError::InvalidValue {
                field: "file_size",
                source: None,
            })?;
        Ok(Self {
            owner_id: OwnerId(column(row, "owner_id")?),
            unique_id: column(row, "file_unique_id")?,
            archived: MessageRef::new(
                ChannelId(column(row, "archive_chat_id")?),
                column(row, "archive_message_id")?,
            ),
            file_name: column(row, "file_name")?,
            size_bytes,
            media_kind: column(row, "media_kind")?,
            raw_link: column(row, "raw_link")?,
        })
    }
}

fn column<'r, T>(row: &'r PgRow, name: &'static str) -> Result<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name).map_err(map_query_err("decode_file_record"))
}

/// Repository over the `reelcast` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or migrations fail.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(map_query_err("connect"))?;
        Self::new(pool).await
    }

    /// Wrap an existing pool, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when migration execution fails.
    pub async fn new(pool: PgPool) -> Result<Self> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_owner(&self, owner: OwnerId) -> Result<()> {
        sqlx::query(ENSURE_OWNER)
            .bind(owner.0)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("ensure_owner"))?;
        Ok(())
    }

    /// Route uploads in `channel` to `owner`, replacing any previous owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn watch_channel(&self, owner: OwnerId, channel: ChannelId) -> Result<()> {
        self.ensure_owner(owner).await?;
        sqlx::query(WATCH_CHANNEL)
            .bind(channel.0)
            .bind(owner.0)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("watch_channel"))?;
        Ok(())
    }

    /// Stop watching `channel`. Returns whether it was watched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn unwatch_channel(&self, channel: ChannelId) -> Result<bool> {
        let result = sqlx::query(UNWATCH_CHANNEL)
            .bind(channel.0)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("unwatch_channel"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Publish `owner`'s releases to `channel` as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn add_destination(&self, owner: OwnerId, channel: ChannelId) -> Result<()> {
        self.ensure_owner(owner).await?;
        sqlx::query(ADD_DESTINATION)
            .bind(owner.0)
            .bind(channel.0)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("add_destination"))?;
        Ok(())
    }

    /// Stop publishing `owner`'s releases to `channel`. Returns whether it was configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn remove_destination(&self, owner: OwnerId, channel: ChannelId) -> Result<bool> {
        let result = sqlx::query(REMOVE_DESTINATION)
            .bind(owner.0)
            .bind(channel.0)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("remove_destination"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Configure (or clear) the process-wide archive channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_archive_channel(&self, channel: Option<ChannelId>) -> Result<()> {
        sqlx::query(SET_ARCHIVE_CHANNEL)
            .bind(channel.map(|channel| channel.0))
            .execute(&self.pool)
            .await
            .map_err(map_query_err("set_archive_channel"))?;
        Ok(())
    }

    /// Store presentation preferences for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_preferences(&self, owner: OwnerId, preferences: &OwnerPreferences) -> Result<()> {
        sqlx::query(SET_PREFERENCES)
            .bind(owner.0)
            .bind(preferences.show_poster)
            .bind(Json(&preferences.footer_buttons))
            .execute(&self.pool)
            .await
            .map_err(map_query_err("set_preferences"))?;
        Ok(())
    }

    /// Fetch the archived record for `unique_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn file_record(&self, owner: OwnerId, unique_id: &str) -> Result<Option<StoredFile>> {
        let row = sqlx::query(SELECT_FILE)
            .bind(owner.0)
            .bind(unique_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_err("file_record"))?;
        row.as_ref().map(StoredFile::from_row).transpose()
    }
}

#[async_trait]
impl PersistenceStore for PgStore {
    async fn save_file_record(&self, file: &ArchivedFile) -> anyhow::Result<()> {
        let size = file
            .media
            .size_bytes
            .map(|size| i64::try_from(size).unwrap_or(i64::MAX));
        sqlx::query(UPSERT_FILE_CALL)
            .bind(file.owner_id.0)
            .bind(&file.media.unique_id)
            .bind(file.archived.chat_id.0)
            .bind(file.archived.message_id)
            .bind(&file.media.file_name)
            .bind(size)
            .bind(file.media.kind.as_str())
            .bind(raw_link(file.archived))
            .execute(&self.pool)
            .await
            .map_err(map_query_err("save_file_record"))?;
        debug!(owner_id = %file.owner_id, unique_id = %file.media.unique_id, "file record saved");
        Ok(())
    }

    async fn destination_channels(&self, owner: OwnerId) -> anyhow::Result<Vec<ChannelId>> {
        let rows = sqlx::query(SELECT_DESTINATIONS)
            .bind(owner.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_err("destination_channels"))?;
        let mut channels = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row
                .try_get("channel_id")
                .map_err(map_query_err("destination_channels"))?;
            channels.push(ChannelId(id));
        }
        Ok(channels)
    }

    async fn owner_for_watched_channel(
        &self,
        channel: ChannelId,
    ) -> anyhow::Result<Option<OwnerId>> {
        let owner: Option<i64> = sqlx::query_scalar(SELECT_WATCHING_OWNER)
            .bind(channel.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_err("owner_for_watched_channel"))?;
        Ok(owner.map(OwnerId))
    }

    async fn archive_channel(&self) -> anyhow::Result<Option<ChannelId>> {
        let configured: Option<Option<i64>> = sqlx::query_scalar(SELECT_ARCHIVE_CHANNEL)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_err("archive_channel"))?;
        Ok(configured.flatten().map(ChannelId))
    }

    async fn owner_preferences(&self, owner: OwnerId) -> anyhow::Result<OwnerPreferences> {
        let row = sqlx::query(SELECT_PREFERENCES)
            .bind(owner.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_err("owner_preferences"))?;
        let Some(row) = row else {
            return Ok(OwnerPreferences::default());
        };

        let show_poster: bool = row
            .try_get("show_poster")
            .map_err(map_query_err("owner_preferences"))?;
        let Json(footer): Json<Value> = row
            .try_get("footer_buttons")
            .map_err(map_query_err("owner_preferences"))?;
        let footer_buttons = serde_json::from_value::<Vec<FooterButton>>(footer).map_err(|source| {
            DataError::InvalidValue {
                field: "footer_buttons",
                source: Some(source),
            }
        })?;
        Ok(OwnerPreferences {
            show_poster,
            footer_buttons,
        })
    }
}
