//! Request payloads, response envelopes, and failure classification.
//!
//! # Design
//! - Every method answers with the same `{ ok, result, error_code, description,
//!   parameters }` envelope; [`ApiResponse::into_result`] is the single place a
//!   failed envelope becomes a [`TransportError`].
//! - Throttling wins over every other classification, then missing rights,
//!   then everything else is a plain rejection.

use std::time::Duration;

use reelcast_core::{
    ChannelId, ChannelPost, FooterButton, MediaFile, MediaKind, MessageRef, TransportError,
};
use serde::{Deserialize, Serialize};

/// Markdown flavour used for every caption.
pub const PARSE_MODE: &str = "Markdown";

/// Cooldown assumed when a 429 arrives without `retry_after`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

const PERMISSION_MARKERS: [&str; 3] = [
    "not enough rights",
    "need administrator rights",
    "chat not found",
];

#[derive(Debug, Serialize)]
pub struct CopyMessage {
    pub chat_id: i64,
    pub from_chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SendPhoto<'a> {
    pub chat_id: i64,
    pub photo: &'a str,
    pub caption: &'a str,
    pub parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub struct GetUpdates {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
pub struct InlineKeyboard<'a> {
    pub inline_keyboard: Vec<[InlineButton<'a>; 1]>,
}

#[derive(Debug, Serialize)]
pub struct InlineButton<'a> {
    pub text: &'a str,
    pub url: &'a str,
}

/// One button per row, in the owner's configured order.
pub fn keyboard(footer: &[FooterButton]) -> Option<InlineKeyboard<'_>> {
    if footer.is_empty() {
        return None;
    }
    Some(InlineKeyboard {
        inline_keyboard: footer
            .iter()
            .map(|button| {
                [InlineButton {
                    text: &button.label,
                    url: &button.url,
                }]
            })
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<u16>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(
        self,
        operation: &'static str,
        channel: ChannelId,
        status: u16,
    ) -> Result<T, TransportError> {
        if self.ok
            && let Some(result) = self.result
        {
            return Ok(result);
        }
        let code = self.error_code.unwrap_or(status);
        let retry_after = self.parameters.and_then(|parameters| parameters.retry_after);
        let description = self
            .description
            .unwrap_or_else(|| "response carried no result".to_string());
        Err(classify(operation, channel, code, &description, retry_after))
    }
}

pub fn classify(
    operation: &'static str,
    channel: ChannelId,
    code: u16,
    description: &str,
    retry_after: Option<u64>,
) -> TransportError {
    if code == 429 || retry_after.is_some() {
        return TransportError::RateLimited {
            operation,
            retry_after: retry_after.map_or(DEFAULT_RETRY_AFTER, Duration::from_secs),
        };
    }
    let lowered = description.to_lowercase();
    if code == 403
        || PERMISSION_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    {
        return TransportError::PermissionDenied {
            operation,
            channel,
            detail: description.to_string(),
        };
    }
    TransportError::Rejected {
        operation,
        code,
        description: description.to_string(),
    }
}

/// Result shape shared by `copyMessage` (a `MessageId`) and the send methods
/// (a full `Message`); only the id is read.
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub document: Option<Attachment>,
    pub video: Option<Attachment>,
    pub audio: Option<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Attachment {
    pub file_unique_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

impl Message {
    /// Project the first populated media slot, document before video before audio.
    pub fn into_post(self) -> ChannelPost {
        let media = [
            (MediaKind::Document, self.document),
            (MediaKind::Video, self.video),
            (MediaKind::Audio, self.audio),
        ]
        .into_iter()
        .find_map(|(kind, attachment)| attachment.map(|attachment| (kind, attachment)))
        .map(|(kind, attachment)| MediaFile {
            kind,
            file_name: attachment.file_name.unwrap_or_default(),
            size_bytes: attachment.file_size,
            unique_id: attachment.file_unique_id,
        });
        ChannelPost {
            message: MessageRef::new(ChannelId(self.chat.id), self.message_id),
            media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CHANNEL: ChannelId = ChannelId(-100_42);

    #[test]
    fn retry_after_marks_throttling_even_without_429() {
        let err = classify("send_text", CHANNEL, 400, "Too Many Requests", Some(9));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(9)));

        let err = classify("send_text", CHANNEL, 429, "Too Many Requests", None);
        assert_eq!(err.retry_after(), Some(DEFAULT_RETRY_AFTER));
    }

    #[test]
    fn rights_failures_become_permission_denied() {
        for (code, description) in [
            (403, "Forbidden: bot is not a member of the channel chat"),
            (400, "Bad Request: not enough rights to send text messages to the chat"),
            (400, "Bad Request: need administrator rights in the channel chat"),
            (400, "Bad Request: chat not found"),
        ] {
            let err = classify("send_text", CHANNEL, code, description, None);
            assert!(
                matches!(err, TransportError::PermissionDenied { channel, .. } if channel == CHANNEL),
                "{description}"
            );
        }
    }

    #[test]
    fn other_failures_are_rejections() {
        let err = classify("send_image", CHANNEL, 400, "Bad Request: wrong file identifier", None);
        assert!(matches!(err, TransportError::Rejected { code: 400, .. }));
    }

    #[test]
    fn footer_renders_one_button_per_row() -> Result<(), serde_json::Error> {
        assert!(keyboard(&[]).is_none());
        let footer = vec![
            FooterButton {
                label: "Updates".to_string(),
                url: "https://t.me/updates".to_string(),
            },
            FooterButton {
                label: "Requests".to_string(),
                url: "https://t.me/requests".to_string(),
            },
        ];
        let rendered = serde_json::to_value(keyboard(&footer))?;
        assert_eq!(
            rendered,
            json!({"inline_keyboard": [
                [{"text": "Updates", "url": "https://t.me/updates"}],
                [{"text": "Requests", "url": "https://t.me/requests"}]
            ]})
        );
        Ok(())
    }

    #[test]
    fn message_projects_first_media_slot() -> Result<(), serde_json::Error> {
        let message: Message = serde_json::from_value(json!({
            "message_id": 5,
            "chat": {"id": -100_100, "type": "channel"},
            "video": {"file_id": "x", "file_unique_id": "vid-1", "file_name": "Alpha.S01E01.mkv", "file_size": 2048},
            "audio": {"file_id": "y", "file_unique_id": "aud-1"}
        }))?;
        let post = message.into_post();
        assert_eq!(post.message, MessageRef::new(ChannelId(-100_100), 5));
        let media = post.media.expect("video projected");
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.file_name, "Alpha.S01E01.mkv");
        assert_eq!(media.size_bytes, Some(2048));
        assert_eq!(media.unique_id, "vid-1");
        Ok(())
    }

    #[test]
    fn text_posts_have_no_media() -> Result<(), serde_json::Error> {
        let message: Message = serde_json::from_value(json!({
            "message_id": 6,
            "chat": {"id": -100_100},
            "text": "hello"
        }))?;
        assert!(message.into_post().media.is_none());
        Ok(())
    }
}
