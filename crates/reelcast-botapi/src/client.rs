//! Bot API client implementing the relay's outbound transport.
//!
//! # Design
//! - Every method is a JSON `POST` to `{api_base}/bot{token}/{method}`.
//! - The client never retries; throttling surfaces as
//!   [`TransportError::RateLimited`] for the pipeline's flood guard.
//! - Request errors are stripped of their URL before being returned, since the
//!   URL embeds the bot token.

use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use reelcast_core::{
    ChannelId, FooterButton, MessageRef, RemoteTransport, TransportError, TransportResult,
};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::{
    ApiResponse, CopyMessage, DeleteMessage, GetUpdates, PARSE_MODE, SendMessage, SendPhoto,
    SentMessage, Update, keyboard,
};

/// Default per-request timeout for non-polling calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin Bot API client; cheap to clone.
#[derive(Clone)]
pub struct BotApi {
    client: Client,
    api_base: String,
    token: String,
    request_timeout: Duration,
}

impl Debug for BotApi {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi")
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl BotApi {
    /// Build a client for `api_base` authenticated by `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when the HTTP client cannot be built.
    pub fn new(api_base: &str, token: impl Into<String>) -> TransportResult<Self> {
        Self::with_timeout(api_base, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`BotApi::new`] with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when the HTTP client cannot be built.
    pub fn with_timeout(
        api_base: &str,
        token: impl Into<String>,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|err| TransportError::request("build_client", err))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn call<P, T>(
        &self,
        operation: &'static str,
        method: &str,
        channel: ChannelId,
        payload: &P,
        timeout: Duration,
    ) -> TransportResult<T>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| TransportError::request(operation, err.without_url()))?;
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|err| TransportError::request(operation, err.without_url()))?;
        let result = envelope.into_result(operation, channel, status);
        if let Err(err) = &result {
            debug!(operation, channel_id = %channel, status, error = %err, "bot api call failed");
        }
        result
    }

    async fn send(
        &self,
        operation: &'static str,
        method: &str,
        channel: ChannelId,
        payload: &(impl Serialize + Sync),
    ) -> TransportResult<MessageRef> {
        let sent: SentMessage = self
            .call(operation, method, channel, payload, self.request_timeout)
            .await?;
        Ok(MessageRef::new(channel, sent.message_id))
    }

    pub(crate) async fn get_updates(
        &self,
        offset: i64,
        long_poll: Duration,
    ) -> TransportResult<Vec<Update>> {
        let payload = GetUpdates {
            offset,
            timeout: long_poll.as_secs(),
            allowed_updates: ["channel_post"],
        };
        self.call(
            "get_updates",
            "getUpdates",
            ChannelId(0),
            &payload,
            self.request_timeout + long_poll,
        )
        .await
    }
}

#[async_trait]
impl RemoteTransport for BotApi {
    async fn copy_to_archive(
        &self,
        source: MessageRef,
        archive: ChannelId,
    ) -> TransportResult<MessageRef> {
        let payload = CopyMessage {
            chat_id: archive.0,
            from_chat_id: source.chat_id.0,
            message_id: source.message_id,
        };
        self.send("copy_to_archive", "copyMessage", archive, &payload)
            .await
    }

    async fn send_text(
        &self,
        channel: ChannelId,
        text: &str,
        footer: &[FooterButton],
    ) -> TransportResult<MessageRef> {
        let payload = SendMessage {
            chat_id: channel.0,
            text,
            parse_mode: PARSE_MODE,
            disable_web_page_preview: true,
            reply_markup: keyboard(footer),
        };
        self.send("send_text", "sendMessage", channel, &payload).await
    }

    async fn send_image(
        &self,
        channel: ChannelId,
        image_url: &str,
        caption: &str,
        footer: &[FooterButton],
    ) -> TransportResult<MessageRef> {
        let payload = SendPhoto {
            chat_id: channel.0,
            photo: image_url,
            caption,
            parse_mode: PARSE_MODE,
            reply_markup: keyboard(footer),
        };
        self.send("send_image", "sendPhoto", channel, &payload).await
    }

    async fn delete_message(&self, message: MessageRef) -> TransportResult<()> {
        let payload = DeleteMessage {
            chat_id: message.chat_id.0,
            message_id: message.message_id,
        };
        let _: bool = self
            .call(
                "delete_message",
                "deleteMessage",
                message.chat_id,
                &payload,
                self.request_timeout,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const TOKEN: &str = "123:secret-token";
    const ARCHIVE: ChannelId = ChannelId(-100_900);
    const DESTINATION: ChannelId = ChannelId(-100_500);

    fn api_for(server: &MockServer) -> TransportResult<BotApi> {
        BotApi::new(&server.base_url(), TOKEN)
    }

    #[tokio::test]
    async fn copy_to_archive_returns_archived_reference() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/copyMessage"))
                .json_body(json!({
                    "chat_id": -100_900,
                    "from_chat_id": -100_100,
                    "message_id": 5
                }));
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 41}}));
        });

        let archived = api_for(&server)?
            .copy_to_archive(MessageRef::new(ChannelId(-100_100), 5), ARCHIVE)
            .await?;
        mock.assert();
        assert_eq!(archived, MessageRef::new(ARCHIVE, 41));
        Ok(())
    }

    #[tokio::test]
    async fn send_text_carries_markdown_and_footer() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendMessage"))
                .json_body(json!({
                    "chat_id": -100_500,
                    "text": "🎬 *Alpha*",
                    "parse_mode": "Markdown",
                    "disable_web_page_preview": true,
                    "reply_markup": {"inline_keyboard": [[{"text": "Updates", "url": "https://t.me/updates"}]]}
                }));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"message_id": 7, "chat": {"id": -100_500}, "date": 0}
            }));
        });

        let footer = [FooterButton {
            label: "Updates".to_string(),
            url: "https://t.me/updates".to_string(),
        }];
        let sent = api_for(&server)?
            .send_text(DESTINATION, "🎬 *Alpha*", &footer)
            .await?;
        mock.assert();
        assert_eq!(sent, MessageRef::new(DESTINATION, 7));
        Ok(())
    }

    #[tokio::test]
    async fn send_image_omits_empty_keyboard() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/sendPhoto"))
                .json_body(json!({
                    "chat_id": -100_500,
                    "photo": "https://img.example/poster.jpg",
                    "caption": "caption",
                    "parse_mode": "Markdown"
                }));
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 8}}));
        });

        api_for(&server)?
            .send_image(DESTINATION, "https://img.example/poster.jpg", "caption", &[])
            .await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn throttling_surfaces_retry_after() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendMessage"));
            then.status(429).json_body(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 17",
                "parameters": {"retry_after": 17}
            }));
        });

        let err = api_for(&server)?
            .send_text(DESTINATION, "text", &[])
            .await
            .expect_err("throttled");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(17)));
        assert_eq!(err.operation(), "send_text");
        Ok(())
    }

    #[tokio::test]
    async fn missing_rights_surface_permission_denied() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/sendPhoto"));
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: not enough rights to send photos to the chat"
            }));
        });

        let err = api_for(&server)?
            .send_image(DESTINATION, "https://img.example/p.jpg", "caption", &[])
            .await
            .expect_err("denied");
        assert!(
            matches!(err, TransportError::PermissionDenied { channel, .. } if channel == DESTINATION)
        );
        Ok(())
    }

    #[tokio::test]
    async fn other_failures_are_rejections() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(format!("/bot{TOKEN}/deleteMessage"));
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to delete not found"
            }));
        });

        let err = api_for(&server)?
            .delete_message(MessageRef::new(DESTINATION, 9))
            .await
            .expect_err("rejected");
        assert!(matches!(
            err,
            TransportError::Rejected { operation: "delete_message", code: 400, .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn delete_message_accepts_true_result() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/bot{TOKEN}/deleteMessage"))
                .json_body(json!({"chat_id": -100_500, "message_id": 9}));
            then.status(200).json_body(json!({"ok": true, "result": true}));
        });

        api_for(&server)?
            .delete_message(MessageRef::new(DESTINATION, 9))
            .await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn request_errors_do_not_leak_the_token() -> anyhow::Result<()> {
        let api = BotApi::with_timeout("http://127.0.0.1:1", TOKEN, Duration::from_secs(2))?;
        let err = api
            .send_text(DESTINATION, "text", &[])
            .await
            .expect_err("connection refused");
        assert!(matches!(err, TransportError::Request { .. }));
        assert!(!format!("{err:?}").contains("secret-token"));
        assert!(!format!("{api:?}").contains("secret-token"));
        Ok(())
    }
}
