#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! HTTPS JSON adapter for the messaging platform's Bot API.
//!
//! Layout: `wire.rs` (request and response shapes, error classification),
//! `client.rs` ([`BotApi`], the [`RemoteTransport`](reelcast_core::RemoteTransport)
//! implementation), `poller.rs` (long-polled channel posts).

pub mod client;
pub mod poller;
mod wire;

pub use client::BotApi;
pub use poller::UpdatePoller;
