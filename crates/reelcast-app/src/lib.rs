#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Reelcast application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and shutdown), `polling.rs`
//! (channel posts into the pipeline intake), `error.rs` (application errors).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level error type.
pub mod error;
/// Update polling loop.
pub mod polling;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
