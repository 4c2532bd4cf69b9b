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

//! Binary entrypoint that wires the reelcast services together and runs the
//! relay until interrupted.

use reelcast_app::{AppResult, run_app};

/// Bootstraps the relay and blocks until shutdown completes.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
