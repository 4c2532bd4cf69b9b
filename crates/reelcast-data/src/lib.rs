#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Postgres persistence for reelcast: migrations, owner settings, and archived file records.

pub mod error;
pub mod store;

pub use error::{DataError, Result as DataResult};
pub use store::{PgStore, StoredFile, raw_link};
