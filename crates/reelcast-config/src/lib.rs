#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Typed relay settings loaded from the process environment.
//! Layout: `model.rs` (settings structs), `defaults.rs` (variable names and
//! fallbacks), `validate.rs` (value parsing), `loader.rs` (environment lookup).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_env, load_with};
pub use model::{PipelineConfig, RelayConfig, TelegramConfig};
