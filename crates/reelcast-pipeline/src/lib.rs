#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Release relay pipeline: intake, archiving, fuzzy batching, and throttled publishing.
//!
//! Data flows one way: [`Intake`] → [`IngestQueue`] → [`IngestWorker`] →
//! [`BatchAggregator`] → sweeper → [`BatchFinalizer`] → remote transport.
//! [`Relay`] wires the background tasks together and owns their shutdown.

pub mod aggregator;
pub mod compose;
pub mod error;
pub mod finalizer;
pub mod ingest;
pub mod normalize;
pub mod notice;
pub mod relay;
pub mod similarity;
pub mod throttle;

pub use aggregator::{Admission, BatchAggregator, BatchSummary, OpenBatch};
pub use compose::ReleaseComposer;
pub use error::{PipelineError, PipelineResult};
pub use finalizer::{BatchFinalizer, FinalizeReport};
pub use ingest::{DrainSummary, IngestQueue, IngestWorker, Intake};
pub use normalize::{file_label, normalize};
pub use notice::NoticeBoard;
pub use relay::{Relay, RelayDependencies};
pub use similarity::similarity;
pub use throttle::FloodGuard;
