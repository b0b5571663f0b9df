//! Turns archives of recorded chess games into per-position, per-move,
//! per-year statistics, then reshapes those into fixed-format numeric time
//! series emitted as supervised training documents.
//!
//! The pipeline runs in two stages over a directory of PGN archives (one
//! file per player/color slice):
//!
//! 1. **analyze** — each archive is replayed game by game; observations are
//!    accumulated into a position -> year -> move counter structure and
//!    written out as one JSON artifact per input file.
//! 2. **vectorize** — each artifact is normalized into per-move year
//!    series, densified over its active span, windowed against implausible
//!    date ranges, and emitted to a document store as either full series or
//!    leave-one-year-out supervised pairs.
//!
//! Files are independent units of work on a fixed-size worker pool; no
//! aggregate state crosses file boundaries.

pub mod aggregate;
pub mod document;
pub mod position;
pub mod processor;
pub mod replay;
pub mod series;
pub mod store;

pub use aggregate::{FileAggregate, MoveCell};
pub use document::{EmitMode, LabelKind, StatDocument};
pub use position::position_key;
pub use processor::{
    analyze_dir, run_pipeline, vectorize_dir, AnalyzeOptions, FileOutcome, FileStatus,
    InputCleanup, RunSummary, VectorizeOptions,
};
pub use replay::{replay_archive, ReplayStats, TrackedColor};
pub use series::{densify, densify_all, normalize, DensifiedSeries, DensifyOptions, MoveSeries};
pub use store::{DocumentStore, JsonlStore, MemoryStore};
