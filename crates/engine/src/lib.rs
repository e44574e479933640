//! Master-detail synchronization engine for Trellis
//!
//! This crate holds the data logic behind a hierarchical grid control:
//! - delta: which master keys are new since the last cached state
//! - cache: per-key detail rows with explicit fetch status
//! - source: where master rows come from (reactive field or one-shot fetch)
//! - controller: batched delta fetching with a single in-flight slot
//! - flatten: deterministic tree flattening with path addressing
//! - runtime: logical clock and timer queue for the cooperative model
//! - table: the control instance tying it all together
//!
//! The engine is single-threaded and event-driven: the host delivers
//! field-change, timer, and fetch-completion events; the engine never
//! blocks and never spawns.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod controller;
pub mod delta;
pub mod flatten;
pub mod runtime;
pub mod source;
pub mod table;
pub mod testkit;

pub use cache::{CacheSnapshot, DetailCache, FetchStatus};
pub use controller::{DeltaFetchController, FetchState, ResolveOutcome};
pub use delta::key_delta;
pub use flatten::flatten;
pub use runtime::{Runtime, TimerId};
pub use source::MasterRowSource;
pub use table::{ChangeListener, ExpandableTable, TableState};
