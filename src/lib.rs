//! Trellis - master-detail synchronization and incremental cache engine
//!
//! Trellis keeps a hierarchical grid consistent with a continuously
//! changing master row set: it observes the master keys, fetches detail
//! records only for the keys that are new, merges them into a durable
//! per-key cache, and exposes either a key lookup (master/detail mode)
//! or a flattened, path-addressed node sequence (tree mode).
//!
//! # Quick Start
//!
//! ```ignore
//! use trellis::{ExpandableTable, Runtime, TableConfig};
//!
//! let config = TableConfig::from_json(schema_json)?;
//! let mut rt = Runtime::new();
//! let mut table = ExpandableTable::new(config, transport, fields)?;
//!
//! table.bind();
//!
//! // Host event loop: deliver field changes, timers, and completions
//! table.on_field_change(&mut rt);
//! rt.advance(300);
//! while let Some(timer) = rt.pop_due() {
//!     table.on_timer(timer);
//! }
//! ```
//!
//! # Architecture
//!
//! Foundational types live in `trellis-core`; the data-logic engine
//! (delta computation, detail cache, fetch controller, tree flattener,
//! logical runtime) lives in `trellis-engine`. The rendering surface,
//! configuration schema loader, form field store, and transport client
//! are external collaborators reached through narrow traits.

// Re-export the public API from the core and engine crates
pub use trellis_core::*;
pub use trellis_engine::{
    flatten, key_delta, CacheSnapshot, ChangeListener, DeltaFetchController, DetailCache,
    ExpandableTable, FetchState, FetchStatus, MasterRowSource, ResolveOutcome, Runtime, TableState,
    TimerId,
};

/// Test doubles for the collaborator traits, re-exported for hosts that
/// want to drive a table deterministically
pub mod testkit {
    pub use trellis_engine::testkit::{FakeFieldStore, FakeTransport};
}
