//! Core types and traits for Trellis
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: Unified value enum for all cell data
//! - MasterKey / MasterRecord / DetailRecord: the master-detail data model
//! - TreePath / TreeNode: flattened tree representation
//! - TableConfig: typed configuration with fail-fast validation
//! - Error: error type hierarchy
//! - Traits: collaborator contracts (FieldStore, Transport)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod value;

// Re-export commonly used types and traits
pub use config::{
    ApiSource, DetailService, Filter, FilterOp, FormSource, HttpMethod, MasterSource, TableConfig,
    DEFAULT_DEBOUNCE_MS,
};
pub use error::{Error, Result};
pub use traits::{FetchRequest, FieldStore, RequestId, Transport};
pub use types::{DetailRecord, MasterKey, MasterRecord, PathSegment, TreeNode, TreePath};
pub use value::Value;
