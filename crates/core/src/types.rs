//! Record and path types for the master-detail hierarchy
//!
//! This module defines:
//! - MasterKey: opaque scalar identity for one master entity
//! - MasterRecord: one top-level row, replaced wholesale per observation tick
//! - DetailRecord: one child row belonging to a master key
//! - PathSegment / TreePath: position of a node in the flattened tree
//! - TreeNode: one flattened row carrying its fields and path

use crate::value::Value;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Opaque, comparable identity naming one master entity.
///
/// Keys come out of untyped source rows, so both string and integer
/// identities occur in practice. Equality is by value and must be stable
/// across observation ticks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MasterKey {
    /// Integer identity
    Int(i64),
    /// String identity
    Str(String),
}

impl MasterKey {
    /// Extract a key from a cell value.
    ///
    /// Only scalar string/integer values qualify; anything else (null,
    /// float, composite) is not a usable identity and yields `None`.
    pub fn from_value(value: &Value) -> Option<MasterKey> {
        match value {
            Value::Int(i) => Some(MasterKey::Int(*i)),
            Value::String(s) => Some(MasterKey::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterKey::Int(i) => write!(f, "{}", i),
            MasterKey::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for MasterKey {
    fn from(i: i64) -> Self {
        MasterKey::Int(i)
    }
}

impl From<&str> for MasterKey {
    fn from(s: &str) -> Self {
        MasterKey::Str(s.to_string())
    }
}

impl From<String> for MasterKey {
    fn from(s: String) -> Self {
        MasterKey::Str(s)
    }
}

/// One master row: key plus the projected source fields.
///
/// Created per observation tick and replaced wholesale whenever the
/// source emits; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Identity of this master entity
    pub key: MasterKey,
    /// Projected field values for rendering
    pub fields: HashMap<String, Value>,
}

impl MasterRecord {
    /// Create a master record
    pub fn new(key: MasterKey, fields: HashMap<String, Value>) -> Self {
        Self { key, fields }
    }
}

/// One detail row belonging to a master key.
///
/// Owned exclusively by the detail cache once merged; a later fetch for
/// the same key overwrites the whole row set, it does not append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    /// Field values of this child row
    pub fields: HashMap<String, Value>,
}

impl DetailRecord {
    /// Create a detail record
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }
}

/// One segment of a tree path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// The owning master key (always the first segment)
    Key(MasterKey),
    /// Synthetic per-index segment for a detail row
    Detail(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Detail(i) => write!(f, "detail-{}", i),
        }
    }
}

/// Ordered key sequence locating a node from root to itself.
///
/// The first segment is always the owning master key; detail nodes append
/// one synthetic `detail-{index}` segment. Paths are short (depth 1 or 2
/// today), hence the inline storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreePath(SmallVec<[PathSegment; 2]>);

impl TreePath {
    /// Path of a master node: `[key]`
    pub fn master(key: MasterKey) -> Self {
        TreePath(SmallVec::from_iter([PathSegment::Key(key)]))
    }

    /// Path of a detail node: `[key, detail-{index}]`
    pub fn detail(key: MasterKey, index: usize) -> Self {
        TreePath(SmallVec::from_iter([
            PathSegment::Key(key),
            PathSegment::Detail(index),
        ]))
    }

    /// The segments from root to this node
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// The owning master key (first segment)
    pub fn master_key(&self) -> &MasterKey {
        match &self.0[0] {
            PathSegment::Key(k) => k,
            // Unreachable by construction: both constructors put a Key first
            PathSegment::Detail(_) => unreachable!("tree path must start with a master key"),
        }
    }

    /// Depth of this node (1 = master, 2 = detail)
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Render the path as display strings, e.g. `["A101", "detail-0"]`.
    ///
    /// This is the shape tree renderers consume as a data path.
    pub fn to_display_segments(&self) -> Vec<String> {
        self.0.iter().map(|s| s.to_string()).collect()
    }
}

/// One flattened tree row: fields plus the path that positions it.
///
/// No two nodes in one flattened output share an identical path.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Field values for this row
    pub fields: HashMap<String, Value>,
    /// Position of this row in the tree
    pub path: TreePath,
}
