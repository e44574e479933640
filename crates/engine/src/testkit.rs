//! Controllable test doubles for the collaborator traits
//!
//! Fetch completions are host-delivered events, so a test (or an example
//! host) fully controls when and how a request resolves: issue events
//! into the table, inspect what the fake transport captured, then feed
//! the completion back through `on_fetch_resolved`.

use std::collections::HashMap;
use trellis_core::{FetchRequest, FieldStore, RequestId, Transport, Value};

/// Transport double that records every issued request.
///
/// Requests never resolve on their own; tests pick a captured id and
/// deliver the completion themselves.
#[derive(Debug, Default)]
pub struct FakeTransport {
    next_id: u64,
    /// Every issued request, in issue order
    pub sent: Vec<(RequestId, FetchRequest)>,
}

impl FakeTransport {
    /// Create an empty fake transport
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently issued request
    pub fn last(&self) -> Option<&(RequestId, FetchRequest)> {
        self.sent.last()
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, request: FetchRequest) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.sent.push((id, request));
        id
    }
}

/// In-memory field store double
#[derive(Debug, Default)]
pub struct FakeFieldStore {
    values: HashMap<String, Value>,
}

impl FakeFieldStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field's current value
    pub fn set(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }

    /// Remove a field
    pub fn clear(&mut self, field: &str) {
        self.values.remove(field);
    }
}

impl FieldStore for FakeFieldStore {
    fn value_of(&self, field: &str) -> Option<Value> {
        self.values.get(field).cloned()
    }
}
