//! Collaborator traits
//!
//! The engine observes two external collaborators through narrow
//! contracts: the reactive form field store and the transport client.
//! Both are driven by the host's event loop — the engine never blocks on
//! either. A transport request is issued non-blockingly and its outcome
//! arrives later as a completion event, which keeps the engine testable
//! with controllable fakes.

use crate::config::HttpMethod;
use crate::value::Value;

/// Identity of one issued transport request.
///
/// Completions are matched back to their request by id; completions for
/// unknown or superseded ids are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// One outgoing request against a configured endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Target endpoint
    pub endpoint: String,
    /// Request method
    pub method: HttpMethod,
    /// Optional payload; for GET transports this travels as query
    /// parameters, for POST as the body
    pub payload: Option<Value>,
}

/// Opaque request/response transport.
///
/// `send` must not block: it issues the request and returns immediately.
/// The host delivers the outcome to the owning table via its
/// fetch-resolved event handler, as `Ok(response)` or `Err(message)`.
pub trait Transport {
    /// Issue a request and return its id
    fn send(&mut self, request: FetchRequest) -> RequestId;
}

/// Narrow view of the reactive form field store.
///
/// Change notifications are delivered by the host as field-change events;
/// this trait only exposes synchronous reads of the current value, used
/// for the initial replay and for debounced recomputation.
pub trait FieldStore {
    /// Current value of a named field, if present
    fn value_of(&self, field: &str) -> Option<Value>;
}
