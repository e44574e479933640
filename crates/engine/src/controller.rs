//! DeltaFetchController: batched delta fetching with a single in-flight slot
//!
//! ## State machine
//!
//! `Idle -> Loading -> {Idle, Error}`; `Error -> Loading` on retry or on
//! the next emission. At most one detail fetch is in flight at a time,
//! enforced by the in-flight slot.
//!
//! ## Supersede, not cancel
//!
//! An emission arriving while `Loading` does not cancel the in-flight
//! request — its result is still a valid merge. Instead a pending marker
//! is set, and once the in-flight fetch resolves the latest key
//! sequence's delta is recomputed and a new fetch issued only if that
//! delta is non-empty. This prevents duplicate concurrent requests for
//! overlapping keys without losing keys that appeared mid-flight.
//!
//! ## Failure discipline
//!
//! A failed batch merges nothing. The attempted keys are marked failed in
//! the cache (status only), the controller enters `Error`, and because
//! failed keys stay out of `known_keys()` a retry recomputes exactly the
//! same delta.

use tracing::{debug, warn};
use trellis_core::{
    DetailRecord, DetailService, Error, FetchRequest, MasterKey, RequestId, Transport, Value,
};

use crate::cache::DetailCache;
use crate::delta::key_delta;

/// Controller fetch state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState {
    /// No fetch in flight, no surfaced error
    #[default]
    Idle,
    /// A delta batch fetch is in flight
    Loading,
    /// The most recent fetch failed; retryable
    Error(Error),
}

#[derive(Debug)]
struct InFlight {
    request: RequestId,
    keys: Vec<MasterKey>,
}

/// Outcome of routing a fetch completion through the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Entries were merged into the cache
    Merged,
    /// The fetch failed; error state surfaced
    Failed,
    /// The completion did not belong to the in-flight request
    Ignored,
}

/// Orchestrates delta computation and batched detail fetching
#[derive(Debug, Default)]
pub struct DeltaFetchController {
    state: FetchState,
    in_flight: Option<InFlight>,
    /// Set when an emission arrives mid-flight; the delta is recomputed
    /// against the latest keys after the in-flight fetch resolves
    pending: bool,
}

impl DeltaFetchController {
    /// Create an idle controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Current fetch state
    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// Surfaced error, if in the error state
    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            FetchState::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Id of the in-flight request, if any
    pub fn in_flight_request(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|f| f.request)
    }

    /// Clear a surfaced error ahead of a retry
    pub fn clear_error(&mut self) {
        if matches!(self.state, FetchState::Error(_)) {
            self.state = FetchState::Idle;
        }
    }

    /// Drop all in-flight bookkeeping.
    ///
    /// Used when the master source binding changes; a completion for a
    /// dropped request no longer matches and is ignored.
    pub fn reset(&mut self) {
        self.state = FetchState::Idle;
        self.in_flight = None;
        self.pending = false;
    }

    /// React to a master key emission: compute the delta and fetch it.
    ///
    /// With a fetch already in flight this only records the pending
    /// marker; the caller's latest key sequence is re-examined when the
    /// in-flight fetch resolves.
    pub fn sync(
        &mut self,
        current_keys: &[MasterKey],
        cache: &mut DetailCache,
        service: &DetailService,
        transport: &mut dyn Transport,
    ) {
        if self.in_flight.is_some() {
            debug!("emission while loading; deferring delta to in-flight completion");
            self.pending = true;
            return;
        }

        let delta = key_delta(&cache.known_keys(), current_keys);
        if delta.is_empty() {
            self.state = FetchState::Idle;
            return;
        }

        self.issue(delta, service, transport);
    }

    /// Route a fetch completion.
    ///
    /// `current_keys` is the latest emitted key sequence, used to chain a
    /// superseding fetch after this one settles.
    pub fn on_resolved(
        &mut self,
        request: RequestId,
        result: Result<&Value, &str>,
        current_keys: &[MasterKey],
        cache: &mut DetailCache,
        service: &DetailService,
        transport: &mut dyn Transport,
    ) -> ResolveOutcome {
        let belongs = self
            .in_flight
            .as_ref()
            .map(|f| f.request == request)
            .unwrap_or(false);
        if !belongs {
            debug!(?request, "ignoring completion for unknown request");
            return ResolveOutcome::Ignored;
        }
        let in_flight = match self.in_flight.take() {
            Some(in_flight) => in_flight,
            None => return ResolveOutcome::Ignored,
        };

        let outcome = match result {
            Ok(response) => match extract_detail_entries(service, response) {
                Ok(entries) => {
                    cache.merge(entries);
                    self.state = FetchState::Idle;
                    ResolveOutcome::Merged
                }
                Err(err) => self.fail(in_flight.keys, err, cache),
            },
            Err(message) => self.fail(
                in_flight.keys,
                Error::DetailFetch(message.to_string()),
                cache,
            ),
        };

        // Chain the superseding emission now that the slot is free
        if self.pending {
            self.pending = false;
            if outcome == ResolveOutcome::Merged {
                self.sync(current_keys, cache, service, transport);
            }
        }

        outcome
    }

    fn issue(&mut self, delta: Vec<MasterKey>, service: &DetailService, transport: &mut dyn Transport) {
        debug!(keys = delta.len(), "issuing batched detail fetch");
        let payload = Value::Object(
            [(
                service.key_param.clone(),
                Value::Array(delta.iter().map(key_to_value).collect()),
            )]
            .into_iter()
            .collect(),
        );
        let request = transport.send(FetchRequest {
            endpoint: service.endpoint.clone(),
            method: service.method,
            payload: Some(payload),
        });
        self.in_flight = Some(InFlight {
            request,
            keys: delta,
        });
        self.state = FetchState::Loading;
    }

    fn fail(&mut self, keys: Vec<MasterKey>, error: Error, cache: &mut DetailCache) -> ResolveOutcome {
        warn!(%error, keys = keys.len(), "detail fetch failed; no partial merge");
        cache.mark_failed(&keys, &error.to_string());
        self.state = FetchState::Error(error);
        ResolveOutcome::Failed
    }
}

fn key_to_value(key: &MasterKey) -> Value {
    match key {
        MasterKey::Int(i) => Value::Int(*i),
        MasterKey::Str(s) => Value::String(s.clone()),
    }
}

/// Extract `(key, rows)` entries from a detail fetch response.
///
/// The response must be an array of records. Each record contributes its
/// `values_field` object as the detail payload, keyed by the payload's
/// `key_field`. When a `detail_rows_field` is configured the child rows
/// come from that array; otherwise the payload object itself is the
/// single detail row. Records without a usable payload or key are
/// skipped with a warning — a malformed response as a whole is an error
/// so nothing merges from it.
pub fn extract_detail_entries(
    service: &DetailService,
    response: &Value,
) -> Result<Vec<(MasterKey, Vec<DetailRecord>)>, Error> {
    let records = response.as_array().ok_or_else(|| {
        Error::DetailFetch(format!(
            "detail response is {}, expected array",
            response.type_name()
        ))
    })?;

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let values = match record.field(&service.values_field) {
            Some(values) if values.is_object() => values,
            _ => {
                warn!(
                    values_field = service.values_field.as_str(),
                    "skipping detail record without payload object"
                );
                continue;
            }
        };
        let key = match values.field(&service.key_field).and_then(MasterKey::from_value) {
            Some(key) => key,
            None => {
                warn!(
                    key_field = service.key_field.as_str(),
                    "skipping detail record without usable master key"
                );
                continue;
            }
        };

        let rows = match &service.detail_rows_field {
            Some(rows_field) => values
                .field(rows_field)
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| row.as_object())
                        .map(|fields| DetailRecord::new(fields.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            None => values
                .as_object()
                .map(|fields| vec![DetailRecord::new(fields.clone())])
                .unwrap_or_default(),
        };

        entries.push((key, rows));
    }
    Ok(entries)
}
