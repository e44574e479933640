//! MasterRowSource: where master rows come from
//!
//! Two variants, one per configuration branch:
//!
//! - **Form**: watches a named field in the reactive form store. Raw
//!   emissions are filtered, projected into master records, and debounced
//!   by a quiescence window so a burst of user edits collapses into one
//!   downstream recomputation. The field's current value is replayed
//!   synchronously at most once on bind.
//! - **Api**: issues a single request against a configured endpoint and
//!   emits exactly once on success; a failure signals a source-load error
//!   with no emission.
//!
//! Both variants produce ordered `Vec<MasterRecord>`; downstream delta
//! logic only ever sees projected key sequences, keeping it decoupled
//! from record shape.

use tracing::warn;
use trellis_core::{
    ApiSource, Error, FormSource, MasterKey, MasterRecord, RequestId, Value,
};

use crate::runtime::TimerId;

/// Runtime state of the master row source
#[derive(Debug)]
pub enum MasterRowSource {
    /// Reactive variant observing a form field
    Form(FormState),
    /// One-shot variant fetching from a remote endpoint
    Api(ApiState),
}

/// State of the reactive variant
#[derive(Debug)]
pub struct FormState {
    /// Source configuration
    pub config: FormSource,
    /// Armed debounce timer, if a burst is in progress
    pub debounce_timer: Option<TimerId>,
    /// Whether the synchronous bind-time replay already happened
    pub replayed: bool,
}

/// State of the one-shot variant
#[derive(Debug)]
pub struct ApiState {
    /// Source configuration
    pub config: ApiSource,
    /// Outstanding master-load request, if any
    pub in_flight: Option<RequestId>,
}

impl MasterRowSource {
    /// Build source state from configuration
    pub fn new(config: &trellis_core::MasterSource) -> Self {
        match config {
            trellis_core::MasterSource::Form(form) => MasterRowSource::Form(FormState {
                config: form.clone(),
                debounce_timer: None,
                replayed: false,
            }),
            trellis_core::MasterSource::Api(api) => MasterRowSource::Api(ApiState {
                config: api.clone(),
                in_flight: None,
            }),
        }
    }
}

/// Project a raw form field value into master records.
///
/// Non-array and absent values behave as an empty row set. Rows that are
/// not objects or lack a usable key are skipped. The optional filter
/// applies before projection.
pub fn project_form_rows(
    config: &FormSource,
    key_field: &str,
    raw: Option<&Value>,
) -> Vec<MasterRecord> {
    let rows = match raw.and_then(|v| v.as_array()) {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = match row.as_object() {
            Some(fields) => fields,
            None => {
                warn!(value = row.type_name(), "skipping non-object form row");
                continue;
            }
        };
        if let Some(filter) = &config.filter {
            if !filter.matches(fields) {
                continue;
            }
        }
        match fields.get(key_field).and_then(MasterKey::from_value) {
            Some(key) => records.push(MasterRecord::new(key, fields.clone())),
            None => warn!(key_field, "skipping form row without usable master key"),
        }
    }
    records
}

/// Extract master records from a one-shot source response.
///
/// The records field is read from the response object; a missing field
/// behaves as an empty record set, but a response that is not an object
/// at all is a load error.
pub fn parse_api_response(config: &ApiSource, response: &Value) -> Result<Vec<MasterRecord>, Error> {
    if !response.is_object() {
        return Err(Error::SourceLoad(format!(
            "master response is {}, expected object",
            response.type_name()
        )));
    }

    let records = match response.field(&config.records_field).and_then(Value::as_array) {
        Some(records) => records,
        None => return Ok(Vec::new()),
    };

    let mut masters = Vec::with_capacity(records.len());
    for record in records {
        let fields = match record.as_object() {
            Some(fields) => fields,
            None => {
                warn!("skipping non-object master record");
                continue;
            }
        };
        match fields.get(&config.key_field).and_then(MasterKey::from_value) {
            Some(key) => masters.push(MasterRecord::new(key, fields.clone())),
            None => warn!(
                key_field = config.key_field.as_str(),
                "skipping master record without usable key"
            ),
        }
    }
    Ok(masters)
}

/// Project the ordered key sequence out of master records
pub fn project_keys(masters: &[MasterRecord]) -> Vec<MasterKey> {
    masters.iter().map(|m| m.key.clone()).collect()
}
