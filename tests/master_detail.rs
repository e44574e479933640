//! Master/detail mode integration scenarios
//!
//! Drives a whole table instance through its event handlers with a fake
//! transport and field store, verifying the delta/cache/controller
//! behavior end to end: initial load, incremental deltas, failure
//! without partial merge, and retry.

use rustc_hash::FxHashSet;
use trellis::testkit::{FakeFieldStore, FakeTransport};
use trellis::{
    key_delta, DetailService, Error, ExpandableTable, FetchStatus, FormSource, HttpMethod,
    MasterKey, MasterSource, Runtime, TableConfig, TableState, Value, DEFAULT_DEBOUNCE_MS,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config() -> TableConfig {
    TableConfig {
        master_source: MasterSource::Form(FormSource {
            field_name: "accounts".to_string(),
            filter: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            replay_current: true,
        }),
        detail_service: DetailService {
            endpoint: "/api/details".to_string(),
            method: HttpMethod::Post,
            key_param: "ACCT_NUMBERS".to_string(),
            values_field: "values".to_string(),
            key_field: "ACCT_NUMBER".to_string(),
            detail_rows_field: None,
        },
        expand_single_row: false,
    }
}

fn accounts_value(keys: &[&str]) -> Value {
    Value::from_json(serde_json::Value::Array(
        keys.iter()
            .map(|k| serde_json::json!({ "ACCT_NUMBER": k }))
            .collect(),
    ))
}

fn detail_response(keys: &[&str]) -> Value {
    Value::from_json(serde_json::Value::Array(
        keys.iter()
            .map(|k| serde_json::json!({ "values": { "ACCT_NUMBER": k, "BALANCE": 100 } }))
            .collect(),
    ))
}

fn payload_keys(payload: &Value) -> Vec<String> {
    payload
        .field("ACCT_NUMBERS")
        .and_then(Value::as_array)
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn bound_table(keys: &[&str]) -> ExpandableTable<FakeTransport, FakeFieldStore> {
    let mut fields = FakeFieldStore::new();
    fields.set("accounts", accounts_value(keys));
    let mut table = ExpandableTable::new(config(), FakeTransport::new(), fields).unwrap();
    table.bind();
    table
}

fn settle_debounce(table: &mut ExpandableTable<FakeTransport, FakeFieldStore>, rt: &mut Runtime) {
    rt.advance(DEFAULT_DEBOUNCE_MS);
    while let Some(timer) = rt.pop_due() {
        table.on_timer(timer);
    }
}

/// Empty previous state, two new keys: one batched fetch, both cached.
#[test]
fn initial_load_fetches_all_keys_in_one_batch() {
    init_tracing();
    let mut table = bound_table(&["A101", "A102"]);

    assert_eq!(table.master_rows().len(), 2);
    assert_eq!(table.state(), TableState::Loading);
    assert_eq!(table.transport().sent.len(), 1);
    let (id, request) = table.transport().sent[0].clone();
    assert_eq!(payload_keys(request.payload.as_ref().unwrap()), vec!["A101", "A102"]);

    table.on_fetch_resolved(id, Ok(&detail_response(&["A101", "A102"])));

    assert_eq!(table.state(), TableState::Idle);
    assert!(table.detail_lookup(&MasterKey::from("A101")).is_some());
    assert!(table.detail_lookup(&MasterKey::from("A102")).is_some());
}

/// One key already cached, one new: the fetch payload carries only the
/// new key.
#[test]
fn incremental_emission_fetches_only_the_delta() {
    init_tracing();
    let mut table = bound_table(&["A101"]);
    let mut rt = Runtime::new();
    let (id, _) = table.transport().sent[0].clone();
    table.on_fetch_resolved(id, Ok(&detail_response(&["A101"])));

    table.fields_mut().set("accounts", accounts_value(&["A101", "A102"]));
    table.on_field_change(&mut rt);
    assert!(rt.has_pending_timers());
    settle_debounce(&mut table, &mut rt);
    assert!(!rt.has_pending_timers());

    assert_eq!(table.transport().sent.len(), 2);
    let (_, request) = table.transport().last().unwrap();
    assert_eq!(payload_keys(request.payload.as_ref().unwrap()), vec!["A102"]);
}

/// A failing delta fetch surfaces a retryable error, merges nothing, and
/// retry re-issues the same delta.
#[test]
fn failed_fetch_leaves_cache_clean_and_retry_reissues() {
    init_tracing();
    let mut table = bound_table(&["A101"]);
    let mut rt = Runtime::new();
    let (id, _) = table.transport().sent[0].clone();
    table.on_fetch_resolved(id, Ok(&detail_response(&["A101"])));

    table.fields_mut().set("accounts", accounts_value(&["A101", "A102"]));
    table.on_field_change(&mut rt);
    settle_debounce(&mut table, &mut rt);

    let (failing_id, _) = table.transport().sent[1].clone();
    table.on_fetch_resolved(failing_id, Err("HTTP 503"));

    assert_eq!(table.state(), TableState::Error);
    assert!(matches!(table.error(), Some(Error::DetailFetch(_))));
    assert!(table.can_retry());
    assert!(table.detail_lookup(&MasterKey::from("A102")).is_none());
    // Failed is distinguishable from never-tried
    assert_eq!(table.detail_status(&MasterKey::from("A102")), FetchStatus::Failed);
    assert_eq!(table.detail_status(&MasterKey::from("A999")), FetchStatus::Unfetched);

    table.retry();
    assert_eq!(table.state(), TableState::Loading);
    let (retry_id, request) = table.transport().sent[2].clone();
    assert_eq!(payload_keys(request.payload.as_ref().unwrap()), vec!["A102"]);

    table.on_fetch_resolved(retry_id, Ok(&detail_response(&["A102"])));
    assert_eq!(table.state(), TableState::Idle);
    assert!(table.detail_lookup(&MasterKey::from("A102")).is_some());
}

/// Two emissions before the first fetch resolves: only one request in
/// flight; the superseding delta is chained afterwards.
#[test]
fn overlapping_emissions_keep_one_fetch_in_flight() {
    init_tracing();
    let mut table = bound_table(&["A101"]);
    let mut rt = Runtime::new();

    table.fields_mut().set("accounts", accounts_value(&["A101", "A102"]));
    table.on_field_change(&mut rt);
    settle_debounce(&mut table, &mut rt);

    // First fetch (A101) still unresolved; only one request issued so far
    assert_eq!(table.transport().sent.len(), 1);

    let (first_id, _) = table.transport().sent[0].clone();
    table.on_fetch_resolved(first_id, Ok(&detail_response(&["A101"])));

    // The chained fetch carries the keys that appeared mid-flight
    assert_eq!(table.transport().sent.len(), 2);
    let (_, request) = &table.transport().sent[1];
    assert_eq!(payload_keys(request.payload.as_ref().unwrap()), vec!["A102"]);
}

/// The outward value-changed signal fires only after successful merges
/// and carries a detached snapshot.
#[test]
fn change_listener_fires_per_successful_merge() {
    init_tracing();
    let mut table = bound_table(&["A101"]);
    let mut rt = Runtime::new();
    let snapshots = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let probe = snapshots.clone();
    table.set_on_change(Box::new(move |snapshot| {
        probe.borrow_mut().push(snapshot.clone());
    }));

    let (id, _) = table.transport().sent[0].clone();
    table.on_fetch_resolved(id, Ok(&detail_response(&["A101"])));

    table.fields_mut().set("accounts", accounts_value(&["A101", "A102"]));
    table.on_field_change(&mut rt);
    settle_debounce(&mut table, &mut rt);
    let (id, _) = table.transport().sent[1].clone();
    table.on_fetch_resolved(id, Err("HTTP 503"));

    // One successful merge, one failure: exactly one snapshot
    let seen = snapshots.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 1);
    assert!(seen[0].get(&MasterKey::from("A101")).is_some());
}

/// EQUALS filter applies before rows become master records.
#[test]
fn filter_restricts_master_rows() {
    init_tracing();
    let mut filtered = config();
    filtered.master_source = MasterSource::Form(FormSource {
        field_name: "accounts".to_string(),
        filter: Some(trellis::Filter {
            field: "STATUS".to_string(),
            op: trellis::FilterOp::Equals,
            value: Value::String("ACTIVE".into()),
        }),
        debounce_ms: DEFAULT_DEBOUNCE_MS,
        replay_current: true,
    });

    let mut fields = FakeFieldStore::new();
    fields.set(
        "accounts",
        Value::from_json(serde_json::json!([
            { "ACCT_NUMBER": "A101", "STATUS": "ACTIVE" },
            { "ACCT_NUMBER": "A102", "STATUS": "CLOSED" }
        ])),
    );
    let mut table = ExpandableTable::new(filtered, FakeTransport::new(), fields).unwrap();
    table.bind();

    assert_eq!(table.master_rows().len(), 1);
    assert_eq!(table.master_rows()[0].key, MasterKey::from("A101"));
    let (_, request) = &table.transport().sent[0];
    assert_eq!(payload_keys(request.payload.as_ref().unwrap()), vec!["A101"]);
}

/// The standalone delta computation matches the documented contract on
/// the canonical example.
#[test]
fn delta_scenario_matches_contract() {
    let previous: FxHashSet<MasterKey> = [MasterKey::from("A101")].into_iter().collect();
    let current = vec![MasterKey::from("A101"), MasterKey::from("A102")];
    assert_eq!(key_delta(&previous, &current), vec![MasterKey::from("A102")]);
    assert_eq!(key_delta(&FxHashSet::default(), &current), current);
}
