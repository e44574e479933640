//! ExpandableTable: the master-detail control instance
//!
//! Ties one configuration to one source, cache, and controller, and
//! exposes the event handlers the host's event loop drives:
//!
//! - `on_field_change`: reactive input arrived; arms the debounce timer
//! - `on_timer`: debounce quiescence; recompute master rows
//! - `on_fetch_resolved`: a transport request settled
//! - `retry` / `rebind` / `dispose`: lifecycle entry points
//!
//! Master rows render immediately on every emission; details fill in
//! asynchronously as the controller merges fetched batches. After each
//! successful merge the registered change listener receives an immutable
//! cache snapshot — the outward value-changed signal.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};
use trellis_core::{
    DetailRecord, Error, FetchRequest, FieldStore, MasterKey, MasterRecord, MasterSource,
    RequestId, Result, TableConfig, Transport, TreeNode, Value,
};

use crate::cache::{CacheSnapshot, DetailCache, FetchStatus};
use crate::controller::{DeltaFetchController, FetchState, ResolveOutcome};
use crate::flatten::flatten;
use crate::runtime::{Runtime, TimerId};
use crate::source::{parse_api_response, project_form_rows, project_keys, MasterRowSource};

/// Listener receiving the cache snapshot after each successful merge
pub type ChangeListener = Box<dyn FnMut(&CacheSnapshot)>;

/// Coarse table state for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Nothing in flight, no error
    Idle,
    /// A master load or detail fetch is in flight
    Loading,
    /// A load failed; the error slot holds the cause
    Error,
}

enum BindAction {
    None,
    ReplayField,
    FetchMasters,
}

/// One master-detail table instance
pub struct ExpandableTable<T: Transport, F: FieldStore> {
    config: TableConfig,
    source: MasterRowSource,
    cache: DetailCache,
    controller: DeltaFetchController,
    transport: T,
    fields: F,
    masters: Vec<MasterRecord>,
    master_keys: Vec<MasterKey>,
    source_error: Option<Error>,
    last_snapshot: Option<CacheSnapshot>,
    on_change: Option<ChangeListener>,
    disposed: bool,
}

impl<T: Transport, F: FieldStore> ExpandableTable<T, F> {
    /// Create a table instance.
    ///
    /// Fails fast on invalid configuration; load failures at runtime are
    /// surfaced through the error slot instead.
    pub fn new(config: TableConfig, transport: T, fields: F) -> Result<Self> {
        config.validate()?;
        let source = MasterRowSource::new(&config.master_source);
        Ok(Self {
            config,
            source,
            cache: DetailCache::new(),
            controller: DeltaFetchController::new(),
            transport,
            fields,
            masters: Vec::new(),
            master_keys: Vec::new(),
            source_error: None,
            last_snapshot: None,
            on_change: None,
            disposed: false,
        })
    }

    /// Register the outward value-changed listener
    pub fn set_on_change(&mut self, listener: ChangeListener) {
        self.on_change = Some(listener);
    }

    /// Start loading master rows from the configured source.
    ///
    /// The reactive variant replays the field's current value
    /// synchronously at most once so the first render is not deferred
    /// behind the debounce; the one-shot variant issues its master fetch.
    pub fn bind(&mut self) {
        if self.disposed {
            return;
        }
        let action = match &mut self.source {
            MasterRowSource::Form(form) => {
                if form.config.replay_current && !form.replayed {
                    form.replayed = true;
                    BindAction::ReplayField
                } else {
                    BindAction::None
                }
            }
            MasterRowSource::Api(_) => BindAction::FetchMasters,
        };
        match action {
            BindAction::ReplayField => self.refresh_from_field(),
            BindAction::FetchMasters => self.issue_master_fetch(),
            BindAction::None => {}
        }
    }

    /// The observed form field changed.
    ///
    /// The engine re-reads the current value at quiescence, so this is a
    /// pure notification; a burst of changes collapses into one timer.
    pub fn on_field_change(&mut self, rt: &mut Runtime) {
        if self.disposed {
            return;
        }
        match &mut self.source {
            MasterRowSource::Form(form) => {
                if let Some(timer) = form.debounce_timer.take() {
                    rt.cancel_timer(timer);
                }
                form.debounce_timer = Some(rt.set_timer(form.config.debounce_ms));
            }
            MasterRowSource::Api(_) => {
                debug!("field change ignored for one-shot master source");
            }
        }
    }

    /// A timer fired.
    ///
    /// Only the armed debounce timer is meaningful; stale ids are
    /// ignored.
    pub fn on_timer(&mut self, timer: TimerId) {
        if self.disposed {
            return;
        }
        let fired = match &mut self.source {
            MasterRowSource::Form(form) if form.debounce_timer == Some(timer) => {
                form.debounce_timer = None;
                true
            }
            _ => false,
        };
        if fired {
            self.refresh_from_field();
        }
    }

    /// A transport request settled.
    ///
    /// Routed to the master load (one-shot variant) or the detail fetch
    /// controller. Completions after dispose or for unknown ids are
    /// suppressed, never an error.
    pub fn on_fetch_resolved(&mut self, request: RequestId, result: std::result::Result<&Value, &str>) {
        if self.disposed {
            debug!(?request, "completion after dispose suppressed");
            return;
        }

        let is_master_load = matches!(
            &self.source,
            MasterRowSource::Api(api) if api.in_flight == Some(request)
        );
        if is_master_load {
            if let MasterRowSource::Api(api) = &mut self.source {
                api.in_flight = None;
            }
            self.finish_master_load(result);
            return;
        }

        let outcome = self.controller.on_resolved(
            request,
            result,
            &self.master_keys,
            &mut self.cache,
            &self.config.detail_service,
            &mut self.transport,
        );
        if outcome == ResolveOutcome::Merged {
            self.emit_snapshot();
        }
    }

    /// Clear any error state and re-trigger master-row loading from the
    /// currently configured source.
    pub fn retry(&mut self) {
        if self.disposed {
            return;
        }
        self.source_error = None;
        self.controller.clear_error();
        match &self.source {
            MasterRowSource::Form(_) => self.refresh_from_field(),
            MasterRowSource::Api(_) => self.issue_master_fetch(),
        }
    }

    /// Switch the master source binding.
    ///
    /// The cache is reset first so stale details from the previous
    /// binding are never shown against the new master rows; a completion
    /// of any in-flight fetch from the old binding no longer matches and
    /// is ignored.
    pub fn rebind(&mut self, rt: &mut Runtime, new_source: MasterSource) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        let mut new_config = self.config.clone();
        new_config.master_source = new_source;
        new_config.validate()?;

        if let MasterRowSource::Form(form) = &mut self.source {
            if let Some(timer) = form.debounce_timer.take() {
                rt.cancel_timer(timer);
            }
        }
        self.cache.reset();
        self.controller.reset();
        self.masters.clear();
        self.master_keys.clear();
        self.source_error = None;
        self.last_snapshot = None;
        self.source = MasterRowSource::new(&new_config.master_source);
        self.config = new_config;
        self.bind();
        Ok(())
    }

    /// Unsubscribe and suppress all further event handling
    pub fn dispose(&mut self, rt: &mut Runtime) {
        if let MasterRowSource::Form(form) = &mut self.source {
            if let Some(timer) = form.debounce_timer.take() {
                rt.cancel_timer(timer);
            }
        }
        self.disposed = true;
    }

    // ---- read surface -------------------------------------------------

    /// Current master rows, in emission order
    pub fn master_rows(&self) -> &[MasterRecord] {
        &self.masters
    }

    /// Cached detail rows for one master key
    pub fn detail_lookup(&self, key: &MasterKey) -> Option<&[DetailRecord]> {
        self.cache.get(key)
    }

    /// Fetch status of one master key
    pub fn detail_status(&self, key: &MasterKey) -> FetchStatus {
        self.cache.status(key)
    }

    /// Flattened tree representation of the current rows
    pub fn flatten_tree(&self) -> Vec<TreeNode> {
        flatten(&self.masters, &self.cache)
    }

    /// Coarse state for the presentation layer
    pub fn state(&self) -> TableState {
        if self.error().is_some() {
            TableState::Error
        } else if matches!(self.controller.state(), FetchState::Loading)
            || matches!(&self.source, MasterRowSource::Api(api) if api.in_flight.is_some())
        {
            TableState::Loading
        } else {
            TableState::Idle
        }
    }

    /// Surfaced error, if any
    pub fn error(&self) -> Option<&Error> {
        self.source_error.as_ref().or_else(|| self.controller.error())
    }

    /// Whether the surfaced error, if any, may be cleared by `retry`.
    ///
    /// Load failures are retryable; this is what gates the presentation
    /// layer's retry affordance.
    pub fn can_retry(&self) -> bool {
        self.error().map_or(false, Error::is_retryable)
    }

    /// Snapshot emitted by the most recent successful merge
    pub fn last_snapshot(&self) -> Option<&CacheSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Renderer hint: expand when the configuration asks for it and
    /// exactly one master row exists
    pub fn expand_single_row(&self) -> bool {
        self.config.expand_single_row && self.masters.len() == 1
    }

    /// Whether this table was disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The owned transport collaborator.
    ///
    /// Hosts resolve completions against the ids it issued; tests
    /// inspect the captured requests of a fake.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The owned field store collaborator
    pub fn fields(&self) -> &F {
        &self.fields
    }

    /// Mutable access to the field store collaborator
    pub fn fields_mut(&mut self) -> &mut F {
        &mut self.fields
    }

    // ---- internals ----------------------------------------------------

    fn refresh_from_field(&mut self) {
        let field_name = match &self.source {
            MasterRowSource::Form(form) => form.config.field_name.clone(),
            MasterRowSource::Api(_) => return,
        };
        let raw = self.fields.value_of(&field_name);
        let masters = match &self.source {
            MasterRowSource::Form(form) => project_form_rows(
                &form.config,
                &self.config.detail_service.key_field,
                raw.as_ref(),
            ),
            MasterRowSource::Api(_) => return,
        };
        self.apply_masters(masters);
    }

    fn issue_master_fetch(&mut self) {
        let request = match &self.source {
            MasterRowSource::Api(api) => FetchRequest {
                endpoint: api.config.endpoint.clone(),
                method: api.config.method,
                payload: None,
            },
            MasterRowSource::Form(_) => return,
        };
        self.source_error = None;
        let id = self.transport.send(request);
        debug!(?id, "issued one-shot master load");
        if let MasterRowSource::Api(api) = &mut self.source {
            api.in_flight = Some(id);
        }
    }

    fn finish_master_load(&mut self, result: std::result::Result<&Value, &str>) {
        let parsed = match result {
            Ok(response) => match &self.source {
                MasterRowSource::Api(api) => parse_api_response(&api.config, response),
                MasterRowSource::Form(_) => return,
            },
            Err(message) => Err(Error::SourceLoad(message.to_string())),
        };
        match parsed {
            Ok(masters) => self.apply_masters(masters),
            Err(err) => {
                warn!(%err, "master load failed");
                self.source_error = Some(err);
            }
        }
    }

    /// Record an emission and run the delta algorithm against it.
    ///
    /// Master rows are replaced wholesale; rendering reads them
    /// immediately regardless of cache state. Rows sharing a key within
    /// one emission collapse to the first occurrence, keeping flattened
    /// paths unique.
    fn apply_masters(&mut self, masters: Vec<MasterRecord>) {
        let mut seen: FxHashSet<MasterKey> = FxHashSet::default();
        let masters: Vec<MasterRecord> = masters
            .into_iter()
            .filter(|m| seen.insert(m.key.clone()))
            .collect();
        self.master_keys = project_keys(&masters);
        self.masters = masters;
        self.source_error = None;
        self.controller.sync(
            &self.master_keys,
            &mut self.cache,
            &self.config.detail_service,
            &mut self.transport,
        );
    }

    fn emit_snapshot(&mut self) {
        let snapshot = self.cache.snapshot();
        if let Some(listener) = &mut self.on_change {
            listener(&snapshot);
        }
        self.last_snapshot = Some(snapshot);
    }
}
