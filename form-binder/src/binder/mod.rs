//! Binder: root coordinator of a bound value
//!
//! A [`Binder`] owns the current value, the default ("clean") snapshot and
//! the empty value of one model tree. It keeps a [`BinderNode`] state per
//! addressed position, runs validators through the validation ledger and
//! governs the submit protocol.
//!
//! All state lives behind one mutex that is never held across an `.await` or
//! while calling out to user code, so change callbacks and validators may
//! freely call back into the binder.

mod config;
mod node;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use futures::FutureExt;
use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

pub use config::*;
pub use node::*;

use crate::batch::Barrier;
use crate::batch::BatchWindow;
use crate::error::BinderError;
use crate::error::ValidationError;
use crate::error::ValueError;
use crate::ledger::NodeKey;
use crate::ledger::ValidationLedger;
use crate::model::Model;
use crate::model::ModelPath;
use crate::model::ModelRef;
use crate::server::EndpointError;
use crate::server::translate_rejection;
use crate::utils::lock;
use crate::validation::PendingValidation;
use crate::validation::Validator;
use crate::validation::ValidatorKey;

/// Unique identifier of a binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinderId(Uuid);

impl BinderId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BinderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-position state of a live node.
struct NodeState {
    model: ModelRef,
    generation: u64,
    visited: bool,
    results: IndexMap<ValidatorKey, ValueError>,
}

impl NodeState {
    fn new(model: ModelRef, generation: u64) -> Self {
        Self {
            model,
            generation,
            visited: false,
            results: IndexMap::new(),
        }
    }

    fn record(&mut self, key: ValidatorKey, error: Option<ValueError>) {
        match error {
            Some(error) => {
                self.results.insert(key, error);
            }
            None => {
                self.results.shift_remove(&key);
            }
        }
    }

    /// Errors in validator declaration order; validators the model does not
    /// declare come last, in the order they reported.
    fn errors(&self) -> Vec<ValueError> {
        let model = self.model.model();
        let mut errors: Vec<ValueError> = self.results.values().cloned().collect();
        errors.sort_by_key(|error| model.validator_position(&error.validator).unwrap_or(usize::MAX));
        errors
    }
}

struct BinderState {
    default_value: Value,
    value: Value,
    submitting: bool,
    validating: bool,
    nodes: IndexMap<ModelPath, NodeState>,
    /// Generation of the last deleted node per path, until the path is
    /// registered again.
    removed: IndexMap<ModelPath, u64>,
    next_generation: u64,
    ledger: ValidationLedger,
}

impl BinderState {
    fn node(&self, key: &NodeKey) -> Option<&NodeState> {
        self.nodes
            .get(&key.path)
            .filter(|node| node.generation == key.generation)
    }

    fn node_mut(&mut self, key: &NodeKey) -> Option<&mut NodeState> {
        self.nodes
            .get_mut(&key.path)
            .filter(|node| node.generation == key.generation)
    }
}

struct BinderInner {
    id: BinderId,
    model: Arc<Model>,
    empty_value: Value,
    config: BinderConfig,
    batch: BatchWindow,
    state: Mutex<BinderState>,
}

/// Root coordinator of a bound value.
///
/// `Binder` is a cheap handle: clones share the same state. Validation runs
/// are spawned onto the ambient Tokio runtime, so operations that start
/// validation must be called from within one.
///
/// # Example
///
/// ```ignore
/// let binder = Binder::new(person_model(), BinderConfig::new());
/// let name = binder.root().field("name")?;
///
/// name.set_value("Jane".into());
/// assert!(binder.dirty());
///
/// binder.reset(None);
/// assert!(!binder.dirty());
/// ```
#[derive(Clone)]
pub struct Binder {
    inner: Arc<BinderInner>,
}

impl Binder {
    /// Creates a binder for `model`, starting from the model's empty value.
    pub fn new(model: Model, config: BinderConfig) -> Self {
        let id = BinderId::new();
        let model = Arc::new(model);
        let empty_value = model.empty_value();

        let mut nodes = IndexMap::new();
        nodes.insert(
            ModelPath::root(),
            NodeState::new(ModelRef::root(id, Arc::clone(&model)), 0),
        );

        Self {
            inner: Arc::new(BinderInner {
                id,
                model,
                empty_value: empty_value.clone(),
                config,
                batch: BatchWindow::default(),
                state: Mutex::new(BinderState {
                    default_value: empty_value.clone(),
                    value: empty_value,
                    submitting: false,
                    validating: false,
                    nodes,
                    removed: IndexMap::new(),
                    next_generation: 1,
                    ledger: ValidationLedger::default(),
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BinderState> {
        lock(&self.inner.state)
    }

    fn update(&self, old_value: &Value) {
        if let Some(on_change) = &self.inner.config.on_change {
            on_change(old_value);
        }
    }

    /// Returns the identifier of this binder.
    pub fn id(&self) -> BinderId {
        self.inner.id
    }

    /// Returns the root model reference.
    pub fn model(&self) -> ModelRef {
        ModelRef::root(self.inner.id, Arc::clone(&self.inner.model))
    }

    /// Returns the root node.
    pub fn root(&self) -> BinderNode {
        self.register(self.model())
    }

    /// Resolves a model reference to its node, registering the node if this
    /// is the first time the position is addressed.
    pub fn for_model(&self, model: &ModelRef) -> Result<BinderNode, BinderError> {
        if model.binder_id() != self.inner.id {
            return Err(BinderError::UnknownModel(model.name()));
        }
        Ok(self.register(model.clone()))
    }

    /// Returns the live node at `model`, registering a new one if there is
    /// none. Registering a previously deleted path creates a fresh node.
    fn register(&self, model: ModelRef) -> BinderNode {
        let generation = {
            let mut state = self.lock();
            match state.nodes.get(model.path()).map(|node| node.generation) {
                Some(generation) => generation,
                None => {
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    state.removed.shift_remove(model.path());
                    log::trace!("Registering node '{}'", model.path());
                    state
                        .nodes
                        .insert(model.path().clone(), NodeState::new(model.clone(), generation));
                    generation
                }
            }
        };
        BinderNode::new(self.clone(), model, generation)
    }

    /// Like [`register`](Self::register), but hands back the deleted node
    /// instead of reviving a deleted path.
    pub(crate) fn lookup(&self, model: ModelRef) -> BinderNode {
        let removed = self.lock().removed.get(model.path()).copied();
        match removed {
            Some(generation) => BinderNode::new(self.clone(), model, generation),
            None => self.register(model),
        }
    }

    /// Returns every live node, in registration order.
    pub fn nodes(&self) -> Vec<BinderNode> {
        let models: Vec<(ModelRef, u64)> = self
            .lock()
            .nodes
            .values()
            .map(|node| (node.model.clone(), node.generation))
            .collect();
        models
            .into_iter()
            .map(|(model, generation)| BinderNode::new(self.clone(), model, generation))
            .collect()
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Returns the current value.
    pub fn value(&self) -> Value {
        self.lock().value.clone()
    }

    /// Replaces the current value.
    ///
    /// Setting a value equal to the current one does nothing; otherwise the
    /// change callback receives the previous value.
    pub fn set_value(&self, value: Value) {
        let old_value = {
            let mut state = self.lock();
            if state.value == value {
                return;
            }
            std::mem::replace(&mut state.value, value)
        };
        log::trace!("Binder {} value changed", self.inner.id);
        self.update(&old_value);
    }

    /// Returns the value last considered clean.
    pub fn default_value(&self) -> Value {
        self.lock().default_value.clone()
    }

    /// Replaces the clean snapshot without touching the current value.
    pub fn set_default_value(&self, default_value: Value) {
        self.lock().default_value = default_value;
    }

    /// Returns the canonical empty value of the model.
    pub fn empty_value(&self) -> &Value {
        &self.inner.empty_value
    }

    /// Optionally replaces the default value, then sets the current value to
    /// the default.
    pub fn reset(&self, default_value: Option<Value>) {
        let value = {
            let mut state = self.lock();
            if let Some(default_value) = default_value {
                state.default_value = default_value;
            }
            state.default_value.clone()
        };
        self.set_value(value);
    }

    /// Sets the current value to the empty value.
    pub fn clear(&self) {
        self.set_value(self.inner.empty_value.clone());
    }

    pub(crate) fn value_at(&self, path: &ModelPath) -> Value {
        path.read(&self.lock().value).cloned().unwrap_or(Value::Null)
    }

    pub(crate) fn default_value_at(&self, path: &ModelPath) -> Value {
        path.read(&self.lock().default_value)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Writes `new_value` at `path`, replacing the root value as a whole.
    ///
    /// Writes the value tree cannot hold (e.g. an index too large to
    /// allocate) are refused and logged.
    pub(crate) fn write_at(&self, path: &ModelPath, new_value: Value) {
        let old_value = {
            let mut state = self.lock();
            let mut value = state.value.clone();
            if !path.write(&mut value, new_value) {
                log::warn!("Refusing to write at '{}': index out of range", path);
                return;
            }
            if value == state.value {
                return;
            }
            std::mem::replace(&mut state.value, value)
        };
        log::trace!("Binder {} value changed at '{}'", self.inner.id, path);
        self.update(&old_value);
    }

    // =========================================================================
    // Node state
    // =========================================================================

    pub(crate) fn node_visited(&self, node: &NodeKey) -> bool {
        self.lock().node(node).is_some_and(|node| node.visited)
    }

    /// Returns `false` if the node is not live.
    pub(crate) fn set_node_visited(&self, node: &NodeKey, visited: bool) -> bool {
        match self.lock().node_mut(node) {
            Some(node) => {
                node.visited = visited;
                true
            }
            None => false,
        }
    }

    pub(crate) fn node_errors(&self, node: &NodeKey) -> Vec<ValueError> {
        self.lock()
            .node(node)
            .map(NodeState::errors)
            .unwrap_or_default()
    }

    pub(crate) fn node_invalid(&self, node: &NodeKey) -> bool {
        self.lock()
            .node(node)
            .is_some_and(|node| !node.results.is_empty())
    }

    pub(crate) fn remove_node(&self, node: &NodeKey) {
        let mut state = self.lock();
        if state.node(node).is_none() {
            return;
        }
        state.nodes.shift_remove(&node.path);
        state.removed.insert(node.path.clone(), node.generation);
        log::trace!("Removed node {}", node);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Requests a run of `validator` against `node`.
    ///
    /// If the same pair is already in flight the existing handle is returned
    /// and the validator is not invoked again. Otherwise the binder enters
    /// the `validating` state and the run is scheduled after the current
    /// batch window.
    pub fn request_validation(
        &self,
        node: &BinderNode,
        validator: &Arc<dyn Validator>,
    ) -> PendingValidation {
        let key = ValidatorKey::of(validator);
        let node_key = node.key();

        let mut state = self.lock();
        if let Some(pending) = state.ledger.get(&node_key, key) {
            log::trace!("Joining in-flight validation of {}", node_key);
            return pending.clone();
        }

        let (barrier, opened) = self.inner.batch.join();
        if opened {
            log::trace!("Opened validation batch for binder {}", self.inner.id);
        }
        state.validating = true;

        let run = self.validation_run(
            node.model().clone(),
            node_key.clone(),
            key,
            Arc::clone(validator),
            barrier,
        );
        let handle = tokio::spawn(run);
        let name = node.name();
        let pending = PendingValidation::new(async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("Validation of '{}' did not complete: {}", name, err);
                    None
                }
            }
        });

        state.ledger.insert(node_key, key, pending.clone());
        log::trace!("{} validation(s) in flight", state.ledger.len());
        pending
    }

    fn validation_run(
        &self,
        model: ModelRef,
        node: NodeKey,
        key: ValidatorKey,
        validator: Arc<dyn Validator>,
        barrier: Barrier,
    ) -> impl Future<Output = Option<ValueError>> + Send + 'static {
        let binder = self.clone();
        async move {
            barrier.await;

            let value = binder.value_at(model.path());
            let check = async { validator.validate(&value).await };
            let valid = match AssertUnwindSafe(check).catch_unwind().await {
                Ok(valid) => valid,
                Err(_) => {
                    log::error!("Validator '{}' panicked on '{}'", validator.message(), model.name());
                    true
                }
            };

            let error = (!valid).then(|| ValueError::new(model.name(), value, Arc::clone(&validator)));
            binder.complete_validation(&node, key, error.clone());
            error
        }
    }

    fn complete_validation(&self, node: &NodeKey, key: ValidatorKey, error: Option<ValueError>) {
        let drained = {
            let mut state = self.lock();
            match state.node_mut(node) {
                Some(live) => live.record(key, error),
                None => log::trace!("Discarding validation result of deleted node {}", node),
            }
            state.ledger.complete(node, key);

            if state.validating && state.ledger.is_empty() && !self.inner.batch.is_open() {
                state.validating = false;
                Some(state.value.clone())
            } else {
                None
            }
        };

        if let Some(value) = drained {
            log::debug!("Binder {} finished validating", self.inner.id);
            self.update(&value);
        }
    }

    fn pending_validations(&self) -> Vec<PendingValidation> {
        self.lock().ledger.pending()
    }

    /// Validates every validator of every live node and waits for all of
    /// them. Failures are recorded as node errors, never returned.
    pub async fn validate(&self) {
        let pending: Vec<PendingValidation> = self
            .nodes()
            .iter()
            .flat_map(BinderNode::request_validation)
            .collect();
        join_all(pending).await;
    }

    // =========================================================================
    // Submit
    // =========================================================================

    /// Submits through the configured submit function.
    ///
    /// Returns `Ok(None)` without doing anything if none is configured.
    pub async fn submit(&self) -> Result<Option<Value>, BinderError> {
        let Some(on_submit) = self.inner.config.on_submit.clone() else {
            return Ok(None);
        };
        self.submit_to(move |value| on_submit(value)).await
    }

    /// Submits the current value to `endpoint`.
    ///
    /// Waits for every outstanding validation first and refuses to call the
    /// endpoint while any node has errors. A structured rejection from the
    /// endpoint is returned as [`BinderError::Validation`]; other failures
    /// as [`BinderError::Submit`]. Whatever the outcome, the value at the
    /// end of the call becomes the new default.
    pub async fn submit_to<F, Fut>(&self, endpoint: F) -> Result<Option<Value>, BinderError>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Option<Value>, EndpointError>>,
    {
        join_all(self.pending_validations()).await;

        let errors = self.errors();
        if !errors.is_empty() {
            log::debug!("Submit blocked by {} validation error(s)", errors.len());
            self.reset(Some(self.value()));
            return Err(ValidationError::new(errors).into());
        }

        let value = self.begin_submission();
        let submission = Submission { binder: self };
        let result = endpoint(value).await;
        drop(submission);

        match result {
            Ok(response) => Ok(response),
            Err(EndpointError::Rejected(data)) if !data.is_empty() => {
                log::debug!("Endpoint rejected {} parameter(s)", data.len());
                Err(translate_rejection(&data).into())
            }
            Err(EndpointError::Other(err)) => Err(BinderError::Submit(err)),
            Err(err) => Err(BinderError::Submit(Box::new(err))),
        }
    }

    fn begin_submission(&self) -> Value {
        let value = {
            let mut state = self.lock();
            state.submitting = true;
            state.value.clone()
        };
        log::debug!("Binder {} submitting", self.inner.id);
        self.update(&value);
        value
    }

    fn end_submission(&self) {
        let value = {
            let mut state = self.lock();
            state.submitting = false;
            state.default_value = state.value.clone();
            state.value.clone()
        };
        log::debug!("Binder {} finished submitting", self.inner.id);
        self.update(&value);
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    /// Returns `true` while a submit function is running.
    pub fn submitting(&self) -> bool {
        self.lock().submitting
    }

    /// Returns `true` while validations are in flight.
    pub fn validating(&self) -> bool {
        self.lock().validating
    }

    /// Returns the name of the root position (always empty).
    pub fn name(&self) -> String {
        ModelPath::root().to_string()
    }

    /// Returns the validators of the root model.
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        self.inner.model.validators()
    }

    /// Returns `true` if the value differs from the default value.
    pub fn dirty(&self) -> bool {
        let state = self.lock();
        state.value != state.default_value
    }

    /// Returns `true` if the root node has been visited.
    pub fn visited(&self) -> bool {
        self.lock()
            .nodes
            .get(&ModelPath::root())
            .is_some_and(|root| root.visited)
    }

    /// Returns `true` if the root node itself has errors.
    pub fn invalid(&self) -> bool {
        self.lock()
            .nodes
            .get(&ModelPath::root())
            .is_some_and(|root| !root.results.is_empty())
    }

    /// Returns the errors of every live node, in registration order.
    pub fn errors(&self) -> Vec<ValueError> {
        self.lock()
            .nodes
            .values()
            .flat_map(NodeState::errors)
            .collect()
    }
}

/// Ends the submission when dropped, including on panic or cancellation.
struct Submission<'a> {
    binder: &'a Binder,
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        self.binder.end_submission();
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Binder")
            .field("id", &self.inner.id)
            .field("value", &state.value)
            .field("submitting", &state.submitting)
            .field("validating", &state.validating)
            .field("nodes", &state.nodes.len())
            .finish()
    }
}
