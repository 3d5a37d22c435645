//! Generic reconciliation of one entity
//!
//! Entity types implement [`Reconciler`]: how to create, fetch, mutate and
//! remove one entity, plus a pure planner. The free functions here drive the
//! lifecycle around those hooks:
//!
//! ```text
//! Absent ──create──▶ Creating ──▶ Present ──update──▶ Updating ──▶ Present
//!    ▲                  │            │
//!    └──── failure ─────┘            └──delete──▶ Deleting ──▶ Absent
//! ```

use crate::api::TaskRef;
use crate::error::{CloudError, ErrorKind, Result};
use crate::plan::{RemoteOperation, UpdateFamily, changed_families};
use crate::spec::Declare;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Absent, Present)
                | (Creating, Present)
                | (Creating, Absent)
                | (Present, Updating)
                | (Present, Deleting)
                | (Present, Absent)
                | (Updating, Present)
                | (Deleting, Absent)
                | (Deleting, Present)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Absent => write!(f, "absent"),
            LifecycleState::Creating => write!(f, "creating"),
            LifecycleState::Present => write!(f, "present"),
            LifecycleState::Updating => write!(f, "updating"),
            LifecycleState::Deleting => write!(f, "deleting"),
        }
    }
}

/// Tracks the lifecycle of one entity during a single reconciliation
#[derive(Debug)]
struct Lifecycle {
    entity: &'static str,
    state: LifecycleState,
}

impl Lifecycle {
    fn new(entity: &'static str, state: LifecycleState) -> Self {
        Self { entity, state }
    }

    fn advance(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "{} cannot go from {} to {}",
            self.entity,
            self.state,
            next
        );
        debug!(entity = self.entity, from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }
}

/// Remote state of an entity, projected into its declared form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedState<S> {
    pub id: String,
    pub spec: S,
    /// Values the remote side computes (addresses, display names, ...)
    pub computed: BTreeMap<String, Value>,
}

impl<S> ObservedState<S> {
    pub fn new(id: impl Into<String>, spec: S) -> Self {
        Self {
            id: id.into(),
            spec,
            computed: BTreeMap::new(),
        }
    }

    pub fn with_computed(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.computed.insert(key.to_string(), value.into());
        self
    }

    /// Record a computed text value, skipping empty strings
    pub fn with_text(self, key: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.with_computed(key, value)
        }
    }
}

impl<S: Serialize> ObservedState<S> {
    /// Replace the typed spec with its JSON form
    pub fn into_json(self) -> Result<ObservedState<Value>> {
        Ok(ObservedState {
            id: self.id,
            spec: serde_json::to_value(&self.spec)?,
            computed: self.computed,
        })
    }
}

/// Outcome of a successful create call
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub id: String,
    pub task: Option<TaskRef>,
    /// Values only returned at creation time (initial credentials, ...)
    pub computed: BTreeMap<String, Value>,
}

impl Created {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task: None,
            computed: BTreeMap::new(),
        }
    }

    pub fn with_task(mut self, task: Option<TaskRef>) -> Self {
        self.task = task;
        self
    }

    pub fn with_computed(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.computed.insert(key.to_string(), value.into());
        self
    }
}

/// Result of create, update or delete
#[derive(Debug)]
pub struct ReconciliationResult<S> {
    pub remote_id: Option<String>,
    pub state: LifecycleState,
    pub observed: Option<ObservedState<S>>,
    /// Update families whose operation was applied
    pub applied: Vec<&'static str>,
    pub tasks: Vec<TaskRef>,
    pub error: Option<CloudError>,
}

impl<S> ReconciliationResult<S> {
    fn new(remote_id: Option<String>, state: LifecycleState) -> Self {
        Self {
            remote_id,
            state,
            observed: None,
            applied: Vec::new(),
            tasks: Vec::new(),
            error: None,
        }
    }

    /// A reconciliation that failed before any remote mutation
    pub fn failed(remote_id: Option<String>, state: LifecycleState, error: CloudError) -> Self {
        let mut result = Self::new(remote_id, state);
        result.error = Some(error);
        result
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(CloudError::kind)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn push_task(&mut self, task: Option<TaskRef>) {
        self.tasks.extend(task);
    }
}

impl<S: Serialize> ReconciliationResult<S> {
    /// Replace the typed spec with its JSON form
    pub fn erase(self) -> ReconciliationResult<Value> {
        let mut error = self.error;
        let observed = self.observed.and_then(|o| match o.into_json() {
            Ok(observed) => Some(observed),
            Err(e) => {
                error.get_or_insert(e);
                None
            }
        });
        ReconciliationResult {
            remote_id: self.remote_id,
            state: self.state,
            observed,
            applied: self.applied,
            tasks: self.tasks,
            error,
        }
    }
}

/// How a read treats a missing entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Absence is an error (read after create or update)
    ExpectingPresence,
    /// Absence is reported as `None` (drift detection)
    Tolerant,
}

/// Per-entity hooks driven by [`create`], [`read`], [`update`] and [`delete`]
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Spec: Declare + Clone + Send + Sync;
    type Operation: RemoteOperation;
    /// Catalog the entity resolves names against
    type Scope: Send + Sync;

    /// Display name used in messages, e.g. `Volume`
    fn entity(&self) -> &'static str;

    fn families(&self) -> &'static [UpdateFamily] {
        &[]
    }

    /// Fields whose change requires delete-then-create
    fn immutable_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Pure planner: operations that turn `old` into `new`.
    /// Preconditions fail here, before anything is applied.
    fn plan(&self, old: &Self::Spec, new: &Self::Spec) -> Result<Vec<Self::Operation>>;

    /// Planner with catalog access, for preconditions that depend on
    /// remote capabilities. Defaults to [`Reconciler::plan`].
    async fn plan_update(
        &self,
        _scope: &Self::Scope,
        old: &Self::Spec,
        new: &Self::Spec,
    ) -> Result<Vec<Self::Operation>> {
        self.plan(old, new)
    }

    async fn create(&self, scope: &Self::Scope, spec: &Self::Spec) -> Result<Created>;

    /// Fetch and project. `Ok(None)` reports an entity-specific absence
    /// (e.g. a public IP without static NAT); missing records surface as
    /// not-found errors.
    async fn fetch(
        &self,
        scope: &Self::Scope,
        id: &str,
        declared: &Self::Spec,
    ) -> Result<Option<ObservedState<Self::Spec>>>;

    async fn execute(
        &self,
        scope: &Self::Scope,
        id: &str,
        new: &Self::Spec,
        operation: &Self::Operation,
    ) -> Result<Option<TaskRef>>;

    async fn remove(
        &self,
        scope: &Self::Scope,
        id: &str,
        declared: &Self::Spec,
    ) -> Result<Option<TaskRef>>;

    /// Whether a failed operation is logged and skipped instead of stopping
    /// the update. A skipped operation is not reported as applied.
    fn discards_failure(&self, _operation: &Self::Operation, _error: &CloudError) -> bool {
        false
    }
}

/// Families of `operations` in plan order.
///
/// Logs a warning when they differ from the families whose fields changed
/// between `old` and `new`.
pub fn planned_families<R: Reconciler>(
    reconciler: &R,
    old: &R::Spec,
    new: &R::Spec,
    operations: &[R::Operation],
) -> Vec<&'static str> {
    let mut planned: Vec<&'static str> = operations.iter().map(RemoteOperation::family).collect();
    planned.dedup();
    let changed: Vec<&'static str> =
        changed_families(&old.declared(), &new.declared(), reconciler.families())
            .into_iter()
            .map(|family| family.name)
            .collect();
    if planned != changed {
        warn!(
            entity = reconciler.entity(),
            ?planned,
            ?changed,
            "planned operations do not match the changed families"
        );
    }
    planned
}

/// Read an entity, honoring `mode` for absence
pub async fn read<R: Reconciler>(
    reconciler: &R,
    scope: &R::Scope,
    id: &str,
    declared: &R::Spec,
    mode: ReadMode,
) -> Result<Option<ObservedState<R::Spec>>> {
    let fetched = match reconciler.fetch(scope, id, declared).await {
        Ok(observed) => observed,
        Err(e) if e.is_not_found() => {
            debug!(entity = reconciler.entity(), id, error = %e, "remote record not found");
            None
        }
        Err(e) => return Err(e),
    };

    match (fetched, mode) {
        (Some(observed), _) => Ok(Some(observed)),
        (None, ReadMode::Tolerant) => {
            info!(entity = reconciler.entity(), id, "entity is absent remotely");
            Ok(None)
        }
        (None, ReadMode::ExpectingPresence) => Err(CloudError::EntityNotFound {
            entity: reconciler.entity(),
            id: id.to_string(),
        }),
    }
}

/// Create an entity and read it back
pub async fn create<R: Reconciler>(
    reconciler: &R,
    scope: &R::Scope,
    spec: &R::Spec,
) -> ReconciliationResult<R::Spec> {
    let entity = reconciler.entity();
    let mut lifecycle = Lifecycle::new(entity, LifecycleState::Absent);
    lifecycle.advance(LifecycleState::Creating);

    let created = match reconciler.create(scope, spec).await {
        Ok(created) => created,
        Err(e) => {
            warn!(entity, error = %e, "create failed");
            lifecycle.advance(LifecycleState::Absent);
            return ReconciliationResult::failed(None, lifecycle.state, e);
        }
    };
    lifecycle.advance(LifecycleState::Present);
    info!(entity, id = %created.id, "created");

    let mut result = ReconciliationResult::new(Some(created.id.clone()), lifecycle.state);
    result.push_task(created.task);
    match read(reconciler, scope, &created.id, spec, ReadMode::ExpectingPresence).await {
        Ok(observed) => {
            result.observed = observed.map(|mut o| {
                o.computed.extend(created.computed);
                o
            });
        }
        Err(e) => result.error = Some(e),
    }
    result
}

/// Apply the planned operations in order, stopping at the first failure.
/// Operations applied before a failure stay applied and are reported.
pub async fn update<R: Reconciler>(
    reconciler: &R,
    scope: &R::Scope,
    id: &str,
    old: &R::Spec,
    new: &R::Spec,
) -> ReconciliationResult<R::Spec> {
    let entity = reconciler.entity();
    let mut lifecycle = Lifecycle::new(entity, LifecycleState::Present);
    let mut result = ReconciliationResult::new(Some(id.to_string()), lifecycle.state);

    let operations = match reconciler.plan_update(scope, old, new).await {
        Ok(operations) => operations,
        Err(e) => {
            warn!(entity, id, error = %e, "update rejected");
            result.error = Some(e);
            return result;
        }
    };

    if !operations.is_empty() {
        let families = planned_families(reconciler, old, new, &operations);
        debug!(entity, id, ?families, "planned update");
        lifecycle.advance(LifecycleState::Updating);
        for operation in &operations {
            debug!(entity, id, ?operation, "applying");
            match reconciler.execute(scope, id, new, operation).await {
                Ok(task) => {
                    result.applied.push(operation.family());
                    result.push_task(task);
                }
                Err(e) if reconciler.discards_failure(operation, &e) => {
                    warn!(
                        entity,
                        id,
                        family = operation.family(),
                        error = %e,
                        "update step failed, error discarded"
                    );
                }
                Err(e) => {
                    warn!(
                        entity,
                        id,
                        family = operation.family(),
                        applied = ?result.applied,
                        error = %e,
                        "update stopped"
                    );
                    result.error = Some(e);
                    break;
                }
            }
        }
        lifecycle.advance(LifecycleState::Present);
        result.state = lifecycle.state;
        if result.error.is_some() {
            return result;
        }
        info!(entity, id, applied = ?result.applied, "updated");
    }

    match read(reconciler, scope, id, new, ReadMode::ExpectingPresence).await {
        Ok(observed) => result.observed = observed,
        Err(e) => result.error = Some(e),
    }
    result
}

/// Remove an entity; an entity that is already gone counts as removed
pub async fn delete<R: Reconciler>(
    reconciler: &R,
    scope: &R::Scope,
    id: &str,
    declared: &R::Spec,
) -> ReconciliationResult<R::Spec> {
    let entity = reconciler.entity();
    let mut lifecycle = Lifecycle::new(entity, LifecycleState::Present);
    lifecycle.advance(LifecycleState::Deleting);

    let mut result = ReconciliationResult::new(Some(id.to_string()), lifecycle.state);
    match reconciler.remove(scope, id, declared).await {
        Ok(task) => {
            info!(entity, id, "deleted");
            result.push_task(task);
            lifecycle.advance(LifecycleState::Absent);
        }
        Err(e) if e.is_not_found() => {
            info!(entity, id, "already absent");
            lifecycle.advance(LifecycleState::Absent);
        }
        Err(e) => {
            warn!(entity, id, error = %e, "delete failed");
            result.error = Some(e);
            lifecycle.advance(LifecycleState::Present);
        }
    }
    result.state = lifecycle.state;
    result
}
