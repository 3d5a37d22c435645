//! Reconciliation pass over declared entities
//!
//! An [`Engine`] lives for one pass. It keeps the directory catalog and one
//! [`ResourceCatalog`] per environment, so every entity of the pass resolves
//! names against the same snapshots.

use crate::action::{Action, ActionType};
use crate::api::ApiClient;
use crate::catalog::{DirectoryCatalog, ResourceCatalog};
use crate::context::EnvironmentContext;
use crate::entities::{
    BaremetalReconciler, EnvironmentReconciler, NetworkAclReconciler, NetworkReconciler,
    PortForwardingRuleReconciler, PublicIpReconciler, ResizeErrorPolicy, SshKeyReconciler,
    StaticNatReconciler, VolumeReconciler, VpcReconciler, VpnUserReconciler,
};
use crate::error::{CloudError, Result};
use crate::plan::changed_fields;
use crate::reconciler::{
    self, LifecycleState, ObservedState, ReadMode, ReconciliationResult, Reconciler,
};
use crate::registry::{Declared, DeclaredEntity, EntityKind};
use crate::spec::Declare;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub resize_errors: ResizeErrorPolicy,
}

/// Run `$body` with the reconciler and scope matching a [`Declared`] value.
/// Environment-scoped kinds resolve their catalog first and return early
/// from the enclosing function when that fails.
macro_rules! with_reconciler {
    (@scoped $engine:expr, $spec:ident, $make:expr, $r:ident, $scope:ident, $body:expr) => {{
        let catalog = $engine.catalog_for($spec).await?;
        let $r = $make;
        let $scope: &ResourceCatalog = &catalog;
        $body
    }};
    ($engine:expr, $declared:expr, |$reconciler:ident, $scope:ident, $spec:ident| $body:expr) => {
        match $declared {
            Declared::Environment($spec) => {
                let $reconciler = EnvironmentReconciler;
                let $scope: &DirectoryCatalog = &$engine.directory;
                $body
            }
            Declared::Vpc($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                VpcReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::Network($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                NetworkReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::NetworkAcl($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                NetworkAclReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::Volume($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                VolumeReconciler::new($engine.options.resize_errors),
                $reconciler,
                $scope,
                $body
            ),
            Declared::Baremetal($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                BaremetalReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::PublicIp($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                PublicIpReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::StaticNat($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                StaticNatReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::SshKey($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                SshKeyReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::VpnUser($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                VpnUserReconciler,
                $reconciler,
                $scope,
                $body
            ),
            Declared::PortForwardingRule($spec) => with_reconciler!(
                @scoped $engine,
                $spec,
                PortForwardingRuleReconciler,
                $reconciler,
                $scope,
                $body
            ),
        }
    };
}

pub struct Engine {
    client: Arc<dyn ApiClient>,
    directory: Arc<DirectoryCatalog>,
    catalogs: DashMap<String, Arc<OnceCell<Arc<ResourceCatalog>>>>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(client: Arc<dyn ApiClient>, options: EngineOptions) -> Self {
        Self {
            directory: Arc::new(DirectoryCatalog::new(client.clone())),
            client,
            catalogs: DashMap::new(),
            options,
        }
    }

    pub fn directory(&self) -> &DirectoryCatalog {
        &self.directory
    }

    /// Catalog of one environment, loaded on first use
    pub async fn catalog(&self, environment_id: &str) -> Result<Arc<ResourceCatalog>> {
        let slot = self
            .catalogs
            .entry(environment_id.to_string())
            .or_default()
            .clone();
        slot.get_or_try_init(|| async {
            let context = EnvironmentContext::load(self.client.clone(), environment_id).await?;
            debug!(environment_id, service = %context.service_code, "environment catalog ready");
            Ok(Arc::new(ResourceCatalog::new(
                self.client.clone(),
                context,
                self.directory.clone(),
            )))
        })
        .await
        .cloned()
    }

    async fn catalog_for(&self, spec: &dyn Declare) -> Result<Arc<ResourceCatalog>> {
        let environment_id = spec
            .environment_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CloudError::Validation("environment_id is required".to_string()))?;
        self.catalog(environment_id).await
    }

    /// Bring one entity to its declared state
    pub async fn apply(&self, entry: &DeclaredEntity) -> ReconciliationResult<Value> {
        let id = entry.id.as_deref();
        self.try_apply(entry, id)
            .await
            .unwrap_or_else(|e| failed_before_start(id, e))
    }

    async fn try_apply(
        &self,
        entry: &DeclaredEntity,
        id: Option<&str>,
    ) -> Result<ReconciliationResult<Value>> {
        Ok(with_reconciler!(self, &entry.spec, |r, scope, spec| {
            apply_entity(&r, scope, id, spec).await.erase()
        }))
    }

    /// Decide what [`Engine::apply`] would do, without mutating anything
    pub async fn plan(&self, entry: &DeclaredEntity) -> Result<Action> {
        let kind = entry.kind();
        let id = entry.id.as_deref();
        with_reconciler!(self, &entry.spec, |r, scope, spec| {
            plan_entity(&r, scope, kind, id, spec).await
        })
    }

    /// Delete one entity; one that is already gone counts as deleted
    pub async fn destroy(&self, entry: &DeclaredEntity) -> ReconciliationResult<Value> {
        let Some(id) = entry.id.as_deref() else {
            let error = CloudError::Validation(format!("{} has no id to destroy", entry.kind()));
            return ReconciliationResult::failed(None, LifecycleState::Absent, error);
        };
        self.try_destroy(entry, id)
            .await
            .unwrap_or_else(|e| failed_before_start(Some(id), e))
    }

    async fn try_destroy(
        &self,
        entry: &DeclaredEntity,
        id: &str,
    ) -> Result<ReconciliationResult<Value>> {
        Ok(with_reconciler!(self, &entry.spec, |r, scope, spec| {
            reconciler::delete(&r, scope, id, spec).await.erase()
        }))
    }

    /// Read an entity that may not be in any manifest. `None` when absent.
    pub async fn read(
        &self,
        kind: EntityKind,
        id: &str,
        environment_id: &str,
    ) -> Result<Option<ObservedState<Value>>> {
        if kind.is_environment_scoped() && environment_id.is_empty() {
            return Err(CloudError::Validation(format!(
                "an environment id is required to read a {kind}"
            )));
        }
        let declared = Declared::default_for(kind, environment_id);
        with_reconciler!(self, &declared, |r, scope, spec| {
            match reconciler::read(&r, scope, id, spec, ReadMode::Tolerant).await? {
                Some(observed) => Ok(Some(observed.into_json()?)),
                None => Ok(None),
            }
        })
    }
}

fn failed_before_start(id: Option<&str>, error: CloudError) -> ReconciliationResult<Value> {
    let state = if id.is_some() {
        LifecycleState::Present
    } else {
        LifecycleState::Absent
    };
    ReconciliationResult::failed(id.map(str::to_string), state, error)
}

async fn apply_entity<R: Reconciler>(
    reconciler: &R,
    scope: &R::Scope,
    id: Option<&str>,
    declared: &R::Spec,
) -> ReconciliationResult<R::Spec> {
    let entity = reconciler.entity();
    let Some(id) = id else {
        return reconciler::create(reconciler, scope, declared).await;
    };

    let read = reconciler::read(reconciler, scope, id, declared, ReadMode::Tolerant).await;
    let observed = match read {
        Ok(Some(observed)) => observed,
        Ok(None) => {
            info!(entity, id, "recreating entity missing remotely");
            return reconciler::create(reconciler, scope, declared).await;
        }
        Err(e) => {
            return ReconciliationResult::failed(Some(id.to_string()), LifecycleState::Present, e);
        }
    };

    let replaced = changed_fields(
        &observed.spec.declared(),
        &declared.declared(),
        reconciler.immutable_fields(),
    );
    if !replaced.is_empty() {
        info!(entity, id, fields = ?replaced, "replacing");
        let deleted = reconciler::delete(reconciler, scope, id, &observed.spec).await;
        if !deleted.is_success() {
            return deleted;
        }
        let mut created = reconciler::create(reconciler, scope, declared).await;
        let mut tasks = deleted.tasks;
        tasks.append(&mut created.tasks);
        created.tasks = tasks;
        return created;
    }

    reconciler::update(reconciler, scope, id, &observed.spec, declared).await
}

async fn plan_entity<R: Reconciler>(
    reconciler: &R,
    scope: &R::Scope,
    kind: EntityKind,
    id: Option<&str>,
    declared: &R::Spec,
) -> Result<Action> {
    let Some(id) = id else {
        return Ok(Action::new(kind, None, ActionType::Create));
    };
    let read = reconciler::read(reconciler, scope, id, declared, ReadMode::Tolerant).await?;
    let Some(observed) = read else {
        return Ok(Action::new(kind, None, ActionType::Create));
    };

    let (old, new) = (observed.spec.declared(), declared.declared());
    let fields: Vec<&'static str> = new.field_names().collect();
    let drift = changed_fields(&old, &new, &fields);

    let replaced = changed_fields(&old, &new, reconciler.immutable_fields());
    if !replaced.is_empty() {
        return Ok(Action::new(kind, Some(id.to_string()), ActionType::Replace)
            .with_fields(replaced)
            .with_drift(drift));
    }

    let operations = reconciler.plan_update(scope, &observed.spec, declared).await?;
    let families = reconciler::planned_families(reconciler, &observed.spec, declared, &operations);
    let action_type = if families.is_empty() {
        ActionType::NoChange
    } else {
        ActionType::Update
    };
    Ok(Action::new(kind, Some(id.to_string()), action_type)
        .with_fields(families)
        .with_drift(drift))
}
