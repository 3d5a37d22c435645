//! Planned and applied actions of a manifest pass

use crate::reconciler::{LifecycleState, ReconciliationResult};
use crate::registry::EntityKind;
use serde::Serialize;
use serde_json::Value;

/// Represents a planned action for one declared entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub kind: EntityKind,

    /// Remote id, when the entity exists
    pub remote_id: Option<String>,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Update families to apply, or the immutable fields forcing a replacement
    pub fields: Vec<&'static str>,

    /// Every declared field that differs from the remote state
    pub drift: Vec<&'static str>,
}

impl Action {
    pub fn new(kind: EntityKind, remote_id: Option<String>, action_type: ActionType) -> Self {
        Self {
            kind,
            remote_id,
            action_type,
            fields: Vec::new(),
            drift: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<&'static str>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_drift(mut self, drift: Vec<&'static str>) -> Self {
        self.drift = drift;
        self
    }

    pub fn description(&self) -> String {
        let target = format!("{} {}", self.kind, self.remote_id.as_deref().unwrap_or("(new)"));
        match self.action_type {
            ActionType::Create => format!("create {target}"),
            ActionType::Replace => format!("replace {target} ({} changed)", self.fields.join(", ")),
            ActionType::Update => format!("update {target} [{}]", self.fields.join(", ")),
            ActionType::NoChange if self.drift.is_empty() => format!("{target} is up to date"),
            ActionType::NoChange => format!(
                "{target} drifted on {} with no way to update in place",
                self.drift.join(", ")
            ),
        }
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new entity
    Create,
    /// Delete the entity and create it again
    Replace,
    /// Apply update families in place
    Update,
    /// No changes needed
    NoChange,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Update => write!(f, "update"),
            ActionType::NoChange => write!(f, "no-change"),
        }
    }
}

/// Plan containing the actions of every entity in a manifest
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoChange);
        Self {
            actions,
            has_changes,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            no_change: self.actions_by_type(ActionType::NoChange).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub replace: usize,
    pub update: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to replace, {} to update, {} unchanged",
            self.create, self.replace, self.update, self.no_change
        )
    }
}

/// Outcome of one entity in an apply or destroy pass
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// `kind id` of the entity
    pub label: String,
    pub remote_id: Option<String>,
    pub state: LifecycleState,
    /// Applied update families
    pub applied: Vec<&'static str>,
    /// Task ids reported by the API
    pub tasks: Vec<String>,
    pub error: Option<String>,
}

/// Result of a whole pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,
    pub failed: Vec<ActionResult>,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record(&mut self, label: String, result: &ReconciliationResult<Value>) {
        let outcome = ActionResult {
            label,
            remote_id: result.remote_id.clone(),
            state: result.state,
            applied: result.applied.clone(),
            tasks: result.tasks.iter().map(|t| t.id.clone()).collect(),
            error: result.error.as_ref().map(ToString::to_string),
        };
        if outcome.error.is_some() {
            self.failed.push(outcome);
        } else {
            self.succeeded.push(outcome);
        }
    }
}
