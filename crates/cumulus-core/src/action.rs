//! Planned actions and apply results

use serde::{Deserialize, Serialize};

/// A planned action for one declared or recorded resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Resource key (`kind.name`)
    pub key: String,

    /// Resource kind (e.g. "backup_policy", "subnet")
    pub kind: String,

    pub name: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Description of the action
    pub description: String,

    /// Desired spec; `None` for deletions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,

    /// Immutable fields forcing a replacement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaced_fields: Vec<String>,
}

impl Action {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, action_type: ActionType) -> Self {
        let kind = kind.into();
        let name = name.into();
        let key = resource_key(&kind, &name);
        Self {
            description: format!("{} {}", action_type, key),
            key,
            kind,
            name,
            action_type,
            spec: None,
            replaced_fields: Vec::new(),
        }
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_replaced_fields(mut self, fields: Vec<String>) -> Self {
        self.description = format!("{} ({} changed)", self.description, fields.join(", "));
        self.replaced_fields = fields;
        self
    }
}

/// State key of a declared resource
pub fn resource_key(kind: &str, name: &str) -> String {
    format!("{}.{}", kind, name)
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update changed fields in place
    Update,
    /// Delete and recreate (immutable fields changed)
    Replace,
    /// Delete a resource no longer declared
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
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

    pub fn add_success(&mut self, key: String, message: String) {
        self.succeeded.push(ActionResult {
            key,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, key: String, error: String) {
        self.failed.push(ActionResult {
            key,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Resource key
    pub key: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform, declared resources first
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan; a replacement counts as one create and one delete
    pub fn summary(&self) -> PlanSummary {
        let replace = self.actions_by_type(ActionType::Replace).len();
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len() + replace,
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len() + replace,
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}
