//! Planned actions for a deployment dry-run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a planned call against a resource client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Pipeline step the action belongs to
    pub step: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "virtual-network", "storage-account")
    pub resource_type: String,

    /// Resource name
    pub resource_name: String,

    /// Description of the action
    pub description: String,

    /// Non-secret parameters the call will be issued with
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Action {
    pub fn new(
        step: impl Into<String>,
        action_type: ActionType,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_name = resource_name.into();
        Self {
            id: format!("{}-{}-{}", action_type, resource_type, resource_name),
            step: step.into(),
            action_type,
            resource_type,
            resource_name,
            description: description.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Precondition check, no resource is touched
    Check,
    /// Create the resource or update it in place
    CreateOrUpdate,
    /// Delete a resource
    Delete,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Check => write!(f, "check"),
            ActionType::CreateOrUpdate => write!(f, "create-or-update"),
            ActionType::Delete => write!(f, "delete"),
        }
    }
}

/// Ordered list of actions a pipeline run would perform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type != ActionType::Check)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Actions grouped under one step, in plan order
    pub fn actions_for_step(&self, step: &str) -> Vec<&Action> {
        self.actions.iter().filter(|a| a.step == step).collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            checks: self.actions_by_type(ActionType::Check).len(),
            create_or_update: self.actions_by_type(ActionType::CreateOrUpdate).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub checks: usize,
    pub create_or_update: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create or update, {} to delete, {} checks",
            self.create_or_update, self.delete, self.checks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            Action::new("Validate", ActionType::Check, "account", "sub", "check"),
            Action::new("Net", ActionType::CreateOrUpdate, "virtual-network", "vnet", "vnet"),
            Action::new("Net", ActionType::CreateOrUpdate, "subnet", "a", "subnet a"),
        ]);

        assert!(plan.has_changes());
        assert_eq!(
            plan.summary(),
            PlanSummary {
                checks: 1,
                create_or_update: 2,
                delete: 0,
            }
        );
        assert_eq!(plan.actions_for_step("Net").len(), 2);
        assert_eq!(
            plan.summary().to_string(),
            "2 to create or update, 0 to delete, 1 checks"
        );
    }

    #[test]
    fn test_action_id() {
        let action = Action::new("Net", ActionType::CreateOrUpdate, "subnet", "aks", "d")
            .with_detail("address_prefix", serde_json::json!("10.0.1.0/24"));
        assert_eq!(action.id, "create-or-update-subnet-aks");
        assert_eq!(action.details["address_prefix"], "10.0.1.0/24");
    }

    #[test]
    fn test_check_only_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::new(
            "Validate",
            ActionType::Check,
            "account",
            "sub",
            "check",
        )]);
        assert!(!plan.has_changes());
    }
}
