//! Change plans between two templates

use crate::error::Result;
use crate::template::{Template, TemplateResource};
use serde::{Deserialize, Serialize};

/// A planned change for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub logical_id: String,
    pub action_type: ActionType,
    pub resource_type: String,
    /// Top-level keys that differ (`Properties.<name>`, `DependsOn`, ...)
    pub changes: Vec<String>,
}

/// Type of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Actions in provisioning order, deletions last
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub has_changes: bool,
    waves: Vec<Vec<String>>,
}

impl Plan {
    /// Compares a previously written template with a fresh one.
    ///
    /// Creates and updates follow the new template's provisioning waves.
    /// Deletions follow the previous template's waves in reverse, so
    /// dependents go before the resources they depend on.
    pub fn diff(previous: Option<&Template>, next: &Template) -> Result<Self> {
        let waves = next.waves()?;
        let mut actions = Vec::new();

        for id in waves.iter().flatten() {
            let Some(resource) = next.resource(id) else {
                continue;
            };
            let action = match previous.and_then(|p| p.resource(id)) {
                None => Action {
                    logical_id: id.clone(),
                    action_type: ActionType::Create,
                    resource_type: resource.resource_type.clone(),
                    changes: Vec::new(),
                },
                Some(old) => {
                    let changes = changed_keys(old, resource);
                    Action {
                        logical_id: id.clone(),
                        action_type: if changes.is_empty() {
                            ActionType::NoOp
                        } else {
                            ActionType::Update
                        },
                        resource_type: resource.resource_type.clone(),
                        changes,
                    }
                }
            };
            actions.push(action);
        }

        if let Some(previous) = previous {
            let old_waves = previous.waves()?;
            for id in old_waves.iter().rev().flat_map(|wave| wave.iter().rev()) {
                if next.resource(id).is_some() {
                    continue;
                }
                if let Some(old) = previous.resource(id) {
                    actions.push(Action {
                        logical_id: id.clone(),
                        action_type: ActionType::Delete,
                        resource_type: old.resource_type.clone(),
                        changes: Vec::new(),
                    });
                }
            }
        }

        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Ok(Self {
            actions,
            has_changes,
            waves,
        })
    }

    /// Provisioning levels of the new template
    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

fn changed_keys(old: &TemplateResource, new: &TemplateResource) -> Vec<String> {
    let mut changes = Vec::new();
    if old.resource_type != new.resource_type {
        changes.push("Type".to_string());
    }

    let mut keys: Vec<&String> = old.properties.keys().chain(new.properties.keys()).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        if old.properties.get(key) != new.properties.get(key) {
            changes.push(format!("Properties.{}", key));
        }
    }

    if old.depends_on != new.depends_on {
        changes.push("DependsOn".to_string());
    }
    if old.deletion_policy != new.deletion_policy {
        changes.push("DeletionPolicy".to_string());
    }
    if old.update_replace_policy != new.update_replace_policy {
        changes.push("UpdateReplacePolicy".to_string());
    }
    changes
}

/// Counts per action type
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
