use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::policy::{Action, PolicyRule, PrincipalId, ResourceType, RoleName, RuleTable};

/// Failure reaching or reading the external policy store.
#[derive(Debug, thiserror::Error)]
pub enum PolicyStoreError {
    #[error("policy store unavailable: {0}")]
    Unavailable(String),
    #[error("policy data malformed: {0}")]
    Malformed(String),
}

/// Externally owned role assignments and rule set. The core only reads it.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Roles of a principal in resolution order. Unknown principals have none.
    async fn roles_of(&self, principal: &PrincipalId) -> Result<Vec<RoleName>, PolicyStoreError>;

    /// Every rule attached to a role, in store-defined priority order.
    async fn rules_of(&self, role: &RoleName) -> Result<Vec<PolicyRule>, PolicyStoreError>;

    /// Rules of a role for one `(resource type, action)` pair.
    async fn rules_for(
        &self,
        role: &RoleName,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        let rules = self.rules_of(role).await?;
        Ok(rules
            .into_iter()
            .filter(|rule| rule.resource_type == resource_type && rule.action == action)
            .collect())
    }
}

/// Serializable snapshot used to seed a [`MemoryPolicyStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySeed {
    #[serde(default)]
    pub assignments: HashMap<PrincipalId, Vec<RoleName>>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl PolicySeed {
    pub fn from_json(raw: &str) -> Result<Self, PolicyStoreError> {
        serde_json::from_str(raw).map_err(|err| PolicyStoreError::Malformed(err.to_string()))
    }
}

/// Read-only policy store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPolicyStore {
    assignments: HashMap<PrincipalId, Vec<RoleName>>,
    table: RuleTable,
}

impl MemoryPolicyStore {
    pub fn new(seed: PolicySeed) -> Self {
        let assignments = seed
            .assignments
            .into_iter()
            .map(|(principal, roles)| (principal, dedup_in_order(roles)))
            .collect();

        Self {
            assignments,
            table: RuleTable::new(seed.rules),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.table.len()
    }
}

fn dedup_in_order(roles: Vec<RoleName>) -> Vec<RoleName> {
    let mut unique: Vec<RoleName> = Vec::with_capacity(roles.len());
    for role in roles {
        if !unique.contains(&role) {
            unique.push(role);
        }
    }
    unique
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn roles_of(&self, principal: &PrincipalId) -> Result<Vec<RoleName>, PolicyStoreError> {
        Ok(self.assignments.get(principal).cloned().unwrap_or_default())
    }

    async fn rules_of(&self, role: &RoleName) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        Ok(self.table.rules_of(role))
    }

    async fn rules_for(
        &self,
        role: &RoleName,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        Ok(self.table.lookup(role, resource_type, action))
    }
}
