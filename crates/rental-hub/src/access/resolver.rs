use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::policy::{
    select_rule, Action, InstanceId, PermissionDecision, PolicyRule, PrincipalId, ResourceType,
    RoleName, RuleTarget,
};
use super::store::{PolicyStore, PolicyStoreError};

/// Identified caller together with its resolved roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub roles: Vec<RoleName>,
}

impl Principal {
    pub fn has_role(&self, role: &RoleName) -> bool {
        self.roles.contains(role)
    }
}

/// Resolves principals to roles and capabilities to decisions.
///
/// Holds no state of its own; every call reads through to the store.
pub struct PolicyResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for PolicyResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> PolicyResolver<S>
where
    S: PolicyStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn roles_of(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<RoleName>, PolicyStoreError> {
        self.store.roles_of(principal).await
    }

    pub async fn rules_of(&self, role: &RoleName) -> Result<Vec<PolicyRule>, PolicyStoreError> {
        self.store.rules_of(role).await
    }

    pub async fn principal(&self, id: &PrincipalId) -> Result<Principal, PolicyStoreError> {
        let roles = self.store.roles_of(id).await?;
        Ok(Principal {
            id: id.clone(),
            roles,
        })
    }

    /// Instance-scoped check: exact instance rules win over wildcard rules
    /// within a role, and roles are tried in resolution order.
    pub async fn can(
        &self,
        principal: &PrincipalId,
        instance: &InstanceId,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<PermissionDecision, PolicyStoreError> {
        let principal = self.principal(principal).await?;
        self.decide(&principal, resource_type, action, RuleTarget::Instance(instance))
            .await
    }

    /// Class-scoped check for actions with no instance yet, such as creation.
    pub async fn can_global(
        &self,
        principal: &PrincipalId,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<PermissionDecision, PolicyStoreError> {
        let principal = self.principal(principal).await?;
        self.decide(&principal, resource_type, action, RuleTarget::Class)
            .await
    }

    pub(crate) async fn decide(
        &self,
        principal: &Principal,
        resource_type: ResourceType,
        action: Action,
        target: RuleTarget<'_>,
    ) -> Result<PermissionDecision, PolicyStoreError> {
        for role in &principal.roles {
            let candidates = self.store.rules_for(role, resource_type, action).await?;
            if let Some(rule) = select_rule(&candidates, target) {
                debug!(
                    principal = %principal.id,
                    %role,
                    %resource_type,
                    %action,
                    "policy rule matched"
                );
                return Ok(PermissionDecision::granted_by(rule.clone()));
            }
        }

        Ok(PermissionDecision::deny())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::policy::InstanceScope;
    use crate::access::store::{MemoryPolicyStore, PolicySeed};
    use std::collections::HashMap;

    fn pid(raw: &str) -> PrincipalId {
        PrincipalId(raw.to_string())
    }

    fn iid(raw: &str) -> InstanceId {
        InstanceId(raw.to_string())
    }

    fn resolver() -> PolicyResolver<MemoryPolicyStore> {
        let owner = RoleName::new("owner");
        let support = RoleName::new("support");
        let mut assignments = HashMap::new();
        assignments.insert(pid("alice"), vec![owner.clone()]);
        assignments.insert(pid("sam"), vec![support.clone(), owner.clone()]);

        let seed = PolicySeed {
            assignments,
            rules: vec![
                PolicyRule::allow(owner.clone(), ResourceType::Property, Action::Update)
                    .on_instance("10"),
                PolicyRule::allow(owner.clone(), ResourceType::Property, Action::Create),
                PolicyRule::allow(support.clone(), ResourceType::Order, Action::Read),
            ],
        };
        PolicyResolver::new(Arc::new(MemoryPolicyStore::new(seed)))
    }

    #[tokio::test]
    async fn exact_instance_rule_grants_only_that_instance() {
        let resolver = resolver();
        let granted = resolver
            .can(&pid("alice"), &iid("10"), ResourceType::Property, Action::Update)
            .await
            .expect("resolves");
        assert!(granted.granted);
        let rule = granted.matched_rule.expect("rule attached");
        assert_eq!(rule.instance, InstanceScope::Exact(iid("10")));

        let denied = resolver
            .can(&pid("alice"), &iid("11"), ResourceType::Property, Action::Update)
            .await
            .expect("resolves");
        assert_eq!(denied, PermissionDecision::deny());
    }

    #[tokio::test]
    async fn wildcard_rule_covers_any_instance() {
        let resolver = resolver();
        let decision = resolver
            .can(&pid("sam"), &iid("order:9"), ResourceType::Order, Action::Read)
            .await
            .expect("resolves");
        assert!(decision.granted);
        assert_eq!(
            decision.matched_rule.map(|rule| rule.role),
            Some(RoleName::new("support")),
            "first role in resolution order wins"
        );
    }

    #[tokio::test]
    async fn global_check_ignores_instance_rules() {
        let resolver = resolver();
        let create = resolver
            .can_global(&pid("alice"), ResourceType::Property, Action::Create)
            .await
            .expect("resolves");
        assert!(create.granted);

        let update = resolver
            .can_global(&pid("alice"), ResourceType::Property, Action::Update)
            .await
            .expect("resolves");
        assert!(!update.granted, "instance-only rule is not class-wide");
    }

    #[tokio::test]
    async fn unknown_principal_is_denied_everything() {
        let resolver = resolver();
        let principal = resolver.principal(&pid("mallory")).await.expect("resolves");
        assert!(principal.roles.is_empty());

        let decision = resolver
            .can_global(&pid("mallory"), ResourceType::Property, Action::Create)
            .await
            .expect("resolves");
        assert!(!decision.granted);
    }

    #[tokio::test]
    async fn rules_of_lists_role_policies() {
        let resolver = resolver();
        let rules = resolver
            .rules_of(&RoleName::new("owner"))
            .await
            .expect("resolves");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, Action::Update);
    }
}
