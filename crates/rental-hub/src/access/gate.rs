use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::policy::{
    Action, InstanceId, PermissionDecision, PolicyRule, PrincipalId, ResourceType, RoleName,
    RuleTarget,
};
use super::resolver::{PolicyResolver, Principal};
use super::store::{PolicyStore, PolicyStoreError};
use crate::error::{Classified, ErrorKind};

/// Capability a check requires: `(resource type, action, optional instance)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub resource_type: ResourceType,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<InstanceId>,
}

/// One link of a gate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCheck {
    /// Coarse check that the principal holds a role. On success the role's
    /// policies are attached to the granted context.
    RoleMembership(RoleName),
    /// Fine-grained check on the instance named by the request.
    Instance {
        resource_type: ResourceType,
        action: Action,
        /// Human-readable activity used in the denial reason.
        activity: String,
    },
    /// Class-level check for actions that have no instance yet.
    Global {
        resource_type: ResourceType,
        action: Action,
    },
}

/// Ordered list of checks guarding one endpoint. Order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateChain {
    checks: Vec<AccessCheck>,
}

impl GateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_role(mut self, role: RoleName) -> Self {
        self.checks.push(AccessCheck::RoleMembership(role));
        self
    }

    pub fn require_instance(
        mut self,
        resource_type: ResourceType,
        action: Action,
        activity: impl Into<String>,
    ) -> Self {
        self.checks.push(AccessCheck::Instance {
            resource_type,
            action,
            activity: activity.into(),
        });
        self
    }

    pub fn require_global(mut self, resource_type: ResourceType, action: Action) -> Self {
        self.checks.push(AccessCheck::Global {
            resource_type,
            action,
        });
        self
    }

    pub fn checks(&self) -> &[AccessCheck] {
        &self.checks
    }
}

/// Request-scoped context attached once every check in a chain passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantedAccess {
    pub principal: Principal,
    /// Decision of the last check in the chain.
    pub decision: PermissionDecision,
    /// Policies of the roles matched by role-membership checks.
    pub role_policies: Vec<PolicyRule>,
}

/// Reason a chain stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("role `{0}` required")]
    MissingRole(RoleName),
    #[error("{reason}")]
    Instance {
        capability: Capability,
        reason: String,
    },
    #[error("not allowed to {action} {resource_type}")]
    Global {
        resource_type: ResourceType,
        action: Action,
    },
    #[error("request does not name a {0} instance")]
    MissingInstance(ResourceType),
    #[error("route has no access checks")]
    EmptyChain,
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Denied(#[from] AccessDenied),
    #[error(transparent)]
    Policy(#[from] PolicyStoreError),
    #[error("`{0}` is not a valid instance id")]
    MalformedInstance(String),
}

impl Classified for GateError {
    fn kind(&self) -> ErrorKind {
        match self {
            GateError::Denied(_) => ErrorKind::Forbidden,
            GateError::Policy(_) => ErrorKind::Unclassified,
            GateError::MalformedInstance(_) => ErrorKind::Validation,
        }
    }

    fn message(&self) -> Option<String> {
        match self {
            GateError::Denied(AccessDenied::Instance { reason, .. }) => Some(reason.clone()),
            GateError::Denied(_) => None,
            GateError::Policy(err) => Some(err.to_string()),
            GateError::MalformedInstance(_) => Some(self.to_string()),
        }
    }
}

pub fn denial_reason(activity: &str) -> String {
    format!("Your account is not allowed to {activity}")
}

/// Ordered chain evaluator placed in front of handlers.
pub struct AccessGate<S> {
    resolver: PolicyResolver<S>,
}

impl<S> Clone for AccessGate<S> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<S> AccessGate<S>
where
    S: PolicyStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            resolver: PolicyResolver::new(store),
        }
    }

    pub fn resolver(&self) -> &PolicyResolver<S> {
        &self.resolver
    }

    /// Run `chain` for `principal`, stopping at the first denial. A chain
    /// without checks grants nothing.
    pub async fn authorize(
        &self,
        principal: &PrincipalId,
        chain: &GateChain,
        instance: Option<&InstanceId>,
    ) -> Result<GrantedAccess, GateError> {
        if chain.checks().is_empty() {
            warn!(principal = %principal, "access denied: empty gate chain");
            return Err(AccessDenied::EmptyChain.into());
        }
        let principal = self.resolver.principal(principal).await?;
        let mut decision = PermissionDecision::deny();
        let mut role_policies = Vec::new();

        for (position, check) in chain.checks().iter().enumerate() {
            match self.evaluate(&principal, check, instance).await {
                Ok(CheckPass { decision: passed, policies }) => {
                    decision = passed;
                    role_policies.extend(policies);
                }
                Err(err) => {
                    warn!(
                        principal = %principal.id,
                        check = position,
                        error = %err,
                        "access denied"
                    );
                    return Err(err);
                }
            }
        }

        info!(
            principal = %principal.id,
            checks = chain.checks().len(),
            "access granted"
        );

        Ok(GrantedAccess {
            principal,
            decision,
            role_policies,
        })
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        check: &AccessCheck,
        instance: Option<&InstanceId>,
    ) -> Result<CheckPass, GateError> {
        match check {
            AccessCheck::RoleMembership(role) => {
                if !principal.has_role(role) {
                    return Err(AccessDenied::MissingRole(role.clone()).into());
                }
                let policies = self.resolver.rules_of(role).await?;
                Ok(CheckPass {
                    decision: PermissionDecision::membership(),
                    policies,
                })
            }
            AccessCheck::Instance {
                resource_type,
                action,
                activity,
            } => {
                let instance =
                    instance.ok_or(AccessDenied::MissingInstance(*resource_type))?;
                let decision = self
                    .resolver
                    .decide(principal, *resource_type, *action, RuleTarget::Instance(instance))
                    .await?;
                if !decision.granted {
                    return Err(AccessDenied::Instance {
                        capability: Capability {
                            resource_type: *resource_type,
                            action: *action,
                            instance: Some(instance.clone()),
                        },
                        reason: denial_reason(activity),
                    }
                    .into());
                }
                Ok(CheckPass::from(decision))
            }
            AccessCheck::Global {
                resource_type,
                action,
            } => {
                let decision = self
                    .resolver
                    .decide(principal, *resource_type, *action, RuleTarget::Class)
                    .await?;
                if !decision.granted {
                    return Err(AccessDenied::Global {
                        resource_type: *resource_type,
                        action: *action,
                    }
                    .into());
                }
                Ok(CheckPass::from(decision))
            }
        }
    }
}

struct CheckPass {
    decision: PermissionDecision,
    policies: Vec<PolicyRule>,
}

impl From<PermissionDecision> for CheckPass {
    fn from(decision: PermissionDecision) -> Self {
        Self {
            decision,
            policies: Vec::new(),
        }
    }
}
