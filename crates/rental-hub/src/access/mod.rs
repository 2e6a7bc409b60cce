//! Authorization for already-identified principals.
//!
//! A [`PolicyResolver`] expands a principal into roles and resolves
//! `(role, resource type, action, instance)` against the external rule set.
//! An [`AccessGate`] runs an ordered [`GateChain`] of checks in front of a
//! handler, stopping at the first denial and otherwise attaching a
//! [`GrantedAccess`] to the request.

pub mod gate;
pub mod middleware;
pub mod policy;
pub mod resolver;
pub mod store;

pub use gate::{
    denial_reason, AccessCheck, AccessDenied, AccessGate, Capability, GateChain, GateError,
    GrantedAccess,
};
pub use middleware::{enforce, principal_from_headers, GuardState, InstanceKey, PRINCIPAL_HEADER};
pub use policy::{
    Action, Effect, InstanceId, InstanceScope, PermissionDecision, PolicyRule, PrincipalId,
    ResourceType, RoleName, RuleTable,
};
pub use resolver::{PolicyResolver, Principal};
pub use store::{MemoryPolicyStore, PolicySeed, PolicyStore, PolicyStoreError};
