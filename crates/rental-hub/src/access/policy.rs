use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named group of permissions assigned to principals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(pub String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn admin() -> Self {
        Self::new("admin")
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one concrete resource as seen by the policy store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Property,
    Category,
    Coupon,
    Order,
    User,
}

impl ResourceType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Category => "category",
            Self::Coupon => "coupon",
            Self::Order => "order",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Restore,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which instances a rule applies to. Serialized as the raw id or `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceScope {
    #[default]
    Any,
    Exact(InstanceId),
}

impl From<String> for InstanceScope {
    fn from(value: String) -> Self {
        if value == "*" {
            Self::Any
        } else {
            Self::Exact(InstanceId(value))
        }
    }
}

impl From<InstanceScope> for String {
    fn from(value: InstanceScope) -> Self {
        match value {
            InstanceScope::Any => "*".to_string(),
            InstanceScope::Exact(id) => id.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    Allow,
}

/// One row of the externally owned rule set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    pub role: RoleName,
    pub resource_type: ResourceType,
    pub action: Action,
    #[serde(default)]
    pub instance: InstanceScope,
    #[serde(default)]
    pub effect: Effect,
}

impl PolicyRule {
    pub fn allow(role: RoleName, resource_type: ResourceType, action: Action) -> Self {
        Self {
            role,
            resource_type,
            action,
            instance: InstanceScope::Any,
            effect: Effect::Allow,
        }
    }

    pub fn on_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = InstanceScope::Exact(InstanceId(instance.into()));
        self
    }
}

/// Result of resolving a capability against the rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<PolicyRule>,
}

impl PermissionDecision {
    pub fn deny() -> Self {
        Self {
            granted: false,
            matched_rule: None,
        }
    }

    pub fn granted_by(rule: PolicyRule) -> Self {
        Self {
            granted: true,
            matched_rule: Some(rule),
        }
    }

    /// Grant that is not backed by a specific rule (role membership checks).
    pub fn membership() -> Self {
        Self {
            granted: true,
            matched_rule: None,
        }
    }
}

/// Rule subset eligible for a resolution.
#[derive(Debug, Clone, Copy)]
pub enum RuleTarget<'a> {
    Instance(&'a InstanceId),
    Class,
}

/// Pick the winning rule for one role: exact instance first, then wildcard.
pub fn select_rule<'a>(
    candidates: &'a [PolicyRule],
    target: RuleTarget<'_>,
) -> Option<&'a PolicyRule> {
    let exact = match target {
        RuleTarget::Instance(instance) => candidates.iter().find(|rule| {
            matches!(&rule.instance, InstanceScope::Exact(id) if id == instance)
        }),
        RuleTarget::Class => None,
    };

    exact.or_else(|| {
        candidates
            .iter()
            .find(|rule| rule.instance == InstanceScope::Any)
    })
}

type RuleKey = (RoleName, ResourceType, Action);

/// Rule set indexed by `(role, resource type, action)`.
///
/// Insertion order is the store-defined priority and is preserved both for
/// `rules_of` and within each indexed bucket.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<PolicyRule>,
    index: HashMap<RuleKey, Vec<usize>>,
}

impl RuleTable {
    pub fn new(rules: impl IntoIterator<Item = PolicyRule>) -> Self {
        let mut table = Self::default();
        for rule in rules {
            table.push(rule);
        }
        table
    }

    pub fn push(&mut self, rule: PolicyRule) {
        let key = (rule.role.clone(), rule.resource_type, rule.action);
        self.index.entry(key).or_default().push(self.rules.len());
        self.rules.push(rule);
    }

    pub fn rules_of(&self, role: &RoleName) -> Vec<PolicyRule> {
        self.rules
            .iter()
            .filter(|rule| &rule.role == role)
            .cloned()
            .collect()
    }

    pub fn lookup(
        &self,
        role: &RoleName,
        resource_type: ResourceType,
        action: Action,
    ) -> Vec<PolicyRule> {
        self.index
            .get(&(role.clone(), resource_type, action))
            .map(|positions| {
                positions
                    .iter()
                    .map(|&position| self.rules[position].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
