use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use super::domain::{Property, PropertyId};
use super::repository::{PropertyRepository, RepositoryError, TransitionOutcome};

/// Soft-delete state. Persisted as the `deleted` boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Active,
    Deleted,
}

impl LifecycleState {
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl Serialize for LifecycleState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_deleted())
    }
}

impl<'de> Deserialize<'de> for LifecycleState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(if bool::deserialize(deserializer)? {
            Self::Deleted
        } else {
            Self::Active
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Delete,
    Restore,
}

impl Transition {
    /// Target state when starting from `from`, or the conflict it raises.
    pub fn apply(self, from: LifecycleState) -> Result<LifecycleState, LifecycleConflict> {
        match (self, from) {
            (Transition::Delete, LifecycleState::Active) => Ok(LifecycleState::Deleted),
            (Transition::Delete, LifecycleState::Deleted) => Err(LifecycleConflict::AlreadyDeleted),
            (Transition::Restore, LifecycleState::Deleted) => Ok(LifecycleState::Active),
            (Transition::Restore, LifecycleState::Active) => Err(LifecycleConflict::NotDeleted),
        }
    }

    /// Conflict raised when the state is not the one this transition leaves.
    pub const fn conflict(self) -> LifecycleConflict {
        match self {
            Transition::Delete => LifecycleConflict::AlreadyDeleted,
            Transition::Restore => LifecycleConflict::NotDeleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleConflict {
    #[error("property already deleted")]
    AlreadyDeleted,
    #[error("property is not deleted")]
    NotDeleted,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("property {0} not found")]
    NotFound(PropertyId),
    #[error(transparent)]
    Conflict(#[from] LifecycleConflict),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Guards the Active/Deleted transitions of one property at a time.
pub struct LifecycleController<R> {
    repository: Arc<R>,
}

impl<R> LifecycleController<R>
where
    R: PropertyRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub async fn delete(&self, id: PropertyId) -> Result<Property, LifecycleError> {
        self.transition(id, Transition::Delete).await
    }

    pub async fn restore(&self, id: PropertyId) -> Result<Property, LifecycleError> {
        self.transition(id, Transition::Restore).await
    }

    async fn transition(
        &self,
        id: PropertyId,
        transition: Transition,
    ) -> Result<Property, LifecycleError> {
        let observed = self
            .repository
            .fetch(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))?
            .lifecycle();
        let next = transition.apply(observed)?;

        match self
            .repository
            .compare_and_set_lifecycle(id, observed, next)
            .await?
        {
            TransitionOutcome::Applied(property) => {
                info!(
                    property = %id,
                    from = observed.label(),
                    to = next.label(),
                    "lifecycle transition applied"
                );
                Ok(property)
            }
            TransitionOutcome::Stale { current } => {
                warn!(
                    property = %id,
                    expected = observed.label(),
                    current = current.label(),
                    "lifecycle transition lost a race"
                );
                Err(transition.conflict().into())
            }
            TransitionOutcome::Missing => Err(LifecycleError::NotFound(id)),
        }
    }
}
