use std::sync::Arc;

use tracing::info;

use super::creation::{CreationError, CreationPipeline, PhotoStorage, PhotoUpload};
use super::domain::{Property, PropertyDraft, PropertyId, PropertyPatch, ValidationError};
use super::expansion::ExpandedProperty;
use super::lifecycle::{LifecycleConflict, LifecycleController, LifecycleError};
use super::listing::{ListingError, ListingPaginator, ListingQuery, Page, PropertyView};
use super::repository::{PropertyRepository, ReferenceStore, RepositoryError};
use crate::error::{Classified, ErrorKind};

/// Service composing listing, lifecycle, creation, and update.
pub struct PropertyService<R, D, P> {
    repository: Arc<R>,
    listing: ListingPaginator<R, D>,
    lifecycle: LifecycleController<R>,
    creation: CreationPipeline<R, D, P>,
}

impl<R, D, P> PropertyService<R, D, P>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    pub fn new(repository: Arc<R>, reference: Arc<D>, storage: Arc<P>) -> Self {
        Self {
            listing: ListingPaginator::new(Arc::clone(&repository), Arc::clone(&reference)),
            lifecycle: LifecycleController::new(Arc::clone(&repository)),
            creation: CreationPipeline::new(Arc::clone(&repository), reference, storage),
            repository,
        }
    }

    pub async fn list(
        &self,
        query: &ListingQuery,
    ) -> Result<Page<ExpandedProperty>, PropertyServiceError> {
        Ok(self.listing.list(query).await?)
    }

    pub async fn get(&self, id: PropertyId) -> Result<PropertyView, PropertyServiceError> {
        Ok(self.listing.get(id).await?)
    }

    pub async fn create(
        &self,
        draft: PropertyDraft,
        photos: Vec<PhotoUpload>,
    ) -> Result<Property, PropertyServiceError> {
        Ok(self.creation.run(draft, photos).await?)
    }

    pub async fn update(
        &self,
        id: PropertyId,
        patch: PropertyPatch,
    ) -> Result<(), PropertyServiceError> {
        patch.validate()?;
        self.repository
            .update_details(id, &patch)
            .await?
            .ok_or(PropertyServiceError::NotFound(id))?;
        info!(property = %id, "property updated");
        Ok(())
    }

    pub async fn delete(&self, id: PropertyId) -> Result<(), PropertyServiceError> {
        self.lifecycle.delete(id).await?;
        Ok(())
    }

    pub async fn restore(&self, id: PropertyId) -> Result<(), PropertyServiceError> {
        self.lifecycle.restore(id).await?;
        Ok(())
    }
}

/// Error raised by the property service.
#[derive(Debug, thiserror::Error)]
pub enum PropertyServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Body, path, or query that could not be decoded.
    #[error("{0}")]
    MalformedRequest(String),
    #[error("property {0} not found")]
    NotFound(PropertyId),
    #[error(transparent)]
    Conflict(#[from] LifecycleConflict),
    #[error(transparent)]
    Creation(CreationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<LifecycleError> for PropertyServiceError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::NotFound(id) => Self::NotFound(id),
            LifecycleError::Conflict(conflict) => Self::Conflict(conflict),
            LifecycleError::Repository(err) => Self::Repository(err),
        }
    }
}

impl From<ListingError> for PropertyServiceError {
    fn from(value: ListingError) -> Self {
        match value {
            ListingError::NotFound(id) => Self::NotFound(id),
            ListingError::Repository(err) => Self::Repository(err),
        }
    }
}

impl From<CreationError> for PropertyServiceError {
    fn from(value: CreationError) -> Self {
        match value {
            CreationError::Invalid(err) => Self::Validation(err),
            other => Self::Creation(other),
        }
    }
}

impl Classified for PropertyServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            PropertyServiceError::Validation(_) | PropertyServiceError::MalformedRequest(_) => {
                ErrorKind::Validation
            }
            PropertyServiceError::NotFound(_) => ErrorKind::NotFound,
            PropertyServiceError::Conflict(_) => ErrorKind::Conflict,
            PropertyServiceError::Creation(_) | PropertyServiceError::Repository(_) => {
                ErrorKind::Unclassified
            }
        }
    }
}
