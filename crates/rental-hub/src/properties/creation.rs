use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Property, PropertyDraft, ValidationError};
use super::repository::{FileKind, NewFile, PropertyRepository, ReferenceStore, RepositoryError};

/// Photo received with a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let is_image = self
            .content_type
            .parse::<mime::Mime>()
            .map(|parsed| parsed.type_() == mime::IMAGE)
            .unwrap_or(false);

        if is_image && !self.bytes.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::InvalidPhoto {
                file_name: self.file_name.clone(),
                content_type: self.content_type.clone(),
            })
        }
    }
}

/// Object written to external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub public_id: String,
    pub format: String,
    pub secure_url: String,
}

impl StoredObject {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.public_id, self.format)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}

/// Outbound object storage for property photos.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn upload(&self, photo: &PhotoUpload) -> Result<StoredObject, UploadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStage {
    Upload,
    RecordFiles,
    SaveProperty,
}

#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Failure of the creation pipeline.
///
/// Objects already written to storage are not removed; they are handed back
/// as `orphaned` so a cleanup process can collect them.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("property creation failed during {stage:?}: {source}")]
    Stage {
        stage: CreationStage,
        #[source]
        source: StageFailure,
        orphaned: Vec<StoredObject>,
    },
}

impl CreationError {
    pub fn orphaned(&self) -> &[StoredObject] {
        match self {
            CreationError::Invalid(_) => &[],
            CreationError::Stage { orphaned, .. } => orphaned,
        }
    }
}

/// Validate, upload photos, record files, then save the property.
pub struct CreationPipeline<R, D, P> {
    repository: Arc<R>,
    reference: Arc<D>,
    storage: Arc<P>,
}

impl<R, D, P> CreationPipeline<R, D, P>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    pub fn new(repository: Arc<R>, reference: Arc<D>, storage: Arc<P>) -> Self {
        Self {
            repository,
            reference,
            storage,
        }
    }

    pub async fn run(
        &self,
        draft: PropertyDraft,
        photos: Vec<PhotoUpload>,
    ) -> Result<Property, CreationError> {
        draft.validate()?;
        for photo in &photos {
            photo.validate()?;
        }

        let mut uploaded = Vec::with_capacity(photos.len());
        for photo in &photos {
            match self.storage.upload(photo).await {
                Ok(stored) => uploaded.push(stored),
                Err(err) => return Err(failed(CreationStage::Upload, err, uploaded)),
            }
        }

        let mut file_ids = Vec::with_capacity(uploaded.len());
        for stored in &uploaded {
            let file = NewFile {
                name: stored.file_name(),
                kind: FileKind::Image,
                path: stored.secure_url.clone(),
            };
            match self.reference.save_file(file).await {
                Ok(record) => file_ids.push(record.id),
                Err(err) => return Err(failed(CreationStage::RecordFiles, err, uploaded)),
            }
        }

        match self.repository.insert(draft, file_ids).await {
            Ok(property) => {
                info!(
                    property = %property.id,
                    owner = %property.owner,
                    photos = property.photos.len(),
                    "property created"
                );
                Ok(property)
            }
            Err(err) => Err(failed(CreationStage::SaveProperty, err, uploaded)),
        }
    }
}

fn failed(
    stage: CreationStage,
    source: impl Into<StageFailure>,
    orphaned: Vec<StoredObject>,
) -> CreationError {
    let source = source.into();
    if orphaned.is_empty() {
        warn!(?stage, error = %source, "property creation failed");
    } else {
        warn!(
            ?stage,
            error = %source,
            orphaned = ?orphaned.iter().map(|object| object.public_id.as_str()).collect::<Vec<_>>(),
            "property creation failed after uploads; objects left for cleanup"
        );
    }
    CreationError::Stage {
        stage,
        source,
        orphaned,
    }
}
