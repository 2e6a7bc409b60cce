use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use rental_hub::access::{MemoryPolicyStore, PolicySeed};
use rental_hub::error::AppError;
use rental_hub::properties::{
    MemoryPropertyRepository, MemoryReferenceStore, PhotoStorage, PhotoUpload, PropertyService,
    StoredObject, UploadError,
};
use tracing::{info, warn};

pub(crate) type CatalogService =
    PropertyService<MemoryPropertyRepository, MemoryReferenceStore, LocalPhotoStorage>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loads the policy seed, or an empty store (which denies every guarded
/// route) when no file is configured.
pub(crate) async fn load_policy_store(path: Option<&Path>) -> Result<MemoryPolicyStore, AppError> {
    let Some(path) = path else {
        warn!("no policy file configured; guarded routes will deny every request");
        return Ok(MemoryPolicyStore::default());
    };

    let raw = tokio::fs::read_to_string(path).await?;
    let store = MemoryPolicyStore::new(PolicySeed::from_json(&raw)?);
    info!(path = %path.display(), rules = store.rule_count(), "policy seed loaded");
    Ok(store)
}

/// Route the media directory is mounted under.
pub(crate) const MEDIA_ROUTE: &str = "/media";

/// Writes photos under the media directory; routes.rs mounts that directory
/// at [`MEDIA_ROUTE`].
pub(crate) struct LocalPhotoStorage {
    root: PathBuf,
    sequence: AtomicU64,
}

impl LocalPhotoStorage {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

/// Extension for the stored object: the upload's own extension when it
/// names an image type, otherwise the content type's subtype.
fn image_format(photo: &PhotoUpload) -> Option<String> {
    let from_name = Path::new(&photo.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| {
            mime_guess::from_ext(ext)
                .first()
                .is_some_and(|guessed| guessed.type_() == mime_guess::mime::IMAGE)
        });

    from_name.or_else(|| {
        photo
            .content_type
            .parse::<mime_guess::mime::Mime>()
            .ok()
            .filter(|parsed| parsed.type_() == mime_guess::mime::IMAGE)
            .map(|parsed| parsed.subtype().as_str().to_ascii_lowercase())
    })
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    async fn upload(&self, photo: &PhotoUpload) -> Result<StoredObject, UploadError> {
        let format = image_format(photo)
            .ok_or_else(|| UploadError::Rejected(format!("{} is not an image", photo.file_name)))?;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let public_id = format!("{}-{sequence}", Utc::now().format("%Y%m%d%H%M%S%3f"));
        let file_name = format!("{public_id}.{format}");

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| UploadError::Unavailable(err.to_string()))?;
        tokio::fs::write(self.root.join(&file_name), &photo.bytes)
            .await
            .map_err(|err| UploadError::Unavailable(err.to_string()))?;

        Ok(StoredObject {
            secure_url: format!("{MEDIA_ROUTE}/{file_name}"),
            public_id,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(file_name: &str, content_type: &str) -> PhotoUpload {
        PhotoUpload {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0x89, 0x50, 0x4E, 0x47],
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rental-hub-{name}-{}", std::process::id()))
    }

    #[test]
    fn format_prefers_image_extension() {
        assert_eq!(image_format(&photo("front.PNG", "image/png")).as_deref(), Some("png"));
        assert_eq!(image_format(&photo("scan", "image/jpeg")).as_deref(), Some("jpeg"));
        assert_eq!(image_format(&photo("notes.txt", "image/webp")).as_deref(), Some("webp"));
        assert!(image_format(&photo("notes.txt", "text/plain")).is_none());
    }

    #[tokio::test]
    async fn upload_writes_bytes_under_media_dir() {
        let root = scratch_dir("uploads");
        let storage = LocalPhotoStorage::new(&root);

        let stored = storage
            .upload(&photo("front.png", "image/png"))
            .await
            .expect("upload succeeds");

        let written = tokio::fs::read(root.join(stored.file_name()))
            .await
            .expect("file written");
        assert_eq!(written, vec![0x89, 0x50, 0x4E, 0x47]);
        assert!(stored.secure_url.starts_with("/media/"));
        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn missing_policy_file_yields_empty_store() {
        let store = load_policy_store(None).await.expect("empty store");
        assert_eq!(store.rule_count(), 0);
    }

    #[tokio::test]
    async fn policy_file_is_parsed() {
        let root = scratch_dir("policy");
        tokio::fs::create_dir_all(&root).await.expect("dir");
        let path = root.join("policy.json");
        tokio::fs::write(
            &path,
            r#"{
                "assignments": { "ops": ["admin"] },
                "rules": [{ "role": "admin", "resource_type": "property", "action": "delete" }]
            }"#,
        )
        .await
        .expect("write seed");

        let store = load_policy_store(Some(&path)).await.expect("seed loads");
        assert_eq!(store.rule_count(), 1);

        tokio::fs::write(&path, "not json").await.expect("write seed");
        assert!(matches!(
            load_policy_store(Some(&path)).await,
            Err(AppError::Policy(_))
        ));
        tokio::fs::remove_dir_all(&root).await.ok();
    }
}
