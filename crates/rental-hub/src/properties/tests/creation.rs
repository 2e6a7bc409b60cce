use std::sync::Arc;

use super::common::*;
use crate::error::{Classified, ErrorKind};
use crate::properties::creation::{CreationError, CreationPipeline, CreationStage};
use crate::properties::domain::ValidationError;
use crate::properties::repository::ReferenceStore;
use crate::properties::PropertyServiceError;

#[tokio::test]
async fn creates_property_with_recorded_photos() {
    let harness = harness();

    let property = harness
        .service
        .create(
            draft("u-alice", "Garden flat"),
            vec![photo("front.jpg"), photo("kitchen.png")],
        )
        .await
        .expect("creation succeeds");

    assert!(property.is_active());
    assert_eq!(property.photos.len(), 2);
    assert_eq!(harness.storage.uploads().len(), 2);
    assert_eq!(harness.reference.file_count(), 2);

    let file = harness
        .reference
        .file(&property.photos[0])
        .await
        .expect("lookup")
        .expect("file recorded");
    assert_eq!(file.name, "properties/1-front-jpg.jpg");
    assert!(file.path.starts_with("https://media.test/"));
}

#[tokio::test]
async fn invalid_input_uploads_nothing() {
    let harness = harness();
    let mut pdf = photo("lease.pdf");
    pdf.content_type = "application/pdf".to_string();

    let err = harness
        .service
        .create(draft("u-alice", "Garden flat"), vec![photo("front.jpg"), pdf])
        .await
        .expect_err("pdf is not a photo");

    assert!(matches!(
        err,
        PropertyServiceError::Validation(ValidationError::InvalidPhoto { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(harness.storage.uploads().is_empty());
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let harness = harness();

    let err = harness
        .service
        .create(draft("u-alice", "  "), Vec::new())
        .await
        .expect_err("title required");

    assert!(matches!(
        err,
        PropertyServiceError::Validation(ValidationError::MissingTitle)
    ));
}

#[tokio::test]
async fn upload_failure_reports_earlier_uploads_as_orphaned() {
    let harness = harness_with_storage(RecordingStorage::failing_on(2));

    let err = harness
        .service
        .create(
            draft("u-alice", "Garden flat"),
            vec![photo("a.jpg"), photo("b.jpg"), photo("c.jpg")],
        )
        .await
        .expect_err("second upload fails");

    let PropertyServiceError::Creation(creation) = &err else {
        panic!("expected creation failure, got {err:?}");
    };
    assert!(matches!(
        creation,
        CreationError::Stage {
            stage: CreationStage::Upload,
            ..
        }
    ));
    assert_eq!(creation.orphaned().len(), 1);
    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert_eq!(harness.reference.file_count(), 0);
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn save_failure_leaves_files_and_uploads_behind() {
    let storage = Arc::new(RecordingStorage::default());
    let reference = Arc::new(reference_store());
    let pipeline = CreationPipeline::new(
        Arc::new(UnavailableRepository),
        Arc::clone(&reference),
        Arc::clone(&storage),
    );

    let err = pipeline
        .run(draft("u-alice", "Garden flat"), vec![photo("a.jpg"), photo("b.jpg")])
        .await
        .expect_err("database offline");

    assert!(matches!(
        err,
        CreationError::Stage {
            stage: CreationStage::SaveProperty,
            ..
        }
    ));
    assert_eq!(err.orphaned().len(), 2);
    assert_eq!(reference.file_count(), 2);
    assert_eq!(storage.uploads().len(), 2);
}
