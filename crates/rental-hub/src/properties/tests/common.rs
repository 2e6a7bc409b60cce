use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::access::{
    AccessGate, Action, MemoryPolicyStore, PolicyRule, PolicySeed, PrincipalId, ResourceType,
    RoleName,
};
use crate::properties::creation::{PhotoStorage, PhotoUpload, StoredObject, UploadError};
use crate::properties::domain::{
    Address, AmenityId, CategoryId, FileId, PlaceId, ProfileId, Property, PropertyDetails,
    PropertyDraft, PropertyId, PropertyPatch, UserId,
};
use crate::properties::lifecycle::LifecycleState;
use crate::properties::listing::{ListingFilter, Neighbor, PageRequest};
use crate::properties::memory::{MemoryPropertyRepository, MemoryReferenceStore};
use crate::properties::repository::{
    Amenity, Category, Place, PlaceKind, Profile, PropertyRepository, RepositoryError,
    SearchSlice, TransitionOutcome, User,
};
use crate::properties::{admin_router, property_router, PropertyService};

pub(super) type TestService =
    PropertyService<MemoryPropertyRepository, MemoryReferenceStore, RecordingStorage>;

pub(super) fn draft(owner: &str, title: &str) -> PropertyDraft {
    PropertyDraft {
        owner: UserId(owner.to_string()),
        details: PropertyDetails {
            title: title.to_string(),
            description: format!("{title} near the park"),
            category: Some(CategoryId("apartment".to_string())),
            amenities: vec![AmenityId("parking".to_string())],
            address: Address {
                line1: "Av. Reforma 10".to_string(),
                country: Some(PlaceId("mx".to_string())),
                city: Some(PlaceId("cdmx".to_string())),
                ..Address::default()
            },
            cost: 12_000,
            ..PropertyDetails::default()
        },
    }
}

pub(super) fn photo(name: &str) -> PhotoUpload {
    PhotoUpload {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

pub(super) fn title_patch(title: &str) -> PropertyPatch {
    PropertyPatch {
        title: Some(title.to_string()),
        ..PropertyPatch::default()
    }
}

pub(super) fn reference_store() -> MemoryReferenceStore {
    let store = MemoryReferenceStore::default();
    store
        .add_user(User {
            id: UserId("u-alice".to_string()),
            nickname: "alice".to_string(),
            profile: Some(ProfileId("p-alice".to_string())),
        })
        .expect("seed user");
    store
        .add_user(User {
            id: UserId("u-bruno".to_string()),
            nickname: "bruno".to_string(),
            profile: None,
        })
        .expect("seed user");
    store
        .add_profile(Profile {
            id: ProfileId("p-alice".to_string()),
            display_name: "Alice".to_string(),
            address: Address {
                line1: "Calle 5".to_string(),
                city: Some(PlaceId("cdmx".to_string())),
                ..Address::default()
            },
        })
        .expect("seed profile");
    store
        .add_place(Place {
            id: PlaceId("mx".to_string()),
            kind: PlaceKind::Country,
            name: "Mexico".to_string(),
        })
        .expect("seed place");
    store
        .add_place(Place {
            id: PlaceId("cdmx".to_string()),
            kind: PlaceKind::City,
            name: "Ciudad de Mexico".to_string(),
        })
        .expect("seed place");
    store
        .add_amenity(Amenity {
            id: AmenityId("parking".to_string()),
            name: "Parking".to_string(),
        })
        .expect("seed amenity");
    store
        .add_category(Category {
            id: CategoryId("apartment".to_string()),
            name: "Apartment".to_string(),
        })
        .expect("seed category");
    store
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) repository: Arc<MemoryPropertyRepository>,
    pub(super) reference: Arc<MemoryReferenceStore>,
    pub(super) storage: Arc<RecordingStorage>,
}

pub(super) fn harness() -> Harness {
    harness_with_storage(RecordingStorage::default())
}

pub(super) fn harness_with_storage(storage: RecordingStorage) -> Harness {
    let repository = Arc::new(MemoryPropertyRepository::default());
    let reference = Arc::new(reference_store());
    let storage = Arc::new(storage);
    let service = Arc::new(PropertyService::new(
        Arc::clone(&repository),
        Arc::clone(&reference),
        Arc::clone(&storage),
    ));
    Harness {
        service,
        repository,
        reference,
        storage,
    }
}

/// Inserts `count` properties owned by alice, titled `Listing {n}`.
pub(super) async fn seed_properties(repository: &MemoryPropertyRepository, count: usize) {
    for n in 1..=count {
        repository
            .insert(draft("u-alice", &format!("Listing {n}")), Vec::new())
            .await
            .expect("insert property");
    }
}

pub(super) async fn soft_delete(repository: &MemoryPropertyRepository, id: u64) {
    let outcome = repository
        .compare_and_set_lifecycle(PropertyId(id), LifecycleState::Active, LifecycleState::Deleted)
        .await
        .expect("transition");
    assert!(matches!(outcome, TransitionOutcome::Applied(_)));
}

/// Photo storage that records uploads and can fail on a given attempt.
#[derive(Default)]
pub(super) struct RecordingStorage {
    uploads: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail_on_attempt: Option<usize>,
}

impl RecordingStorage {
    pub(super) fn failing_on(attempt: usize) -> Self {
        Self {
            fail_on_attempt: Some(attempt),
            ..Self::default()
        }
    }

    pub(super) fn uploads(&self) -> Vec<String> {
        self.uploads.lock().expect("storage mutex poisoned").clone()
    }
}

#[async_trait]
impl PhotoStorage for RecordingStorage {
    async fn upload(&self, photo: &PhotoUpload) -> Result<StoredObject, UploadError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_attempt == Some(attempt) {
            return Err(UploadError::Unavailable("bucket offline".to_string()));
        }

        let public_id = format!("properties/{attempt}-{}", photo.file_name.replace('.', "-"));
        self.uploads
            .lock()
            .expect("storage mutex poisoned")
            .push(public_id.clone());
        Ok(StoredObject {
            secure_url: format!("https://media.test/{public_id}.jpg"),
            format: "jpg".to_string(),
            public_id,
        })
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

/// Repository that fails every call.
pub(super) struct UnavailableRepository;

#[async_trait]
impl PropertyRepository for UnavailableRepository {
    async fn insert(
        &self,
        _draft: PropertyDraft,
        _photos: Vec<FileId>,
    ) -> Result<Property, RepositoryError> {
        Err(offline())
    }

    async fn fetch(&self, _id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        Err(offline())
    }

    async fn search(
        &self,
        _filter: &ListingFilter,
        _page: PageRequest,
    ) -> Result<SearchSlice, RepositoryError> {
        Err(offline())
    }

    async fn neighbor(
        &self,
        _id: PropertyId,
        _direction: Neighbor,
    ) -> Result<Option<Property>, RepositoryError> {
        Err(offline())
    }

    async fn update_details(
        &self,
        _id: PropertyId,
        _patch: &PropertyPatch,
    ) -> Result<Option<Property>, RepositoryError> {
        Err(offline())
    }

    async fn compare_and_set_lifecycle(
        &self,
        _id: PropertyId,
        _expected: LifecycleState,
        _next: LifecycleState,
    ) -> Result<TransitionOutcome, RepositoryError> {
        Err(offline())
    }
}

/// Repository where a competing writer commits `rival` between the
/// controller's read and its compare-and-set.
pub(super) struct RacingRepository {
    inner: Arc<MemoryPropertyRepository>,
    rival: LifecycleState,
    applied: AtomicUsize,
}

impl RacingRepository {
    pub(super) fn new(inner: Arc<MemoryPropertyRepository>, rival: LifecycleState) -> Self {
        Self {
            inner,
            rival,
            applied: AtomicUsize::new(0),
        }
    }

    /// Transitions applied on behalf of the controller, not the rival.
    pub(super) fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PropertyRepository for RacingRepository {
    async fn insert(
        &self,
        draft: PropertyDraft,
        photos: Vec<FileId>,
    ) -> Result<Property, RepositoryError> {
        self.inner.insert(draft, photos).await
    }

    async fn fetch(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        let observed = self.inner.fetch(id).await?;
        if let Some(property) = &observed {
            self.inner
                .compare_and_set_lifecycle(id, property.lifecycle(), self.rival)
                .await?;
        }
        Ok(observed)
    }

    async fn search(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> Result<SearchSlice, RepositoryError> {
        self.inner.search(filter, page).await
    }

    async fn neighbor(
        &self,
        id: PropertyId,
        direction: Neighbor,
    ) -> Result<Option<Property>, RepositoryError> {
        self.inner.neighbor(id, direction).await
    }

    async fn update_details(
        &self,
        id: PropertyId,
        patch: &PropertyPatch,
    ) -> Result<Option<Property>, RepositoryError> {
        self.inner.update_details(id, patch).await
    }

    async fn compare_and_set_lifecycle(
        &self,
        id: PropertyId,
        expected: LifecycleState,
        next: LifecycleState,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let outcome = self
            .inner
            .compare_and_set_lifecycle(id, expected, next)
            .await?;
        if matches!(outcome, TransitionOutcome::Applied(_)) {
            self.applied.fetch_add(1, Ordering::SeqCst);
        }
        Ok(outcome)
    }
}

/// `root` is an admin, `alice` owns property 1, `bruno` may only create.
pub(super) fn policy_store() -> MemoryPolicyStore {
    let admin = RoleName::admin();
    let landlord = RoleName::new("landlord");
    let alice = RoleName::new("user:alice");

    let mut assignments = HashMap::new();
    assignments.insert(PrincipalId("root".to_string()), vec![admin.clone()]);
    assignments.insert(
        PrincipalId("alice".to_string()),
        vec![alice.clone(), landlord.clone()],
    );
    assignments.insert(PrincipalId("bruno".to_string()), vec![landlord.clone()]);

    MemoryPolicyStore::new(PolicySeed {
        assignments,
        rules: vec![
            PolicyRule::allow(admin.clone(), ResourceType::Property, Action::Update),
            PolicyRule::allow(admin.clone(), ResourceType::Property, Action::Delete),
            PolicyRule::allow(admin, ResourceType::Property, Action::Restore),
            PolicyRule::allow(landlord, ResourceType::Property, Action::Create),
            PolicyRule::allow(alice.clone(), ResourceType::Property, Action::Update)
                .on_instance("1"),
            PolicyRule::allow(alice, ResourceType::Property, Action::Delete).on_instance("1"),
        ],
    })
}

pub(super) fn router(service: Arc<TestService>) -> axum::Router {
    let gate = Arc::new(AccessGate::new(Arc::new(policy_store())));
    property_router(Arc::clone(&gate), service).merge(admin_router(gate))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
