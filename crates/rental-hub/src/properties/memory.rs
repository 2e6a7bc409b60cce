//! In-process stores used by the service binary and the test suites.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::domain::{
    AmenityId, CategoryId, FileId, PlaceId, ProfileId, Property, PropertyDraft, PropertyId,
    PropertyPatch, UserId,
};
use super::lifecycle::LifecycleState;
use super::listing::{ListingFilter, Neighbor, PageRequest};
use super::repository::{
    Amenity, Category, FileRecord, NewFile, Place, Profile, PropertyRepository, ReferenceStore,
    RepositoryError, SearchSlice, TransitionOutcome, User,
};

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("memory store lock poisoned".to_string())
}

/// Properties keyed by their order key.
#[derive(Debug, Default, Clone)]
pub struct MemoryPropertyRepository {
    records: Arc<RwLock<BTreeMap<PropertyId, Property>>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryPropertyRepository {
    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<PropertyId, Property>>, RepositoryError> {
        self.records.read().map_err(|_| poisoned())
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<PropertyId, Property>>, RepositoryError> {
        self.records.write().map_err(|_| poisoned())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PropertyRepository for MemoryPropertyRepository {
    async fn insert(
        &self,
        draft: PropertyDraft,
        photos: Vec<FileId>,
    ) -> Result<Property, RepositoryError> {
        let id = PropertyId(self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        let property = Property::new(id, draft, photos, Utc::now());

        let mut guard = self.write()?;
        if guard.contains_key(&id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(id, property.clone());
        Ok(property)
    }

    async fn fetch(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn search(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> Result<SearchSlice, RepositoryError> {
        let guard = self.read()?;
        let matching: Vec<&Property> = guard
            .values()
            .rev()
            .filter(|property| filter.matches(property))
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit)
            .cloned()
            .collect();

        Ok(SearchSlice { items, total })
    }

    async fn neighbor(
        &self,
        id: PropertyId,
        direction: Neighbor,
    ) -> Result<Option<Property>, RepositoryError> {
        let guard = self.read()?;
        let found = match direction {
            Neighbor::Previous => guard
                .range(..id)
                .rev()
                .map(|(_, property)| property)
                .find(|property| property.is_active()),
            Neighbor::Next => guard
                .range((Bound::Excluded(id), Bound::Unbounded))
                .map(|(_, property)| property)
                .find(|property| property.is_active()),
        };
        Ok(found.cloned())
    }

    async fn update_details(
        &self,
        id: PropertyId,
        patch: &PropertyPatch,
    ) -> Result<Option<Property>, RepositoryError> {
        let mut guard = self.write()?;
        Ok(guard.get_mut(&id).map(|property| {
            patch.apply(&mut property.details);
            property.clone()
        }))
    }

    async fn compare_and_set_lifecycle(
        &self,
        id: PropertyId,
        expected: LifecycleState,
        next: LifecycleState,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let mut guard = self.write()?;
        let Some(property) = guard.get_mut(&id) else {
            return Ok(TransitionOutcome::Missing);
        };

        let current = property.lifecycle();
        if current != expected {
            return Ok(TransitionOutcome::Stale { current });
        }

        property.set_lifecycle(next);
        Ok(TransitionOutcome::Applied(property.clone()))
    }
}

#[derive(Debug, Default)]
struct ReferenceData {
    users: HashMap<UserId, User>,
    profiles: HashMap<ProfileId, Profile>,
    places: HashMap<PlaceId, Place>,
    amenities: HashMap<AmenityId, Amenity>,
    categories: HashMap<CategoryId, Category>,
    files: HashMap<FileId, FileRecord>,
}

/// Reference data held in memory; seeded through the `add_*` helpers.
#[derive(Debug, Default, Clone)]
pub struct MemoryReferenceStore {
    data: Arc<RwLock<ReferenceData>>,
    file_sequence: Arc<AtomicU64>,
}

impl MemoryReferenceStore {
    fn read(&self) -> Result<RwLockReadGuard<'_, ReferenceData>, RepositoryError> {
        self.data.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ReferenceData>, RepositoryError> {
        self.data.write().map_err(|_| poisoned())
    }

    pub fn add_user(&self, user: User) -> Result<(), RepositoryError> {
        self.write()?.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn add_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        self.write()?.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn add_place(&self, place: Place) -> Result<(), RepositoryError> {
        self.write()?.places.insert(place.id.clone(), place);
        Ok(())
    }

    pub fn add_amenity(&self, amenity: Amenity) -> Result<(), RepositoryError> {
        self.write()?.amenities.insert(amenity.id.clone(), amenity);
        Ok(())
    }

    pub fn add_category(&self, category: Category) -> Result<(), RepositoryError> {
        self.write()?.categories.insert(category.id.clone(), category);
        Ok(())
    }

    pub fn file_count(&self) -> usize {
        self.data
            .read()
            .map(|guard| guard.files.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn user_by_nickname(&self, nickname: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|user| user.nickname == nickname)
            .cloned())
    }

    async fn profile(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.read()?.profiles.get(id).cloned())
    }

    async fn place(&self, id: &PlaceId) -> Result<Option<Place>, RepositoryError> {
        Ok(self.read()?.places.get(id).cloned())
    }

    async fn amenity(&self, id: &AmenityId) -> Result<Option<Amenity>, RepositoryError> {
        Ok(self.read()?.amenities.get(id).cloned())
    }

    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.read()?.categories.get(id).cloned())
    }

    async fn file(&self, id: &FileId) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(self.read()?.files.get(id).cloned())
    }

    async fn save_file(&self, file: NewFile) -> Result<FileRecord, RepositoryError> {
        let sequence = self.file_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = FileRecord {
            id: FileId(format!("file-{sequence:06}")),
            name: file.name,
            kind: file.kind,
            path: file.path,
        };
        self.write()?.files.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}
