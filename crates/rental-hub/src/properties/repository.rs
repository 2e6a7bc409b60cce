use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    Address, AmenityId, CategoryId, FileId, PlaceId, ProfileId, Property, PropertyDraft,
    PropertyId, PropertyPatch, UserId,
};
use super::lifecycle::LifecycleState;
use super::listing::{ListingFilter, Neighbor, PageRequest};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Result of a compare-and-swap on the lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(Property),
    /// The stored state no longer matched the expected one; nothing written.
    Stale { current: LifecycleState },
    Missing,
}

/// One slice of a filtered, newest-first result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSlice {
    pub items: Vec<Property>,
    /// Matches across all pages.
    pub total: u64,
}

/// Storage abstraction for properties.
///
/// Implementations must order search results by descending [`PropertyId`]
/// and resolve neighbors against the same key, skipping deleted properties.
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    /// Persist a new property, assigning the next order key.
    async fn insert(
        &self,
        draft: PropertyDraft,
        photos: Vec<FileId>,
    ) -> Result<Property, RepositoryError>;

    async fn fetch(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError>;

    async fn search(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> Result<SearchSlice, RepositoryError>;

    /// Nearest active property strictly before or after `id`.
    async fn neighbor(
        &self,
        id: PropertyId,
        direction: Neighbor,
    ) -> Result<Option<Property>, RepositoryError>;

    /// Apply `patch`; `Ok(None)` when the property does not exist.
    async fn update_details(
        &self,
        id: PropertyId,
        patch: &PropertyPatch,
    ) -> Result<Option<Property>, RepositoryError>;

    /// Write `next` only if the stored state still equals `expected`.
    async fn compare_and_set_lifecycle(
        &self,
        id: PropertyId,
        expected: LifecycleState,
        next: LifecycleState,
    ) -> Result<TransitionOutcome, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Human-readable handle used by owner filters.
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceKind {
    Country,
    Region,
    City,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub kind: PlaceKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: AmenityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Public URL of the stored object.
    pub path: String,
}

/// File record before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub kind: FileKind,
    pub path: String,
}

/// Users, profiles, places, and catalog entries referenced by properties.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn user_by_nickname(&self, nickname: &str) -> Result<Option<User>, RepositoryError>;
    async fn profile(&self, id: &ProfileId) -> Result<Option<Profile>, RepositoryError>;
    async fn place(&self, id: &PlaceId) -> Result<Option<Place>, RepositoryError>;
    async fn amenity(&self, id: &AmenityId) -> Result<Option<Amenity>, RepositoryError>;
    async fn category(&self, id: &CategoryId) -> Result<Option<Category>, RepositoryError>;
    async fn file(&self, id: &FileId) -> Result<Option<FileRecord>, RepositoryError>;
    async fn save_file(&self, file: NewFile) -> Result<FileRecord, RepositoryError>;
}
