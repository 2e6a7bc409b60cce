//! Rental property catalog: listing, single-item views, creation, edits,
//! and the soft-delete lifecycle.
//!
//! Listing and lookup are public. Writes are mounted behind the access gate
//! in [`router::property_router`].

pub mod creation;
pub mod domain;
pub mod expansion;
pub mod lifecycle;
pub mod listing;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use creation::{
    CreationError, CreationPipeline, CreationStage, PhotoStorage, PhotoUpload, StoredObject,
    UploadError,
};
pub use domain::{
    Address, AmenityId, CategoryId, Contract, FileId, Location, PlaceId, ProfileId, Property,
    PropertyDetails, PropertyDraft, PropertyId, PropertyPatch, UserId, ValidationError,
};
pub use expansion::{ExpandedProperty, Expander, Expansion, LISTING_EXPANSIONS};
pub use lifecycle::{
    LifecycleConflict, LifecycleController, LifecycleError, LifecycleState, Transition,
};
pub use listing::{
    ListingFilter, ListingPaginator, ListingQuery, Page, PageRequest, PropertyView, SiblingView,
    PAGE_SIZE,
};
pub use memory::{MemoryPropertyRepository, MemoryReferenceStore};
pub use repository::{
    Amenity, Category, FileKind, FileRecord, Place, PlaceKind, Profile, PropertyRepository,
    ReferenceStore, RepositoryError, TransitionOutcome, User,
};
pub use router::{admin_router, property_router, CreatePropertyRequest};
pub use service::{PropertyService, PropertyServiceError};
