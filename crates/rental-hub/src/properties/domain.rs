use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lifecycle::LifecycleState;
use crate::access::InstanceId;

/// Identity and intrinsic order key of a property (insertion sequence).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PropertyId(pub u64);

impl PropertyId {
    pub fn instance(self) -> InstanceId {
        InstanceId(self.0.to_string())
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub String);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )+
    };
}

string_id!(
    /// Internal user id; owners are referenced by it.
    UserId,
    ProfileId,
    /// Country, region, or city reference.
    PlaceId,
    AmenityId,
    CategoryId,
    /// Stored file (photo) reference.
    FileId,
);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<PlaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<PlaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<PlaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Lease length in months.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months_in_advance: Option<u16>,
}

/// Descriptive fields of a property, everything a caller may edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(default)]
    pub amenities: Vec<AmenityId>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub cost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<u32>,
    #[serde(default)]
    pub contract: Contract,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Validated input for the creation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub owner: UserId,
    #[serde(flatten)]
    pub details: PropertyDetails,
}

impl PropertyDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner.0.trim().is_empty() {
            return Err(ValidationError::MissingOwner);
        }
        if self.details.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if let Some(location) = self.details.address.location {
            if !(-90.0..=90.0).contains(&location.lat) || !(-180.0..=180.0).contains(&location.lon)
            {
                return Err(ValidationError::InvalidLocation {
                    lat: location.lat,
                    lon: location.lon,
                });
            }
        }
        Ok(())
    }
}

/// Persisted property.
///
/// The lifecycle state is private: new properties start active and only the
/// lifecycle controller's guarded transitions change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub owner: UserId,
    #[serde(flatten)]
    pub details: PropertyDetails,
    #[serde(default)]
    pub photos: Vec<FileId>,
    #[serde(rename = "deleted")]
    lifecycle: LifecycleState,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn new(
        id: PropertyId,
        draft: PropertyDraft,
        photos: Vec<FileId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner: draft.owner,
            details: draft.details,
            photos,
            lifecycle: LifecycleState::Active,
            created_at,
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == LifecycleState::Active
    }

    /// Only stores applying a compare-and-swap transition call this.
    pub(crate) fn set_lifecycle(&mut self, state: LifecycleState) {
        self.lifecycle = state;
    }
}

/// Partial update of descriptive fields. It has no lifecycle field, so an
/// update can never flip `deleted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub amenities: Option<Vec<AmenityId>>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub cost: Option<u32>,
    #[serde(default)]
    pub maintenance: Option<u32>,
    #[serde(default)]
    pub contract: Option<Contract>,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub options: Option<BTreeMap<String, String>>,
}

impl PropertyPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(ValidationError::MissingTitle);
        }
        Ok(())
    }

    pub fn apply(&self, details: &mut PropertyDetails) {
        if let Some(title) = &self.title {
            details.title = title.clone();
        }
        if let Some(description) = &self.description {
            details.description = description.clone();
        }
        if let Some(category) = &self.category {
            details.category = Some(category.clone());
        }
        if let Some(cert) = &self.cert {
            details.cert = Some(cert.clone());
        }
        if let Some(amenities) = &self.amenities {
            details.amenities = amenities.clone();
        }
        if let Some(address) = &self.address {
            details.address = address.clone();
        }
        if let Some(cost) = self.cost {
            details.cost = cost;
        }
        if let Some(maintenance) = self.maintenance {
            details.maintenance = Some(maintenance);
        }
        if let Some(contract) = self.contract {
            details.contract = contract;
        }
        if let Some(access) = &self.access {
            details.access = Some(access.clone());
        }
        if let Some(status) = &self.status {
            details.status = Some(status.clone());
        }
        if let Some(options) = &self.options {
            details.options = options.clone();
        }
    }
}

/// Malformed input to a mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("owner is required")]
    MissingOwner,
    #[error("location ({lat}, {lon}) is out of range")]
    InvalidLocation { lat: f64, lon: f64 },
    #[error("photo `{file_name}` is not an image (content type `{content_type}`)")]
    InvalidPhoto {
        file_name: String,
        content_type: String,
    },
    #[error("update contains no fields")]
    EmptyPatch,
}
