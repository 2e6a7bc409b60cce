use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Address, Contract, Location, PlaceId, ProfileId, Property, PropertyId, UserId,
};
use super::repository::{
    Amenity, Category, FileRecord, Place, ReferenceStore, RepositoryError,
};

/// Related entity to materialize on a property.
///
/// Owner paths imply their parents: expanding the owner profile's city also
/// expands the owner and the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    AddressCountry,
    AddressRegion,
    AddressCity,
    Amenities,
    Category,
    Photos,
    Owner,
    OwnerProfile,
    OwnerProfileCountry,
    OwnerProfileRegion,
    OwnerProfileCity,
}

/// Expansions applied to every listing and single-item response.
pub const LISTING_EXPANSIONS: &[Expansion] = &[
    Expansion::AddressCountry,
    Expansion::AddressRegion,
    Expansion::AddressCity,
    Expansion::Amenities,
    Expansion::Category,
    Expansion::Photos,
    Expansion::OwnerProfileCountry,
    Expansion::OwnerProfileRegion,
    Expansion::OwnerProfileCity,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlaceParts {
    country: bool,
    region: bool,
    city: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ExpansionPlan {
    address: PlaceParts,
    amenities: bool,
    category: bool,
    photos: bool,
    owner: bool,
    owner_profile: bool,
    owner_address: PlaceParts,
}

impl ExpansionPlan {
    fn from_expansions(expansions: &[Expansion]) -> Self {
        let mut plan = Self::default();
        for expansion in expansions {
            match expansion {
                Expansion::AddressCountry => plan.address.country = true,
                Expansion::AddressRegion => plan.address.region = true,
                Expansion::AddressCity => plan.address.city = true,
                Expansion::Amenities => plan.amenities = true,
                Expansion::Category => plan.category = true,
                Expansion::Photos => plan.photos = true,
                Expansion::Owner => plan.owner = true,
                Expansion::OwnerProfile => {
                    plan.owner = true;
                    plan.owner_profile = true;
                }
                Expansion::OwnerProfileCountry => {
                    plan.owner = true;
                    plan.owner_profile = true;
                    plan.owner_address.country = true;
                }
                Expansion::OwnerProfileRegion => {
                    plan.owner = true;
                    plan.owner_profile = true;
                    plan.owner_address.region = true;
                }
                Expansion::OwnerProfileCity => {
                    plan.owner = true;
                    plan.owner_profile = true;
                    plan.owner_address.city = true;
                }
            }
        }
        plan
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandedAddress {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub country: Option<Place>,
    pub region: Option<Place>,
    pub city: Option<Place>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedProfile {
    pub id: ProfileId,
    pub display_name: String,
    pub address: ExpandedAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedOwner {
    pub id: UserId,
    pub nickname: String,
    pub profile: Option<ExpandedProfile>,
}

/// Property with its related entities materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedProperty {
    pub id: PropertyId,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    pub amenities: Vec<Amenity>,
    pub address: ExpandedAddress,
    pub cost: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<u32>,
    pub contract: Contract,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub options: BTreeMap<String, String>,
    pub photos: Vec<FileRecord>,
    pub owner: Option<ExpandedOwner>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Materializes references through a [`ReferenceStore`]. Dangling
/// references are dropped from the view.
pub struct Expander<D> {
    reference: Arc<D>,
}

impl<D> Expander<D>
where
    D: ReferenceStore + 'static,
{
    pub fn new(reference: Arc<D>) -> Self {
        Self { reference }
    }

    pub async fn expand(
        &self,
        property: Property,
        expansions: &[Expansion],
    ) -> Result<ExpandedProperty, RepositoryError> {
        let plan = ExpansionPlan::from_expansions(expansions);
        let deleted = property.lifecycle().is_deleted();
        let details = property.details;

        let address = self.address(details.address, plan.address).await?;

        let mut amenities = Vec::new();
        if plan.amenities {
            for id in &details.amenities {
                if let Some(amenity) = self.reference.amenity(id).await? {
                    amenities.push(amenity);
                }
            }
        }

        let category = match (&details.category, plan.category) {
            (Some(id), true) => self.reference.category(id).await?,
            _ => None,
        };

        let mut photos = Vec::new();
        if plan.photos {
            for id in &property.photos {
                if let Some(file) = self.reference.file(id).await? {
                    photos.push(file);
                }
            }
        }

        let owner = if plan.owner {
            self.owner(&property.owner, plan).await?
        } else {
            None
        };

        Ok(ExpandedProperty {
            id: property.id,
            title: details.title,
            description: details.description,
            category,
            cert: details.cert,
            amenities,
            address,
            cost: details.cost,
            maintenance: details.maintenance,
            contract: details.contract,
            access: details.access,
            status: details.status,
            options: details.options,
            photos,
            owner,
            deleted,
            created_at: property.created_at,
        })
    }

    async fn owner(
        &self,
        id: &UserId,
        plan: ExpansionPlan,
    ) -> Result<Option<ExpandedOwner>, RepositoryError> {
        let Some(user) = self.reference.user(id).await? else {
            return Ok(None);
        };

        let profile = match (&user.profile, plan.owner_profile) {
            (Some(profile_id), true) => match self.reference.profile(profile_id).await? {
                Some(profile) => Some(ExpandedProfile {
                    id: profile.id,
                    display_name: profile.display_name,
                    address: self.address(profile.address, plan.owner_address).await?,
                }),
                None => None,
            },
            _ => None,
        };

        Ok(Some(ExpandedOwner {
            id: user.id,
            nickname: user.nickname,
            profile,
        }))
    }

    async fn address(
        &self,
        address: Address,
        parts: PlaceParts,
    ) -> Result<ExpandedAddress, RepositoryError> {
        Ok(ExpandedAddress {
            country: self.place(address.country.as_ref(), parts.country).await?,
            region: self.place(address.region.as_ref(), parts.region).await?,
            city: self.place(address.city.as_ref(), parts.city).await?,
            line1: address.line1,
            line2: address.line2,
            line3: address.line3,
            zip: address.zip,
            location: address.location,
        })
    }

    async fn place(
        &self,
        id: Option<&PlaceId>,
        wanted: bool,
    ) -> Result<Option<Place>, RepositoryError> {
        match (id, wanted) {
            (Some(id), true) => self.reference.place(id).await,
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_owner_expansion_implies_parents() {
        let plan = ExpansionPlan::from_expansions(&[Expansion::OwnerProfileCity]);
        assert!(plan.owner);
        assert!(plan.owner_profile);
        assert!(plan.owner_address.city);
        assert!(!plan.owner_address.country);
        assert!(!plan.photos);
    }

    #[test]
    fn listing_plan_covers_every_relation() {
        let plan = ExpansionPlan::from_expansions(LISTING_EXPANSIONS);
        let all = PlaceParts {
            country: true,
            region: true,
            city: true,
        };
        assert_eq!(plan.address, all);
        assert_eq!(plan.owner_address, all);
        assert!(plan.amenities && plan.category && plan.photos && plan.owner);
    }
}
