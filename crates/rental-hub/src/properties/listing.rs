use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    Address, AmenityId, CategoryId, Contract, FileId, Property, PropertyId, UserId,
};
use super::expansion::{ExpandedProperty, Expander, LISTING_EXPANSIONS};
use super::repository::{PropertyRepository, ReferenceStore, RepositoryError};

/// Fixed listing page size.
pub const PAGE_SIZE: usize = 12;

/// Raw listing parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub keyword: Option<String>,
    /// Owner nickname, resolved to a user id before filtering.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

/// 1-indexed page window over the canonical ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: usize,
}

impl PageRequest {
    /// Missing, unparsable, or non-positive pages fall back to page 1.
    /// There is no upper clamp.
    pub fn parse(raw: Option<&str>) -> Self {
        let page = raw
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|page| *page > 0)
            .map(|page| u32::try_from(page).unwrap_or(u32::MAX))
            .unwrap_or(1);
        Self::new(page)
    }

    pub fn new(page: u32) -> Self {
        Self {
            page: page.max(1),
            limit: PAGE_SIZE,
        }
    }

    pub fn offset(self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit)
    }
}

/// Page payload; field names follow the paginated wire format clients use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub page: u32,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total: u64, request: PageRequest) -> Self {
        let limit = request.limit.max(1) as u64;
        Self {
            docs,
            total,
            limit: request.limit,
            page: request.page,
            pages: total.div_ceil(limit),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }
}

/// Case-insensitive substring matched against title or description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword(String);

impl Keyword {
    /// Blank keywords apply no filter. Any other term is kept verbatim,
    /// surrounding whitespace included.
    pub fn new(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, title: &str, description: &str) -> bool {
        title.to_lowercase().contains(&self.0) || description.to_lowercase().contains(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OwnerFilter {
    #[default]
    Any,
    Only(UserId),
    /// The handle named no user: matches nothing.
    Unresolved,
}

/// Conjunction of listing predicates. Deleted properties never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub category: Option<CategoryId>,
    pub keyword: Option<Keyword>,
    pub owner: OwnerFilter,
}

impl ListingFilter {
    pub fn matches(&self, property: &Property) -> bool {
        if !property.is_active() {
            return false;
        }
        if let Some(category) = &self.category {
            if property.details.category.as_ref() != Some(category) {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            if !keyword.matches(&property.details.title, &property.details.description) {
                return false;
            }
        }
        match &self.owner {
            OwnerFilter::Any => true,
            OwnerFilter::Only(owner) => &property.owner == owner,
            OwnerFilter::Unresolved => false,
        }
    }

    pub fn matches_nothing(&self) -> bool {
        self.owner == OwnerFilter::Unresolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    /// Nearest smaller order key.
    Previous,
    /// Nearest larger order key.
    Next,
}

/// Reduced projection used for prev/next links. Leaves out the owner,
/// options, and certification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiblingView {
    pub id: PropertyId,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    pub amenities: Vec<AmenityId>,
    pub address: Address,
    pub cost: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<u32>,
    pub contract: Contract,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub photos: Vec<FileId>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Property> for SiblingView {
    fn from(property: Property) -> Self {
        let deleted = property.lifecycle().is_deleted();
        let details = property.details;
        Self {
            id: property.id,
            title: details.title,
            description: details.description,
            category: details.category,
            amenities: details.amenities,
            address: details.address,
            cost: details.cost,
            maintenance: details.maintenance,
            contract: details.contract,
            access: details.access,
            status: details.status,
            photos: property.photos,
            deleted,
            created_at: property.created_at,
        }
    }
}

/// Single-item payload: the expanded property plus its order neighbors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyView {
    #[serde(flatten)]
    pub property: ExpandedProperty,
    pub prev: Option<SiblingView>,
    pub next: Option<SiblingView>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("property {0} not found")]
    NotFound(PropertyId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Read side: filtered pages and single-item views with neighbors.
pub struct ListingPaginator<R, D> {
    repository: Arc<R>,
    reference: Arc<D>,
    expander: Expander<D>,
}

impl<R, D> ListingPaginator<R, D>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
{
    pub fn new(repository: Arc<R>, reference: Arc<D>) -> Self {
        let expander = Expander::new(Arc::clone(&reference));
        Self {
            repository,
            reference,
            expander,
        }
    }

    /// Turn raw query parameters into a filter. An unknown owner handle
    /// yields a filter that matches nothing rather than an error.
    pub async fn resolve_filter(
        &self,
        query: &ListingQuery,
    ) -> Result<ListingFilter, ListingError> {
        let owner = match query.owner.as_deref().map(str::trim) {
            None | Some("") => OwnerFilter::Any,
            Some(handle) => match self.reference.user_by_nickname(handle).await? {
                Some(user) => OwnerFilter::Only(user.id),
                None => {
                    debug!(owner = handle, "owner handle did not resolve");
                    OwnerFilter::Unresolved
                }
            },
        };

        Ok(ListingFilter {
            category: query.category.clone(),
            keyword: query.keyword.as_deref().and_then(Keyword::new),
            owner,
        })
    }

    pub async fn list(&self, query: &ListingQuery) -> Result<Page<ExpandedProperty>, ListingError> {
        let request = PageRequest::parse(query.page.as_deref());
        let filter = self.resolve_filter(query).await?;
        if filter.matches_nothing() {
            return Ok(Page::empty(request));
        }

        let slice = self.repository.search(&filter, request).await?;
        let mut docs = Vec::with_capacity(slice.items.len());
        for property in slice.items {
            docs.push(self.expander.expand(property, LISTING_EXPANSIONS).await?);
        }

        debug!(
            page = request.page,
            returned = docs.len(),
            total = slice.total,
            "listing page built"
        );
        Ok(Page::new(docs, slice.total, request))
    }

    /// Active property by id with prev/next links. Deleted properties are
    /// reported as not found.
    pub async fn get(&self, id: PropertyId) -> Result<PropertyView, ListingError> {
        let property = self
            .repository
            .fetch(id)
            .await?
            .filter(Property::is_active)
            .ok_or(ListingError::NotFound(id))?;

        let prev = self
            .repository
            .neighbor(id, Neighbor::Previous)
            .await?
            .map(SiblingView::from);
        let next = self
            .repository
            .neighbor(id, Neighbor::Next)
            .await?
            .map(SiblingView::from);

        let property = self.expander.expand(property, LISTING_EXPANSIONS).await?;
        Ok(PropertyView {
            property,
            prev,
            next,
        })
    }
}
