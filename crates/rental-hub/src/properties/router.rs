use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::creation::{PhotoStorage, PhotoUpload};
use super::domain::{Property, PropertyDetails, PropertyDraft, PropertyId, PropertyPatch, UserId};
use super::expansion::ExpandedProperty;
use super::listing::{ListingQuery, Page, PropertyView};
use super::repository::{PropertyRepository, ReferenceStore};
use super::service::{PropertyService, PropertyServiceError};
use crate::access::{
    enforce, AccessGate, Action, GateChain, GrantedAccess, GuardState, InstanceId, PolicyRule,
    PolicyStore, ResourceType, RoleName,
};
use crate::error::failure_response;

/// Creation payload. The owner defaults to the calling principal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePropertyRequest {
    #[serde(default)]
    pub owner: Option<UserId>,
    #[serde(flatten)]
    pub details: PropertyDetails,
    #[serde(default)]
    pub photos: Vec<PhotoUpload>,
}

#[derive(Debug, Serialize)]
pub struct CreatedProperty {
    pub property: Property,
}

impl IntoResponse for PropertyServiceError {
    fn into_response(self) -> Response {
        failure_response(&self)
    }
}

impl From<JsonRejection> for PropertyServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for PropertyServiceError {
    fn from(rejection: PathRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for PropertyServiceError {
    fn from(rejection: QueryRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

/// Policies name properties by their canonical numeric id, so `/01` and `/1`
/// are the same instance.
fn property_instance(raw: &str) -> Option<InstanceId> {
    raw.parse::<u64>().ok().map(|id| PropertyId(id).instance())
}

fn guard<S>(gate: &Arc<AccessGate<S>>, chain: GateChain) -> GuardState<S> {
    GuardState::new(Arc::clone(gate), chain).with_instance_key(property_instance)
}

/// Router exposing the property endpoints behind their gate chains.
pub fn property_router<S, R, D, P>(
    gate: Arc<AccessGate<S>>,
    service: Arc<PropertyService<R, D, P>>,
) -> Router
where
    S: PolicyStore + 'static,
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let create_chain = GateChain::new().require_global(ResourceType::Property, Action::Create);
    let update_chain = GateChain::new().require_instance(
        ResourceType::Property,
        Action::Update,
        "edit this property",
    );
    let delete_chain = GateChain::new().require_instance(
        ResourceType::Property,
        Action::Delete,
        "delete this property",
    );
    let restore_chain = GateChain::new()
        .require_role(RoleName::admin())
        .require_instance(ResourceType::Property, Action::Restore, "restore this property");

    Router::new()
        .route(
            "/api/v1/properties",
            get(list_handler::<R, D, P>).merge(
                post(create_handler::<R, D, P>)
                    .route_layer(from_fn_with_state(guard(&gate, create_chain), enforce::<S>)),
            ),
        )
        .route(
            "/api/v1/properties/:id",
            get(get_handler::<R, D, P>)
                .merge(
                    patch(update_handler::<R, D, P>)
                        .route_layer(from_fn_with_state(guard(&gate, update_chain), enforce::<S>)),
                )
                .merge(
                    delete(delete_handler::<R, D, P>)
                        .route_layer(from_fn_with_state(guard(&gate, delete_chain), enforce::<S>)),
                ),
        )
        .route(
            "/api/v1/properties/:id/restore",
            post(restore_handler::<R, D, P>)
                .route_layer(from_fn_with_state(guard(&gate, restore_chain), enforce::<S>)),
        )
        .with_state(service)
}

/// Admin-only listing of the policies attached by the role check.
pub fn admin_router<S>(gate: Arc<AccessGate<S>>) -> Router
where
    S: PolicyStore + 'static,
{
    let admin_chain = GateChain::new().require_role(RoleName::admin());
    Router::new().route(
        "/api/v1/admin/permissions",
        get(permissions_handler)
            .route_layer(from_fn_with_state(guard(&gate, admin_chain), enforce::<S>)),
    )
}

pub(crate) async fn permissions_handler(
    Extension(granted): Extension<GrantedAccess>,
) -> Json<Vec<PolicyRule>> {
    Json(granted.role_policies)
}

pub(crate) async fn list_handler<R, D, P>(
    State(service): State<Arc<PropertyService<R, D, P>>>,
    query: Result<Query<ListingQuery>, QueryRejection>,
) -> Result<Json<Page<ExpandedProperty>>, PropertyServiceError>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let Query(query) = query?;
    Ok(Json(service.list(&query).await?))
}

pub(crate) async fn get_handler<R, D, P>(
    State(service): State<Arc<PropertyService<R, D, P>>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<PropertyView>, PropertyServiceError>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let Path(id) = id?;
    Ok(Json(service.get(PropertyId(id)).await?))
}

pub(crate) async fn create_handler<R, D, P>(
    State(service): State<Arc<PropertyService<R, D, P>>>,
    Extension(granted): Extension<GrantedAccess>,
    request: Result<Json<CreatePropertyRequest>, JsonRejection>,
) -> Result<Json<CreatedProperty>, PropertyServiceError>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let Json(request) = request?;
    let owner = request
        .owner
        .unwrap_or_else(|| UserId(granted.principal.id.0.clone()));
    let draft = PropertyDraft {
        owner,
        details: request.details,
    };
    let property = service.create(draft, request.photos).await?;
    Ok(Json(CreatedProperty { property }))
}

pub(crate) async fn update_handler<R, D, P>(
    State(service): State<Arc<PropertyService<R, D, P>>>,
    id: Result<Path<u64>, PathRejection>,
    patch: Result<Json<PropertyPatch>, JsonRejection>,
) -> Result<Json<Value>, PropertyServiceError>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let Path(id) = id?;
    let Json(patch) = patch?;
    service.update(PropertyId(id), patch).await?;
    Ok(Json(Value::Null))
}

pub(crate) async fn delete_handler<R, D, P>(
    State(service): State<Arc<PropertyService<R, D, P>>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>, PropertyServiceError>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let Path(id) = id?;
    service.delete(PropertyId(id)).await?;
    Ok(Json(Value::Null))
}

pub(crate) async fn restore_handler<R, D, P>(
    State(service): State<Arc<PropertyService<R, D, P>>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Value>, PropertyServiceError>
where
    R: PropertyRepository + 'static,
    D: ReferenceStore + 'static,
    P: PhotoStorage + 'static,
{
    let Path(id) = id?;
    service.restore(PropertyId(id)).await?;
    Ok(Json(Value::Null))
}
