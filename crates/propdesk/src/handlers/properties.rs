//! Property handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use propdesk_core::entities::{Address, CreatePropertyRequest, Event, Property};

use crate::{
    context::Actor,
    coordinator::{AddressEditReport, CoordinatorError},
    handlers::{AppError, ListQuery, Scope},
    query::Page,
    state::AppState,
};

/// Register a property (POST /api/properties).
pub async fn create_property(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<CreatePropertyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let property = state.coordinator.create_property(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

/// List properties in address order (GET /api/properties).
pub async fn list_properties(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Property>>, AppError> {
    let page = query.page_request(&state)?;
    let search = query.search();
    let properties = match query.scope {
        Scope::Manager => {
            state
                .repos()
                .properties
                .list_for_manager(&actor.email, search, page)
                .await?
        }
        Scope::Organization => {
            let organization = actor.organization.as_deref().ok_or_else(|| {
                CoordinatorError::NotPermitted("actor has no organization".to_string())
            })?;
            state
                .repos()
                .properties
                .list_for_organization(organization, search, page)
                .await?
        }
    };
    Ok(Json(properties))
}

/// Get a property (GET /api/properties/{id}).
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Property>, AppError> {
    let property = state
        .repos()
        .properties
        .get(&id)
        .await?
        .ok_or_else(|| CoordinatorError::not_found("Property", &id))?;
    Ok(Json(property))
}

/// Move a property to a new address (PUT /api/properties/{id}/address).
///
/// Responds 200 even when some tenant snapshots were not rewritten; the
/// report lists them.
pub async fn edit_address(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(address): Json<Address>,
) -> Result<Json<AddressEditReport>, AppError> {
    let report = state
        .coordinator
        .edit_property_address(&actor, &id, address)
        .await?;
    if !report.is_complete() {
        tracing::warn!(
            property_id = %id,
            failed = report.failed_tenants.len(),
            "Address edit left stale tenant snapshots"
        );
    }
    Ok(Json(report))
}

/// Audit trail of a property, newest first (GET /api/properties/{id}/events).
pub async fn list_property_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Event>>, AppError> {
    let page = query.page_request(&state)?;
    let events = state.repos().events.list_for_property(&id, page).await?;
    Ok(Json(events))
}
