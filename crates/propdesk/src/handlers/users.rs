//! User, tenant and property-manager handlers.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use propdesk_core::entities::{
    normalize_email, CreateTenantRequest, InviteManagerRequest, Role, User,
};

use crate::{
    context::Actor,
    coordinator::CoordinatorError,
    handlers::{AppError, ListQuery},
    query::Page,
    state::AppState,
};

/// Get a user by email (GET /api/users/{email}).
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    let email = normalize_email(&email)?;
    let user = state
        .repos()
        .users
        .get(&email)
        .await?
        .ok_or_else(|| CoordinatorError::not_found("User", &email))?;
    Ok(Json(user))
}

/// Delete a user row (DELETE /api/users/{email}).
pub async fn delete_user(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    let email = normalize_email(&email)?;
    state.coordinator.delete_user(&actor, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove one role from a user (DELETE /api/users/{email}/roles/{role}).
pub async fn delete_role(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path((email, role)): Path<(String, String)>,
) -> Result<Json<BTreeSet<Role>>, AppError> {
    let email = normalize_email(&email)?;
    let role: Role = role.parse()?;
    let remaining = state.coordinator.delete_role(&actor, &email, role).await?;
    Ok(Json(remaining))
}

#[derive(Debug, Deserialize)]
pub struct AlternateNames {
    pub names: BTreeSet<String>,
}

/// Add names the actor may act under (POST /api/me/alternate-names).
pub async fn add_alternate_names(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<AlternateNames>,
) -> Result<StatusCode, AppError> {
    state
        .repos()
        .users
        .add_alternate_names(&actor.email, &trimmed(payload.names))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop names the actor acts under (DELETE /api/me/alternate-names).
pub async fn remove_alternate_names(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<AlternateNames>,
) -> Result<StatusCode, AppError> {
    state
        .repos()
        .users
        .remove_alternate_names(&actor.email, &trimmed(payload.names))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn trimmed(names: BTreeSet<String>) -> BTreeSet<String> {
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

// ============================================================================
// Tenants
// ============================================================================

/// Invite a tenant (POST /api/tenants).
pub async fn create_tenant(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<CreateTenantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.coordinator.create_tenant(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// The acting manager's tenants (GET /api/tenants).
pub async fn list_tenants(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<User>>, AppError> {
    let page = query.page_request(&state)?;
    let tenants = state
        .repos()
        .users
        .list_tenants_for_manager(&actor.email, query.search(), page)
        .await?;
    Ok(Json(tenants))
}

/// Link a tenant to a property (PUT /api/tenants/{email}/properties/{property_id}).
pub async fn add_tenant_to_property(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path((email, property_id)): Path<(String, String)>,
) -> Result<Json<User>, AppError> {
    let email = normalize_email(&email)?;
    let user = state
        .coordinator
        .add_tenant_to_property(&actor, &email, &property_id)
        .await?;
    Ok(Json(user))
}

/// Unlink a tenant from a property (DELETE /api/tenants/{email}/properties/{property_id}).
pub async fn remove_tenant_from_property(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path((email, property_id)): Path<(String, String)>,
) -> Result<Json<User>, AppError> {
    let email = normalize_email(&email)?;
    let user = state
        .coordinator
        .remove_tenant_from_property(&actor, &email, &property_id)
        .await?;
    Ok(Json(user))
}

/// Change a tenant's primary address (PUT /api/tenants/{email}/primary/{property_id}).
pub async fn set_primary_address(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path((email, property_id)): Path<(String, String)>,
) -> Result<Json<User>, AppError> {
    let email = normalize_email(&email)?;
    let user = state
        .coordinator
        .set_primary_address(&actor, &email, &property_id)
        .await?;
    Ok(Json(user))
}

// ============================================================================
// Property managers
// ============================================================================

/// Invite a property manager (POST /api/managers).
pub async fn invite_manager(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<InviteManagerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .coordinator
        .invite_property_manager(&actor, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Managers of the actor's organization (GET /api/managers).
pub async fn list_managers(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<User>>, AppError> {
    let organization = actor
        .organization
        .as_deref()
        .ok_or_else(|| CoordinatorError::NotPermitted("actor has no organization".to_string()))?;
    let page = query.page_request(&state)?;
    let managers = state
        .repos()
        .users
        .list_managers_for_organization(organization, query.search(), page)
        .await?;
    Ok(Json(managers))
}
