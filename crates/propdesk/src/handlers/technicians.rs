//! Technician handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use propdesk_core::entities::{
    normalize_email, InviteStatus, InviteTechnicianRequest, Technician, TechnicianLink,
};

use crate::{
    context::Actor,
    coordinator::CoordinatorError,
    handlers::{AppError, ListQuery, Scope},
    query::Page,
    state::AppState,
};

/// One row of a technician listing, whichever partition it came from.
#[derive(Debug, Serialize)]
pub struct TechnicianSummary {
    pub email: String,
    pub name: String,
    pub status: InviteStatus,
}

impl From<TechnicianLink> for TechnicianSummary {
    fn from(link: TechnicianLink) -> Self {
        Self {
            email: link.technician_email,
            name: link.name,
            status: link.status,
        }
    }
}

impl From<Technician> for TechnicianSummary {
    fn from(technician: Technician) -> Self {
        Self {
            email: technician.email,
            name: technician.name,
            status: technician.status,
        }
    }
}

/// Invite a technician (POST /api/technicians).
pub async fn invite_technician(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<InviteTechnicianRequest>,
) -> Result<impl IntoResponse, AppError> {
    let technician = state.coordinator.invite_technician(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(technician)))
}

/// Technicians the actor can assign, or the organization's (GET /api/technicians).
pub async fn list_technicians(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<TechnicianSummary>>, AppError> {
    let page = query.page_request(&state)?;
    let search = query.search();
    let technicians = match query.scope {
        Scope::Manager => state
            .repos()
            .technicians
            .list_for_manager(&actor.email, search, page)
            .await?
            .try_map(|link| Ok::<TechnicianSummary, AppError>(link.into()))?,
        Scope::Organization => {
            let organization = actor.organization.as_deref().ok_or_else(|| {
                CoordinatorError::NotPermitted("actor has no organization".to_string())
            })?;
            state
                .repos()
                .technicians
                .list_for_organization(organization, search, page)
                .await?
                .try_map(|technician| Ok::<TechnicianSummary, AppError>(technician.into()))?
        }
    };
    Ok(Json(technicians))
}

/// Get a technician (GET /api/technicians/{email}).
pub async fn get_technician(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Technician>, AppError> {
    let email = normalize_email(&email)?;
    let technician = state
        .repos()
        .technicians
        .get(&email)
        .await?
        .ok_or_else(|| CoordinatorError::not_found("Technician", &email))?;
    Ok(Json(technician))
}
