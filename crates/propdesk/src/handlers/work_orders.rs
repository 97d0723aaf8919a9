//! Work order handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use propdesk_core::entities::{
    normalize_email, CommentRequest, CreateWorkOrderRequest, Event, Role, WorkOrder,
    WorkOrderStatus,
};
use propdesk_core::serde::{deserialize_comma_list, deserialize_optional_string};

use crate::{
    context::Actor,
    coordinator::CoordinatorError,
    handlers::{AppError, ListQuery},
    query::Page,
    repository::WorkOrderFilter,
    state::AppState,
};

/// Query parameters for listing work orders.
#[derive(Debug, Default, Deserialize)]
pub struct ListWorkOrdersQuery {
    /// Comma-separated statuses, e.g. `TO_DO,COMPLETE`.
    #[serde(default, deserialize_with = "deserialize_comma_list")]
    pub status: Vec<String>,
    /// Manager whose orders a technician lists.
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub manager_email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    pub page_size: Option<usize>,
    pub cursor: Option<String>,
}

impl ListWorkOrdersQuery {
    fn filter(&self) -> Result<WorkOrderFilter, AppError> {
        let mut filter = WorkOrderFilter::default();
        if !self.status.is_empty() {
            let statuses = self
                .status
                .iter()
                .map(|s| s.parse::<WorkOrderStatus>())
                .collect::<Result<Vec<_>, _>>()?;
            filter = filter.statuses(statuses);
        }
        if let Some(search) = &self.search {
            filter = filter.search(search.clone());
        }
        Ok(filter)
    }

    fn list_query(&self) -> ListQuery {
        ListQuery {
            search: self.search.clone(),
            page_size: self.page_size,
            cursor: self.cursor.clone(),
            ..ListQuery::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: WorkOrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignTechnician {
    pub technician_email: String,
}

/// Open a work order (POST /api/work-orders).
pub async fn create_work_order(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.coordinator.create_work_order(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// The actor's work orders, newest first (GET /api/work-orders).
///
/// Tenants see their own, managers see theirs, technicians see the orders
/// of `manager_email` assigned to them.
pub async fn list_work_orders(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Query(query): Query<ListWorkOrdersQuery>,
) -> Result<Json<Page<WorkOrder>>, AppError> {
    let filter = query.filter()?;
    let page = query.list_query().page_request(&state)?;
    let repo = &state.repos().work_orders;

    let orders = match actor.role {
        Role::Tenant => repo.list_for_tenant(&actor.email, &filter, page).await?,
        Role::PropertyManager => repo.list_for_manager(&actor.email, &filter, page).await?,
        Role::Technician => {
            let manager = query.manager_email.as_deref().ok_or_else(|| {
                CoordinatorError::NotPermitted(
                    "technicians list work orders per manager_email".to_string(),
                )
            })?;
            let manager = normalize_email(manager)?;
            repo.list_for_technician(&manager, &actor.email, &filter, page)
                .await?
        }
    };
    Ok(Json(orders))
}

/// Get a work order; a technician opening it is recorded (GET /api/work-orders/{id}).
pub async fn get_work_order(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrder>, AppError> {
    let order = state.coordinator.mark_viewed(&actor, &id).await?;
    Ok(Json(order))
}

/// Change the status (PUT /api/work-orders/{id}/status).
pub async fn update_status(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<WorkOrder>, AppError> {
    let order = state
        .coordinator
        .update_work_order_status(&actor, &id, payload.status)
        .await?;
    Ok(Json(order))
}

/// Assign a technician (POST /api/work-orders/{id}/technicians).
pub async fn assign_technician(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AssignTechnician>,
) -> Result<Json<WorkOrder>, AppError> {
    let email = normalize_email(&payload.technician_email)?;
    let order = state
        .coordinator
        .assign_technician(&actor, &id, &email)
        .await?;
    Ok(Json(order))
}

/// Unassign a technician (DELETE /api/work-orders/{id}/technicians/{email}).
pub async fn remove_technician(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path((id, email)): Path<(String, String)>,
) -> Result<Json<WorkOrder>, AppError> {
    let email = normalize_email(&email)?;
    let order = state
        .coordinator
        .remove_technician(&actor, &id, &email)
        .await?;
    Ok(Json(order))
}

/// Comment on a work order (POST /api/work-orders/{id}/comments).
pub async fn add_comment(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = state.coordinator.add_comment(&actor, &id, payload).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Audit trail, newest first (GET /api/work-orders/{id}/events).
pub async fn list_work_order_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Event>>, AppError> {
    let page = query.page_request(&state)?;
    let events = state.repos().events.list_for_work_order(&id, page).await?;
    Ok(Json(events))
}

/// Delete a work order (DELETE /api/work-orders/{id}).
pub async fn delete_work_order(
    Actor(actor): Actor,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.coordinator.delete_work_order(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
