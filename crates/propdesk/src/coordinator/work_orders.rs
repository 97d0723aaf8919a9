//! Work order protocols.

use std::collections::BTreeSet;

use chrono::Utc;

use propdesk_core::entities::{
    sortable_id, ActorContext, CommentRequest, CreateWorkOrderRequest, Event, EventParent, Role,
    UpdateType, ValidationError, WorkOrder, WorkOrderStatus,
};

use super::{require_role, Coordinator, CoordinatorError, Result};
use crate::notify::Notification;

impl Coordinator {
    /// Opens a work order: the row, then its creation event, then a notice
    /// to the property manager.
    pub async fn create_work_order(
        &self,
        actor: &ActorContext,
        request: CreateWorkOrderRequest,
    ) -> Result<WorkOrder> {
        let request = request.validate()?;
        let property = self
            .repos
            .properties
            .get(&request.property_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Property", &request.property_id))?;

        let tenant_email = match actor.role {
            Role::Tenant => actor.email.clone(),
            Role::PropertyManager => request
                .tenant_email
                .clone()
                .ok_or(ValidationError::EmptyField("tenant_email"))?,
            Role::Technician => {
                return Err(CoordinatorError::NotPermitted(
                    "technicians cannot open work orders".to_string(),
                ))
            }
        };
        if !property.tenant_emails.contains(&tenant_email) {
            return Err(CoordinatorError::NotPermitted(format!(
                "{tenant_email} is not a tenant of property {}",
                property.id
            )));
        }

        let tenant_name = match self.repos.users.get(&tenant_email).await? {
            Some(user) if !user.name.is_empty() => user.name,
            _ => actor.name.clone(),
        };

        let work_order = WorkOrder {
            id: sortable_id(),
            tenant_email,
            tenant_name,
            manager_email: property.manager_email.clone(),
            organization: property.organization.clone(),
            property_id: property.id.clone(),
            address: property.address.clone(),
            issue: request.issue,
            location: request.location,
            status: WorkOrderStatus::ToDo,
            permission_to_enter: request.permission_to_enter,
            assigned_to: BTreeSet::new(),
            viewed_by: BTreeSet::new(),
            images: request.images.into_iter().collect(),
            created_by: actor.email.clone(),
            created_at: Utc::now(),
        };

        self.repos.work_orders.create(&work_order).await?;
        self.record(
            EventParent::WorkOrder(work_order.id.clone()),
            actor,
            UpdateType::WorkOrderCreated,
            format!("Work order created: {}", work_order.issue),
        )
        .await?;

        self.notify(Notification::WorkOrderCreated {
            manager_email: work_order.manager_email.clone(),
            work_order_id: work_order.id.clone(),
            issue: work_order.issue.clone(),
        })
        .await;

        tracing::info!(
            work_order_id = %work_order.id,
            property_id = %work_order.property_id,
            "Opened work order"
        );
        Ok(work_order)
    }

    /// Adds a technician to the assigned set, records it, then notifies the
    /// technician.
    pub async fn assign_technician(
        &self,
        actor: &ActorContext,
        work_order_id: &str,
        technician_email: &str,
    ) -> Result<WorkOrder> {
        require_role(actor, &[Role::PropertyManager])?;
        let technician = self
            .repos
            .technicians
            .get(technician_email)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Technician", technician_email))?;

        let work_order = self
            .repos
            .work_orders
            .add_assignees(work_order_id, &BTreeSet::from([technician.email.clone()]))
            .await?;

        self.record(
            EventParent::WorkOrder(work_order.id.clone()),
            actor,
            UpdateType::AssignTechnician,
            format!("Assigned {} to this work order", technician.name),
        )
        .await?;

        self.notify(Notification::TechnicianAssigned {
            technician_email: technician.email.clone(),
            work_order_id: work_order.id.clone(),
            address: work_order.address.to_string(),
            issue: work_order.issue.clone(),
        })
        .await;

        Ok(work_order)
    }

    /// Removes a technician from the assigned set and records it.
    pub async fn remove_technician(
        &self,
        actor: &ActorContext,
        work_order_id: &str,
        technician_email: &str,
    ) -> Result<WorkOrder> {
        require_role(actor, &[Role::PropertyManager])?;
        let current = self
            .repos
            .work_orders
            .get_consistent(work_order_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("WorkOrder", work_order_id))?;
        if !current.assigned_to.contains(technician_email) {
            tracing::debug!(
                work_order_id = %work_order_id,
                technician = %technician_email,
                "Technician not assigned, nothing to remove"
            );
            return Ok(current);
        }

        let work_order = self
            .repos
            .work_orders
            .remove_assignees(work_order_id, &BTreeSet::from([technician_email.to_string()]))
            .await?;

        self.record(
            EventParent::WorkOrder(work_order.id.clone()),
            actor,
            UpdateType::RemoveTechnician,
            format!("Removed {technician_email} from this work order"),
        )
        .await?;

        Ok(work_order)
    }

    /// Moves a work order to a new status. `DELETED` is terminal.
    pub async fn update_work_order_status(
        &self,
        actor: &ActorContext,
        work_order_id: &str,
        status: WorkOrderStatus,
    ) -> Result<WorkOrder> {
        let work_order = self
            .repos
            .work_orders
            .update_status(work_order_id, status)
            .await?;

        self.record(
            EventParent::WorkOrder(work_order.id.clone()),
            actor,
            UpdateType::StatusUpdate,
            format!("Updated status to {status}"),
        )
        .await?;

        Ok(work_order)
    }

    pub async fn add_comment(
        &self,
        actor: &ActorContext,
        work_order_id: &str,
        request: CommentRequest,
    ) -> Result<Event> {
        let request = request.validate()?;
        let work_order = self
            .repos
            .work_orders
            .get(work_order_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("WorkOrder", work_order_id))?;
        if work_order.is_deleted() {
            return Err(CoordinatorError::Conflict(format!(
                "work order {work_order_id} is deleted"
            )));
        }

        self.record(
            EventParent::WorkOrder(work_order.id),
            actor,
            UpdateType::CommentUpdate,
            request.message,
        )
        .await
    }

    /// Records that a technician opened the work order. No event.
    ///
    /// Only identities known to the technician repository are recorded.
    pub async fn mark_viewed(
        &self,
        actor: &ActorContext,
        work_order_id: &str,
    ) -> Result<WorkOrder> {
        if actor.role != Role::Technician {
            return self
                .repos
                .work_orders
                .get(work_order_id)
                .await?
                .ok_or_else(|| CoordinatorError::not_found("WorkOrder", work_order_id));
        }
        if self.repos.technicians.get(&actor.email).await?.is_none() {
            return Err(CoordinatorError::not_found("Technician", &actor.email));
        }
        Ok(self
            .repos
            .work_orders
            .add_viewed_by(work_order_id, &actor.email)
            .await?)
    }

    /// Physically removes the work order. Its events are kept.
    pub async fn delete_work_order(&self, actor: &ActorContext, work_order_id: &str) -> Result<()> {
        require_role(actor, &[Role::PropertyManager])?;
        self.repos.work_orders.delete(work_order_id).await?;
        tracing::info!(work_order_id = %work_order_id, actor = %actor.email, "Deleted work order");
        Ok(())
    }
}
