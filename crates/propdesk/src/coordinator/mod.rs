//! Multi-row write protocols.
//!
//! Each protocol is a fixed sequence of repository calls with no rollback.
//! Required steps abort the protocol with an error; notifications run last
//! and only log their failures. Re-running a protocol after a partial
//! failure converges because every write is an upsert or a set delta.

mod error;
mod people;
mod properties;
mod tenants;
mod work_orders;

use std::sync::Arc;

use propdesk_core::entities::{ActorContext, Event, EventParent, Role, UpdateType};

use crate::notify::{Notification, Notifier};
use crate::repository::Repositories;

pub use error::{CoordinatorError, Result};
pub use properties::{AddressEditReport, TenantFailure};

#[derive(Clone)]
pub struct Coordinator {
    repos: Repositories,
    notifier: Arc<dyn Notifier>,
}

impl Coordinator {
    pub fn new(repos: Repositories, notifier: Arc<dyn Notifier>) -> Self {
        Self { repos, notifier }
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Best effort: a failed delivery is logged and swallowed.
    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.send(&notification).await {
            tracing::warn!(
                recipient = %notification.recipient(),
                error = %err,
                "Notification failed"
            );
        }
    }

    async fn record(
        &self,
        parent: EventParent,
        actor: &ActorContext,
        update_type: UpdateType,
        message: impl Into<String>,
    ) -> Result<Event> {
        let event = Event::new(parent, actor, update_type, message);
        self.repos.events.append(&event).await?;
        Ok(event)
    }
}

fn require_role(actor: &ActorContext, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(CoordinatorError::NotPermitted(format!(
            "{} cannot perform this operation",
            actor.role
        )))
    }
}

fn require_organization(actor: &ActorContext) -> Result<&str> {
    actor
        .organization
        .as_deref()
        .ok_or_else(|| CoordinatorError::NotPermitted("actor has no organization".to_string()))
}
