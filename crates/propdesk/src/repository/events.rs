//! Append-only audit events, stored in their parent's partition.

use std::sync::Arc;

use propdesk_core::entities::{Event, EventParent};
use propdesk_core::storage::conversions::{event_to_item, item_to_event};
use propdesk_core::storage::{
    keys, Condition, EntityType, Index, KeyCondition, QueryRequest, Result, TableStore,
};

use super::exists_on_condition;
use crate::query::{fetch_page, Page, PageRequest};

#[derive(Clone)]
pub struct EventRepository {
    store: Arc<dyn TableStore>,
}

impl EventRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Appends an event. Events are never updated or deleted.
    pub async fn append(&self, event: &Event) -> Result<()> {
        self.store
            .put_item(event_to_item(event), Some(Condition::NotExists))
            .await
            .map_err(exists_on_condition("Event", &event.id))?;

        tracing::debug!(
            event_id = %event.id,
            parent = ?event.parent,
            update_type = %event.update_type,
            "Appended event"
        );
        Ok(())
    }

    pub async fn list_for_work_order(&self, id: &str, page: PageRequest) -> Result<Page<Event>> {
        self.list(&EventParent::WorkOrder(id.to_string()), page).await
    }

    pub async fn list_for_property(&self, id: &str, page: PageRequest) -> Result<Page<Event>> {
        self.list(&EventParent::Property(id.to_string()), page).await
    }

    /// Newest first.
    async fn list(&self, parent: &EventParent, page: PageRequest) -> Result<Page<Event>> {
        let request = QueryRequest::new(Index::Table, keys::event_partition(parent))
            .sort_key(KeyCondition::BeginsWith(EntityType::Event.prefix()))
            .descending();

        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_event(&item))
    }
}
