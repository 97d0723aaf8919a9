//! Work order rows.
//!
//! Listed newest first under their manager (GSI1) and tenant (GSI2). Every
//! mutation is guarded by `status <> DELETED`, so a deleted order is frozen.

use std::collections::BTreeSet;
use std::sync::Arc;

use propdesk_core::entities::{WorkOrder, WorkOrderStatus};
use propdesk_core::storage::conversions::{
    assignee_members_for, attr, item_to_work_order, work_order_to_item,
};
use propdesk_core::storage::{
    keys, AttributeValue, Condition, EntityType, Filter, Index, Item, KeyCondition, QueryRequest,
    ReadConsistency, RepositoryError, Result, TableStore, UpdateAction,
};

use super::exists_on_condition;
use super::users::search_filter;
use crate::query::{fetch_page, Page, PageRequest};

const ENTITY: &str = "WorkOrder";

/// Listing filters; every set field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOrderFilter {
    pub statuses: Option<Vec<WorkOrderStatus>>,
    pub search: Option<String>,
}

impl WorkOrderFilter {
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = WorkOrderStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(statuses) = &self.statuses {
            filters.push(Filter::in_set(
                attr::STATUS,
                statuses.iter().map(WorkOrderStatus::as_str),
            ));
        }
        filters.extend(search_filter(self.search.as_deref(), &[attr::SEARCH_TEXT]));
        filters
    }
}

fn not_deleted() -> Condition {
    Condition::All(vec![
        Condition::Exists,
        Condition::not_equals(
            attr::STATUS,
            AttributeValue::string(WorkOrderStatus::Deleted.as_str()),
        ),
    ])
}

fn raw_set(item: &Item, attribute: &str) -> BTreeSet<String> {
    item.get(attribute)
        .and_then(AttributeValue::as_ss)
        .cloned()
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct WorkOrderRepository {
    store: Arc<dyn TableStore>,
}

impl WorkOrderRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<WorkOrder>> {
        self.get_with(id, ReadConsistency::Eventual).await
    }

    pub async fn get_consistent(&self, id: &str) -> Result<Option<WorkOrder>> {
        self.get_with(id, ReadConsistency::Strong).await
    }

    async fn get_with(&self, id: &str, consistency: ReadConsistency) -> Result<Option<WorkOrder>> {
        let item = self.store.get_item(&keys::work_order_key(id), consistency).await?;
        item.as_ref().map(item_to_work_order).transpose()
    }

    pub async fn create(&self, work_order: &WorkOrder) -> Result<()> {
        self.store
            .put_item(work_order_to_item(work_order), Some(Condition::NotExists))
            .await
            .map_err(exists_on_condition(ENTITY, &work_order.id))?;

        tracing::debug!(
            work_order_id = %work_order.id,
            manager = %work_order.manager_email,
            "Created work order"
        );
        Ok(())
    }

    pub async fn update_status(&self, id: &str, status: WorkOrderStatus) -> Result<WorkOrder> {
        let item = self
            .update(
                id,
                vec![UpdateAction::set(attr::STATUS, AttributeValue::string(status.as_str()))],
            )
            .await?;
        item_to_work_order(&item)
    }

    /// Adds technicians by canonical email.
    ///
    /// Legacy `name##email` members for the same technicians are removed in a
    /// second write, so the set converges to canonical form.
    pub async fn add_assignees(&self, id: &str, emails: &BTreeSet<String>) -> Result<WorkOrder> {
        if emails.is_empty() {
            return self.require(id).await;
        }

        let item = self
            .update(
                id,
                vec![UpdateAction::add_to_set(attr::ASSIGNED_TO, emails.iter().cloned())],
            )
            .await?;

        let raw = raw_set(&item, attr::ASSIGNED_TO);
        let legacy: BTreeSet<String> = emails
            .iter()
            .flat_map(|email| assignee_members_for(&raw, email))
            .filter(|member| !emails.contains(member))
            .collect();
        if legacy.is_empty() {
            return item_to_work_order(&item);
        }

        tracing::debug!(
            work_order_id = %id,
            count = legacy.len(),
            "Rewriting legacy assignees"
        );
        let item = self
            .update(id, vec![UpdateAction::remove_from_set(attr::ASSIGNED_TO, legacy)])
            .await?;
        item_to_work_order(&item)
    }

    /// Removes technicians, matching every stored encoding of each email.
    pub async fn remove_assignees(
        &self,
        id: &str,
        emails: &BTreeSet<String>,
    ) -> Result<WorkOrder> {
        let current = self
            .store
            .get_item(&keys::work_order_key(id), ReadConsistency::Strong)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY,
                id: id.to_string(),
            })?;

        let raw = raw_set(&current, attr::ASSIGNED_TO);
        let members: BTreeSet<String> = emails
            .iter()
            .flat_map(|email| assignee_members_for(&raw, email))
            .collect();
        if members.is_empty() {
            return item_to_work_order(&current);
        }

        let item = self
            .update(id, vec![UpdateAction::remove_from_set(attr::ASSIGNED_TO, members)])
            .await?;
        item_to_work_order(&item)
    }

    pub async fn add_viewed_by(&self, id: &str, email: &str) -> Result<WorkOrder> {
        let item = self
            .update(id, vec![UpdateAction::add_to_set(attr::VIEWED_BY, [email])])
            .await?;
        item_to_work_order(&item)
    }

    pub async fn add_images(&self, id: &str, images: &BTreeSet<String>) -> Result<WorkOrder> {
        if images.is_empty() {
            return self.require(id).await;
        }
        let item = self
            .update(id, vec![UpdateAction::add_to_set(attr::IMAGES, images.iter().cloned())])
            .await?;
        item_to_work_order(&item)
    }

    /// Physically removes the row. Its events stay behind.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store
            .delete_item(&keys::work_order_key(id), Some(Condition::Exists))
            .await
            .map_err(super::not_found_on_condition(ENTITY, id))?;

        tracing::debug!(work_order_id = %id, "Deleted work order");
        Ok(())
    }

    /// A manager's work orders, newest first.
    pub async fn list_for_manager(
        &self,
        manager_email: &str,
        filter: &WorkOrderFilter,
        page: PageRequest,
    ) -> Result<Page<WorkOrder>> {
        let request = QueryRequest::new(Index::Gsi1, keys::manager_partition(manager_email))
            .sort_key(KeyCondition::BeginsWith(EntityType::WorkOrder.prefix()))
            .filters(filter.to_filters())
            .descending();
        self.list(request, page).await
    }

    /// A tenant's work orders, newest first.
    pub async fn list_for_tenant(
        &self,
        tenant_email: &str,
        filter: &WorkOrderFilter,
        page: PageRequest,
    ) -> Result<Page<WorkOrder>> {
        let request = QueryRequest::new(Index::Gsi2, keys::tenant_partition(tenant_email))
            .sort_key(KeyCondition::BeginsWith(EntityType::WorkOrder.prefix()))
            .filters(filter.to_filters())
            .descending();
        self.list(request, page).await
    }

    /// Work orders of a manager assigned to one technician, newest first.
    ///
    /// Matches the canonical email only; legacy members match once rewritten.
    pub async fn list_for_technician(
        &self,
        manager_email: &str,
        technician_email: &str,
        filter: &WorkOrderFilter,
        page: PageRequest,
    ) -> Result<Page<WorkOrder>> {
        let request = QueryRequest::new(Index::Gsi1, keys::manager_partition(manager_email))
            .sort_key(KeyCondition::BeginsWith(EntityType::WorkOrder.prefix()))
            .filters([Filter::contains(attr::ASSIGNED_TO, technician_email)])
            .filters(filter.to_filters())
            .descending();
        self.list(request, page).await
    }

    async fn list(&self, request: QueryRequest, page: PageRequest) -> Result<Page<WorkOrder>> {
        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_work_order(&item))
    }

    async fn require(&self, id: &str) -> Result<WorkOrder> {
        self.get_consistent(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY,
                id: id.to_string(),
            })
    }

    /// Applies a guarded update; a failed guard becomes `NotFound` for a
    /// missing row and stays `ConditionFailed` for a deleted one.
    async fn update(&self, id: &str, actions: Vec<UpdateAction>) -> Result<Item> {
        let key = keys::work_order_key(id);
        match self.store.update_item(&key, actions, Some(not_deleted())).await {
            Err(RepositoryError::ConditionFailed(reason)) => {
                match self.store.get_item(&key, ReadConsistency::Strong).await? {
                    None => Err(RepositoryError::NotFound {
                        entity_type: ENTITY,
                        id: id.to_string(),
                    }),
                    Some(_) => Err(RepositoryError::ConditionFailed(reason)),
                }
            }
            other => other,
        }
    }
}
