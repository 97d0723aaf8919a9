//! Property rows, indexed by address under their manager and organization.

use std::collections::BTreeSet;
use std::sync::Arc;

use propdesk_core::entities::{Address, Property};
use propdesk_core::storage::conversions::{
    address_to_value, attr, item_to_property, property_to_item,
};
use propdesk_core::storage::{
    keys, AttributeValue, Condition, EntityType, Index, KeyCondition, QueryRequest,
    ReadConsistency, RepositoryError, Result, TableStore, UpdateAction, GSI1SK, GSI2SK,
};

use super::users::search_filter;
use super::{exists_on_condition, not_found_on_condition};
use crate::query::{fetch_all, fetch_page, Page, PageRequest};

const ENTITY: &str = "Property";

#[derive(Clone)]
pub struct PropertyRepository {
    store: Arc<dyn TableStore>,
}

impl PropertyRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Property>> {
        self.get_with(id, ReadConsistency::Eventual).await
    }

    pub async fn get_consistent(&self, id: &str) -> Result<Option<Property>> {
        self.get_with(id, ReadConsistency::Strong).await
    }

    async fn get_with(&self, id: &str, consistency: ReadConsistency) -> Result<Option<Property>> {
        let item = self.store.get_item(&keys::property_key(id), consistency).await?;
        item.as_ref().map(item_to_property).transpose()
    }

    /// Writes a new row; fails with `AlreadyExists` if the id is taken.
    ///
    /// Address uniqueness is checked by the caller with [`find_by_address`].
    ///
    /// [`find_by_address`]: Self::find_by_address
    pub async fn create(&self, property: &Property) -> Result<()> {
        self.store
            .put_item(property_to_item(property), Some(Condition::NotExists))
            .await
            .map_err(exists_on_condition(ENTITY, &property.id))?;

        tracing::debug!(
            property_id = %property.id,
            organization = %property.organization,
            "Created property"
        );
        Ok(())
    }

    /// The property at exactly this address in the organization, if any.
    pub async fn find_by_address(
        &self,
        organization: &str,
        address: &Address,
    ) -> Result<Option<Property>> {
        let request = QueryRequest::new(Index::Gsi2, keys::organization_partition(organization))
            .sort_key(KeyCondition::Equals(keys::address_sort_key(address)));

        let page = fetch_all(self.store.as_ref(), request).await?;
        page.items.first().map(item_to_property).transpose()
    }

    pub async fn add_tenants(&self, id: &str, tenants: &BTreeSet<String>) -> Result<Property> {
        self.change_tenants(
            id,
            UpdateAction::add_to_set(attr::TENANT_EMAILS, tenants.iter().cloned()),
        )
        .await
    }

    pub async fn remove_tenants(&self, id: &str, tenants: &BTreeSet<String>) -> Result<Property> {
        self.change_tenants(
            id,
            UpdateAction::remove_from_set(attr::TENANT_EMAILS, tenants.iter().cloned()),
        )
        .await
    }

    async fn change_tenants(&self, id: &str, delta: UpdateAction) -> Result<Property> {
        if delta.is_empty_delta() {
            return self
                .get_consistent(id)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY,
                    id: id.to_string(),
                });
        }

        let item = self
            .store
            .update_item(&keys::property_key(id), vec![delta], Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, id))?;
        item_to_property(&item)
    }

    /// Rewrites the address and every attribute derived from it.
    pub async fn update_address(&self, id: &str, address: &Address) -> Result<Property> {
        let sort_key = AttributeValue::S(keys::address_sort_key(address));
        let actions = vec![
            UpdateAction::set(attr::ADDRESS, address_to_value(address)),
            UpdateAction::set(attr::SEARCH_TEXT, AttributeValue::S(address.search_string())),
            UpdateAction::set(GSI1SK, sort_key.clone()),
            UpdateAction::set(GSI2SK, sort_key),
        ];

        let item = self
            .store
            .update_item(&keys::property_key(id), actions, Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, id))?;

        tracing::debug!(property_id = %id, address = %address, "Updated property address");
        item_to_property(&item)
    }

    /// Properties of a manager in address order.
    pub async fn list_for_manager(
        &self,
        manager_email: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Property>> {
        self.list(Index::Gsi1, keys::manager_partition(manager_email), search, page)
            .await
    }

    /// Properties of an organization in address order.
    pub async fn list_for_organization(
        &self,
        organization: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Property>> {
        self.list(Index::Gsi2, keys::organization_partition(organization), search, page)
            .await
    }

    async fn list(
        &self,
        index: Index,
        partition: String,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Property>> {
        let request = QueryRequest::new(index, partition)
            .sort_key(KeyCondition::BeginsWith(EntityType::Property.prefix()))
            .filters(search_filter(search, &[attr::SEARCH_TEXT]));

        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_property(&item))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store
            .delete_item(&keys::property_key(id), Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, id))?;

        tracing::debug!(property_id = %id, "Deleted property");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{capped_repositories, repositories};

    fn elm(unit: Option<&str>) -> Address {
        let address = Address::new("12 Elm St", "Springfield", "IL", "62701");
        match unit {
            Some(unit) => address.with_unit(unit),
            None => address,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_address() {
        let repos = repositories();
        let property = Property::new(elm(None), "pm@example.com", "org-1");
        repos.properties.create(&property).await.unwrap();

        let found = repos
            .properties
            .find_by_address("org-1", &Address::new(" 12  elm st ", "SPRINGFIELD", "il", "62701"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, property.id);

        let missing = repos
            .properties
            .find_by_address("org-2", &elm(None))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_different_unit_is_a_different_address() {
        let repos = repositories();
        repos
            .properties
            .create(&Property::new(elm(Some("1A")), "pm@example.com", "org-1"))
            .await
            .unwrap();

        let other_unit = repos
            .properties
            .find_by_address("org-1", &elm(Some("2B")))
            .await
            .unwrap();
        assert!(other_unit.is_none());
    }

    #[tokio::test]
    async fn test_create_same_id_twice_fails() {
        let repos = repositories();
        let property = Property::new(elm(None), "pm@example.com", "org-1");
        repos.properties.create(&property).await.unwrap();

        let err = repos.properties.create(&property).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_tenant_set_deltas() {
        let repos = repositories();
        let property = Property::new(elm(None), "pm@example.com", "org-1");
        repos.properties.create(&property).await.unwrap();

        let tenants = BTreeSet::from(["a@example.com".to_string(), "b@example.com".to_string()]);
        repos.properties.add_tenants(&property.id, &tenants).await.unwrap();
        let updated = repos
            .properties
            .remove_tenants(&property.id, &BTreeSet::from(["a@example.com".to_string()]))
            .await
            .unwrap();

        assert_eq!(
            updated.tenant_emails,
            BTreeSet::from(["b@example.com".to_string()])
        );
    }

    #[tokio::test]
    async fn test_update_address_moves_sort_key() {
        let repos = repositories();
        let property = Property::new(elm(None), "pm@example.com", "org-1");
        repos.properties.create(&property).await.unwrap();

        let oak = Address::new("1 Oak Ave", "Springfield", "IL", "62701");
        repos.properties.update_address(&property.id, &oak).await.unwrap();

        assert!(repos
            .properties
            .find_by_address("org-1", &elm(None))
            .await
            .unwrap()
            .is_none());
        let found = repos
            .properties
            .find_by_address("org-1", &oak)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.address, oak);
    }

    #[tokio::test]
    async fn test_listing_is_in_address_order() {
        let repos = capped_repositories(2);
        for street in ["9 Pine Rd", "1 Ash Ct", "5 Maple Dr"] {
            let address = Address::new(street, "Springfield", "IL", "62701");
            repos
                .properties
                .create(&Property::new(address, "pm@example.com", "org-1"))
                .await
                .unwrap();
        }

        let page = repos
            .properties
            .list_for_manager("pm@example.com", None, PageRequest::all())
            .await
            .unwrap();
        let streets: Vec<_> = page.items.iter().map(|p| p.address.street.as_str()).collect();
        assert_eq!(streets, vec!["1 Ash Ct", "5 Maple Dr", "9 Pine Rd"]);

        let page = repos
            .properties
            .list_for_organization("org-1", Some("maple"), PageRequest::sized(1))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].address.street, "5 Maple Dr");
    }
}
