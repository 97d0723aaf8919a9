//! Base user rows: one per email, holding every role the person has.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;

use propdesk_core::entities::{AddressSnapshot, InviteStatus, Role, User};
use propdesk_core::storage::conversions::{
    address_string, addresses_to_value, attr, item_to_user, person_search_text, ENTITY_TYPE_USER,
};
use propdesk_core::storage::{
    keys, AttributeValue, Condition, Filter, Index, Item, KeyCondition, QueryRequest,
    ReadConsistency, Relationship, RepositoryError, Result, TableStore, UpdateAction, GSI1PK,
    GSI1SK, GSI2PK, GSI2SK,
};

use super::not_found_on_condition;
use crate::query::{fetch_page, Page, PageRequest};

const ENTITY: &str = "User";

/// Partial attributes for a user upsert. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpsert {
    pub email: String,
    pub name: Option<String>,
    pub organization: Option<String>,
    pub organization_name: Option<String>,
    /// Roles added to whatever the row already holds.
    pub add_roles: BTreeSet<Role>,
    pub status: Option<InviteStatus>,
    pub is_admin: Option<bool>,
    pub manager_email: Option<String>,
    /// Replaces the whole address map when set.
    pub addresses: Option<BTreeMap<String, AddressSnapshot>>,
}

impl UserUpsert {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn organization(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.organization = Some(id.into());
        self.organization_name = name;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.add_roles.insert(role);
        self
    }

    pub fn status(mut self, status: InviteStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = Some(is_admin);
        self
    }

    pub fn manager(mut self, manager_email: impl Into<String>) -> Self {
        self.manager_email = Some(manager_email.into());
        self
    }

    pub fn addresses(mut self, addresses: BTreeMap<String, AddressSnapshot>) -> Self {
        self.addresses = Some(addresses);
        self
    }

    fn actions(&self) -> Vec<UpdateAction> {
        let now = AttributeValue::S(Utc::now().to_rfc3339());
        let mut actions = vec![
            UpdateAction::set(attr::ENTITY_TYPE, AttributeValue::string(ENTITY_TYPE_USER)),
            UpdateAction::set(attr::EMAIL, AttributeValue::string(&self.email)),
            UpdateAction::set_if_absent(attr::CREATED_AT, now.clone()),
            UpdateAction::set(attr::UPDATED_AT, now),
        ];

        match self.status {
            Some(status) => actions.push(UpdateAction::set(
                attr::STATUS,
                AttributeValue::string(status.as_str()),
            )),
            None => actions.push(UpdateAction::set_if_absent(
                attr::STATUS,
                AttributeValue::string(InviteStatus::Created.as_str()),
            )),
        }

        if let Some(name) = &self.name {
            actions.push(UpdateAction::set(attr::NAME, AttributeValue::string(name)));
            actions.push(UpdateAction::set(
                attr::SEARCH_TEXT,
                AttributeValue::S(person_search_text(name, &self.email)),
            ));
        }
        if let Some(organization) = &self.organization {
            actions.push(UpdateAction::set(
                attr::ORGANIZATION,
                AttributeValue::string(organization),
            ));
        }
        if let Some(organization_name) = &self.organization_name {
            actions.push(UpdateAction::set(
                attr::ORGANIZATION_NAME,
                AttributeValue::string(organization_name),
            ));
        }
        if let Some(is_admin) = self.is_admin {
            actions.push(UpdateAction::set(attr::IS_ADMIN, AttributeValue::Bool(is_admin)));
        }
        if let Some(manager_email) = &self.manager_email {
            actions.push(UpdateAction::set(
                attr::MANAGER_EMAIL,
                AttributeValue::string(manager_email),
            ));
        }
        if !self.add_roles.is_empty() {
            actions.push(UpdateAction::add_to_set(
                attr::ROLES,
                self.add_roles.iter().map(Role::as_str),
            ));
        }
        if let Some(addresses) = &self.addresses {
            actions.extend(address_map_actions(addresses));
        }

        // Index attributes follow the roles being added.
        if let (true, Some(manager)) =
            (self.add_roles.contains(&Role::Tenant), &self.manager_email)
        {
            let (pk, sk) = keys::tenant_index_keys(manager, &self.email);
            actions.push(UpdateAction::set(GSI1PK, AttributeValue::S(pk)));
            actions.push(UpdateAction::set(GSI1SK, AttributeValue::S(sk)));
        }
        if let (true, Some(organization)) = (
            self.add_roles.contains(&Role::PropertyManager),
            &self.organization,
        ) {
            let (pk, sk) = keys::manager_index_keys(organization, &self.email);
            actions.push(UpdateAction::set(GSI2PK, AttributeValue::S(pk)));
            actions.push(UpdateAction::set(GSI2SK, AttributeValue::S(sk)));
        }

        actions
    }
}

fn address_map_actions(addresses: &BTreeMap<String, AddressSnapshot>) -> Vec<UpdateAction> {
    let mut actions = vec![UpdateAction::set(attr::ADDRESSES, addresses_to_value(addresses))];
    if addresses.is_empty() {
        actions.push(UpdateAction::remove(attr::ADDRESS_STRING));
    } else {
        actions.push(UpdateAction::set(
            attr::ADDRESS_STRING,
            AttributeValue::S(address_string(addresses)),
        ));
    }
    actions
}

fn parse_roles(item: &Item) -> Result<BTreeSet<Role>> {
    Ok(item_to_user(item)?.roles)
}

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn TableStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, email: &str) -> Result<Option<User>> {
        self.get_with(email, ReadConsistency::Eventual).await
    }

    /// Reads the row, reflecting every write that completed before the call.
    pub async fn get_consistent(&self, email: &str) -> Result<Option<User>> {
        self.get_with(email, ReadConsistency::Strong).await
    }

    async fn get_with(&self, email: &str, consistency: ReadConsistency) -> Result<Option<User>> {
        let item = self.store.get_item(&keys::user_key(email), consistency).await?;
        item.as_ref().map(item_to_user).transpose()
    }

    /// Creates the row or merges the given attributes into an existing one.
    ///
    /// Applying the same upsert twice leaves the same roles behind.
    pub async fn upsert(&self, upsert: &UserUpsert) -> Result<User> {
        let key = keys::user_key(&upsert.email);
        let item = self.store.update_item(&key, upsert.actions(), None).await?;

        tracing::debug!(
            email = %upsert.email,
            roles = ?upsert.add_roles,
            "Upserted user"
        );

        item_to_user(&item)
    }

    /// Adds roles; returns the role set after the write.
    pub async fn add_roles(&self, email: &str, roles: &BTreeSet<Role>) -> Result<BTreeSet<Role>> {
        self.change_roles(
            email,
            UpdateAction::add_to_set(attr::ROLES, roles.iter().map(Role::as_str)),
        )
        .await
    }

    /// Removes roles; returns the role set that remains.
    pub async fn remove_roles(
        &self,
        email: &str,
        roles: &BTreeSet<Role>,
    ) -> Result<BTreeSet<Role>> {
        self.change_roles(
            email,
            UpdateAction::remove_from_set(attr::ROLES, roles.iter().map(Role::as_str)),
        )
        .await
    }

    async fn change_roles(&self, email: &str, delta: UpdateAction) -> Result<BTreeSet<Role>> {
        if delta.is_empty_delta() {
            return self
                .get_consistent(email)
                .await?
                .map(|user| user.roles)
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY,
                    id: email.to_string(),
                });
        }

        let actions = vec![
            delta,
            UpdateAction::set(attr::UPDATED_AT, AttributeValue::S(Utc::now().to_rfc3339())),
        ];
        let item = self
            .store
            .update_item(&keys::user_key(email), actions, Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;
        parse_roles(&item)
    }

    /// Strips the key attributes of one secondary index from the row.
    pub async fn clear_index_attributes(&self, email: &str, index: Index) -> Result<()> {
        if index == Index::Table {
            return Err(RepositoryError::InvalidData(
                "base table keys cannot be cleared".to_string(),
            ));
        }

        let actions = vec![
            UpdateAction::remove(index.partition_attribute()),
            UpdateAction::remove(index.sort_attribute()),
        ];
        self.store
            .update_item(&keys::user_key(email), actions, Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;

        tracing::debug!(email = %email, index = ?index, "Cleared index attributes");
        Ok(())
    }

    /// Writes the whole address map back.
    ///
    /// There is no delta primitive for maps: callers read, modify and write,
    /// and a concurrent writer between the read and this call is lost.
    pub async fn put_address_map(
        &self,
        email: &str,
        addresses: &BTreeMap<String, AddressSnapshot>,
    ) -> Result<User> {
        let mut actions = address_map_actions(addresses);
        actions.push(UpdateAction::set(
            attr::UPDATED_AT,
            AttributeValue::S(Utc::now().to_rfc3339()),
        ));

        let item = self
            .store
            .update_item(&keys::user_key(email), actions, Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;
        item_to_user(&item)
    }

    pub async fn add_alternate_names(&self, email: &str, names: &BTreeSet<String>) -> Result<()> {
        self.change_alternate_names(
            email,
            UpdateAction::add_to_set(attr::ALTERNATE_NAMES, names.iter().cloned()),
        )
        .await
    }

    pub async fn remove_alternate_names(
        &self,
        email: &str,
        names: &BTreeSet<String>,
    ) -> Result<()> {
        self.change_alternate_names(
            email,
            UpdateAction::remove_from_set(attr::ALTERNATE_NAMES, names.iter().cloned()),
        )
        .await
    }

    async fn change_alternate_names(&self, email: &str, delta: UpdateAction) -> Result<()> {
        if delta.is_empty_delta() {
            return Ok(());
        }
        self.store
            .update_item(&keys::user_key(email), vec![delta], Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;
        Ok(())
    }

    /// Tenants invited by a property manager, ordered by email.
    pub async fn list_tenants_for_manager(
        &self,
        manager_email: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>> {
        let request = QueryRequest::new(Index::Gsi1, keys::manager_partition(manager_email))
            .sort_key(KeyCondition::BeginsWith(format!(
                "{}{}",
                Relationship::Tenant.tag(),
                keys::DELIMITER
            )))
            .filters(search_filter(search, &[attr::SEARCH_TEXT, attr::ADDRESS_STRING]));

        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_user(&item))
    }

    /// Property managers of an organization, ordered by email.
    pub async fn list_managers_for_organization(
        &self,
        organization: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>> {
        let request = QueryRequest::new(Index::Gsi2, keys::organization_partition(organization))
            .sort_key(KeyCondition::BeginsWith(format!(
                "{}{}",
                Relationship::PropertyManager.tag(),
                keys::DELIMITER
            )))
            .filters(search_filter(search, &[attr::SEARCH_TEXT]));

        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_user(&item))
    }

    /// Physically removes the row.
    pub async fn delete(&self, email: &str) -> Result<()> {
        self.store
            .delete_item(&keys::user_key(email), Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;

        tracing::debug!(email = %email, "Deleted user");
        Ok(())
    }
}

/// Free-text search filter, or nothing for an empty needle.
pub(crate) fn search_filter(search: Option<&str>, attributes: &[&str]) -> Option<Filter> {
    search
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| Filter::search(attributes, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::{capped_repositories, repositories};
    use propdesk_core::entities::Address;

    fn snapshot(street: &str, is_primary: bool) -> AddressSnapshot {
        AddressSnapshot {
            address: Address::new(street, "Springfield", "IL", "62701"),
            is_primary,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repos = repositories();
        let upsert = UserUpsert::new("tenant@example.com")
            .name("Tina Tenant")
            .role(Role::Tenant)
            .manager("pm@example.com");

        let first = repos.users.upsert(&upsert).await.unwrap();
        let second = repos.users.upsert(&upsert).await.unwrap();

        assert_eq!(first.roles, second.roles);
        assert_eq!(second.roles, BTreeSet::from([Role::Tenant]));
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.status, InviteStatus::Created);
    }

    #[tokio::test]
    async fn test_upsert_adds_role_to_existing_user() {
        let repos = repositories();
        repos
            .users
            .upsert(&UserUpsert::new("sam@example.com").name("Sam").role(Role::Technician))
            .await
            .unwrap();

        let user = repos
            .users
            .upsert(
                &UserUpsert::new("sam@example.com")
                    .role(Role::Tenant)
                    .manager("pm@example.com"),
            )
            .await
            .unwrap();

        assert_eq!(user.roles, BTreeSet::from([Role::Technician, Role::Tenant]));
        assert_eq!(user.name, "Sam");
    }

    #[tokio::test]
    async fn test_role_deltas_return_remaining_roles() {
        let repos = repositories();
        repos
            .users
            .upsert(
                &UserUpsert::new("pm@example.com")
                    .role(Role::PropertyManager)
                    .role(Role::Tenant),
            )
            .await
            .unwrap();

        let remaining = repos
            .users
            .remove_roles("pm@example.com", &BTreeSet::from([Role::Tenant]))
            .await
            .unwrap();
        assert_eq!(remaining, BTreeSet::from([Role::PropertyManager]));

        let err = repos
            .users
            .add_roles("nobody@example.com", &BTreeSet::from([Role::Tenant]))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_tenant_listing_follows_index_attributes() {
        let repos = repositories();
        for email in ["b@example.com", "a@example.com"] {
            repos
                .users
                .upsert(
                    &UserUpsert::new(email)
                        .name(email)
                        .role(Role::Tenant)
                        .manager("pm@example.com"),
                )
                .await
                .unwrap();
        }

        let page = repos
            .users
            .list_tenants_for_manager("pm@example.com", None, PageRequest::all())
            .await
            .unwrap();
        let emails: Vec<_> = page.items.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);

        repos
            .users
            .clear_index_attributes("a@example.com", Index::Gsi1)
            .await
            .unwrap();
        let page = repos
            .users
            .list_tenants_for_manager("pm@example.com", None, PageRequest::all())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_tenant_search_matches_address_string() {
        let repos = capped_repositories(1);
        let addresses = BTreeMap::from([("p1".to_string(), snapshot("12 Elm St", true))]);
        repos
            .users
            .upsert(
                &UserUpsert::new("elm@example.com")
                    .name("Eli")
                    .role(Role::Tenant)
                    .manager("pm@example.com")
                    .addresses(addresses),
            )
            .await
            .unwrap();
        repos
            .users
            .upsert(
                &UserUpsert::new("oak@example.com")
                    .name("Olive")
                    .role(Role::Tenant)
                    .manager("pm@example.com"),
            )
            .await
            .unwrap();

        let page = repos
            .users
            .list_tenants_for_manager("pm@example.com", Some("elm st"), PageRequest::sized(10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].email, "elm@example.com");
    }

    #[tokio::test]
    async fn test_put_address_map_replaces_whole_map() {
        let repos = repositories();
        repos
            .users
            .upsert(
                &UserUpsert::new("t@example.com")
                    .addresses(BTreeMap::from([("p1".to_string(), snapshot("1 A St", true))])),
            )
            .await
            .unwrap();

        let user = repos
            .users
            .put_address_map(
                "t@example.com",
                &BTreeMap::from([("p2".to_string(), snapshot("2 B St", true))]),
            )
            .await
            .unwrap();

        assert_eq!(user.addresses.keys().collect::<Vec<_>>(), vec!["p2"]);
    }

    #[tokio::test]
    async fn test_manager_listing_by_organization() {
        let repos = repositories();
        repos
            .users
            .upsert(
                &UserUpsert::new("pm@example.com")
                    .name("Pat")
                    .organization("org-1", Some("Acme".to_string()))
                    .role(Role::PropertyManager),
            )
            .await
            .unwrap();
        repos
            .users
            .add_alternate_names("pm@example.com", &BTreeSet::from(["Acme Rentals".to_string()]))
            .await
            .unwrap();

        let page = repos
            .users
            .list_managers_for_organization("org-1", Some("pat"), PageRequest::sized(5))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].alternate_names.contains("Acme Rentals"));
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_not_found() {
        let repos = repositories();
        let err = repos.users.delete("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
