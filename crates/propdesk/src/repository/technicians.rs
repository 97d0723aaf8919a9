//! Technician rows and their manager-scoped companion rows.
//!
//! The primary row `TECH#<email>` carries the manager association set. One
//! companion row `PM#<manager>` / `TECH#<email>` exists per associated
//! manager so a manager's technicians are a single base-table partition scan.
//! Every write that changes the association set also writes or deletes the
//! matching companions.

use std::collections::BTreeSet;
use std::sync::Arc;

use propdesk_core::entities::{InviteStatus, Technician, TechnicianLink};
use propdesk_core::storage::conversions::{
    attr, item_to_technician, item_to_technician_link, person_search_text, technician_link_to_item,
    technician_to_item,
};
use propdesk_core::storage::{
    keys, AttributeValue, Condition, EntityType, Index, KeyCondition, QueryRequest,
    ReadConsistency, RepositoryError, Result, TableStore, UpdateAction,
};

use super::users::search_filter;
use super::{exists_on_condition, not_found_on_condition};
use crate::query::{fetch_page, Page, PageRequest};

const ENTITY: &str = "Technician";

fn link_for(technician: &Technician, manager_email: &str) -> TechnicianLink {
    TechnicianLink {
        manager_email: manager_email.to_string(),
        technician_email: technician.email.clone(),
        name: technician.name.clone(),
        status: technician.status,
    }
}

#[derive(Clone)]
pub struct TechnicianRepository {
    store: Arc<dyn TableStore>,
}

impl TechnicianRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, email: &str) -> Result<Option<Technician>> {
        self.get_with(email, ReadConsistency::Eventual).await
    }

    pub async fn get_consistent(&self, email: &str) -> Result<Option<Technician>> {
        self.get_with(email, ReadConsistency::Strong).await
    }

    async fn get_with(
        &self,
        email: &str,
        consistency: ReadConsistency,
    ) -> Result<Option<Technician>> {
        let item = self.store.get_item(&keys::technician_key(email), consistency).await?;
        item.as_ref().map(item_to_technician).transpose()
    }

    /// Writes the primary row, then one companion per associated manager.
    pub async fn create(&self, technician: &Technician) -> Result<()> {
        self.store
            .put_item(technician_to_item(technician), Some(Condition::NotExists))
            .await
            .map_err(exists_on_condition(ENTITY, &technician.email))?;

        self.put_links(technician, &technician.manager_emails).await?;

        tracing::debug!(
            email = %technician.email,
            managers = technician.manager_emails.len(),
            "Created technician"
        );
        Ok(())
    }

    /// Changes name and/or status and re-syncs every companion row.
    pub async fn update_profile(
        &self,
        email: &str,
        name: Option<&str>,
        status: Option<InviteStatus>,
    ) -> Result<Technician> {
        let mut actions = Vec::new();
        if let Some(name) = name {
            actions.push(UpdateAction::set(attr::NAME, AttributeValue::string(name)));
            actions.push(UpdateAction::set(
                attr::SEARCH_TEXT,
                AttributeValue::S(person_search_text(name, email)),
            ));
        }
        if let Some(status) = status {
            actions.push(UpdateAction::set(
                attr::STATUS,
                AttributeValue::string(status.as_str()),
            ));
        }
        if actions.is_empty() {
            return self.require(email).await;
        }

        let item = self
            .store
            .update_item(&keys::technician_key(email), actions, Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;
        let technician = item_to_technician(&item)?;

        self.put_links(&technician, &technician.manager_emails).await?;
        Ok(technician)
    }

    /// Associates managers with the technician and writes their companions.
    pub async fn add_managers(
        &self,
        email: &str,
        managers: &BTreeSet<String>,
    ) -> Result<Technician> {
        if managers.is_empty() {
            return self.require(email).await;
        }

        let item = self
            .store
            .update_item(
                &keys::technician_key(email),
                vec![UpdateAction::add_to_set(attr::MANAGER_EMAILS, managers.iter().cloned())],
                Some(Condition::Exists),
            )
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;
        let technician = item_to_technician(&item)?;

        self.put_links(&technician, managers).await?;
        Ok(technician)
    }

    /// Dissociates managers and deletes their companions.
    pub async fn remove_managers(
        &self,
        email: &str,
        managers: &BTreeSet<String>,
    ) -> Result<Technician> {
        if managers.is_empty() {
            return self.require(email).await;
        }

        let item = self
            .store
            .update_item(
                &keys::technician_key(email),
                vec![UpdateAction::remove_from_set(
                    attr::MANAGER_EMAILS,
                    managers.iter().cloned(),
                )],
                Some(Condition::Exists),
            )
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;

        self.delete_links(email, managers).await?;
        item_to_technician(&item)
    }

    /// Technicians a manager may assign, from the companion rows.
    pub async fn list_for_manager(
        &self,
        manager_email: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<TechnicianLink>> {
        let request = QueryRequest::new(Index::Table, keys::manager_partition(manager_email))
            .sort_key(KeyCondition::BeginsWith(EntityType::Technician.prefix()))
            .filters(search_filter(search, &[attr::SEARCH_TEXT]));

        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_technician_link(&item))
    }

    pub async fn list_for_organization(
        &self,
        organization: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Technician>> {
        let request = QueryRequest::new(Index::Gsi2, keys::organization_partition(organization))
            .sort_key(KeyCondition::BeginsWith(EntityType::Technician.prefix()))
            .filters(search_filter(search, &[attr::SEARCH_TEXT]));

        fetch_page(self.store.as_ref(), request, page)
            .await?
            .try_map(|item| item_to_technician(&item))
    }

    /// Drops the row out of its organization listing.
    pub async fn clear_organization_index(&self, email: &str) -> Result<()> {
        let actions = vec![
            UpdateAction::remove(Index::Gsi2.partition_attribute()),
            UpdateAction::remove(Index::Gsi2.sort_attribute()),
        ];
        self.store
            .update_item(&keys::technician_key(email), actions, Some(Condition::Exists))
            .await
            .map_err(not_found_on_condition(ENTITY, email))?;
        Ok(())
    }

    /// Deletes the primary row and every companion.
    pub async fn delete(&self, email: &str) -> Result<()> {
        let technician = self.require(email).await?;
        self.delete_links(email, &technician.manager_emails).await?;
        self.store
            .delete_item(&keys::technician_key(email), None)
            .await?;

        tracing::debug!(email = %email, "Deleted technician");
        Ok(())
    }

    async fn require(&self, email: &str) -> Result<Technician> {
        self.get_consistent(email)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY,
                id: email.to_string(),
            })
    }

    async fn put_links(&self, technician: &Technician, managers: &BTreeSet<String>) -> Result<()> {
        for manager in managers {
            self.store
                .put_item(technician_link_to_item(&link_for(technician, manager)), None)
                .await?;
        }
        Ok(())
    }

    async fn delete_links(&self, email: &str, managers: &BTreeSet<String>) -> Result<()> {
        for manager in managers {
            self.store
                .delete_item(&keys::technician_link_key(manager, email), None)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::repository::testing::repositories;

    fn technician(email: &str, managers: &[&str]) -> Technician {
        Technician {
            email: email.to_string(),
            name: "Terry Tech".to_string(),
            organization: "org-1".to_string(),
            organization_name: None,
            status: InviteStatus::Invited,
            manager_emails: managers.iter().map(|m| m.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    async fn linked(repos: &crate::repository::Repositories, manager: &str) -> Vec<String> {
        repos
            .technicians
            .list_for_manager(manager, None, PageRequest::all())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|link| link.technician_email)
            .collect()
    }

    #[tokio::test]
    async fn test_create_writes_companion_rows() {
        let repos = repositories();
        repos
            .technicians
            .create(&technician("t@example.com", &["pm1@example.com", "pm2@example.com"]))
            .await
            .unwrap();

        assert_eq!(linked(&repos, "pm1@example.com").await, vec!["t@example.com"]);
        assert_eq!(linked(&repos, "pm2@example.com").await, vec!["t@example.com"]);

        let err = repos
            .technicians
            .create(&technician("t@example.com", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_manager_deltas_keep_companions_in_sync() {
        let repos = repositories();
        repos
            .technicians
            .create(&technician("t@example.com", &["pm1@example.com"]))
            .await
            .unwrap();

        repos
            .technicians
            .add_managers("t@example.com", &BTreeSet::from(["pm2@example.com".to_string()]))
            .await
            .unwrap();
        let updated = repos
            .technicians
            .remove_managers("t@example.com", &BTreeSet::from(["pm1@example.com".to_string()]))
            .await
            .unwrap();

        assert_eq!(
            updated.manager_emails,
            BTreeSet::from(["pm2@example.com".to_string()])
        );
        assert!(linked(&repos, "pm1@example.com").await.is_empty());
        assert_eq!(linked(&repos, "pm2@example.com").await, vec!["t@example.com"]);
    }

    #[tokio::test]
    async fn test_update_profile_resyncs_companions() {
        let repos = repositories();
        repos
            .technicians
            .create(&technician("t@example.com", &["pm1@example.com"]))
            .await
            .unwrap();

        repos
            .technicians
            .update_profile("t@example.com", Some("Tara Tech"), Some(InviteStatus::Joined))
            .await
            .unwrap();

        let page = repos
            .technicians
            .list_for_manager("pm1@example.com", Some("tara"), PageRequest::sized(10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].status, InviteStatus::Joined);
    }

    #[tokio::test]
    async fn test_organization_listing_and_index_clear() {
        let repos = repositories();
        repos
            .technicians
            .create(&technician("t@example.com", &[]))
            .await
            .unwrap();

        let page = repos
            .technicians
            .list_for_organization("org-1", None, PageRequest::all())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        repos
            .technicians
            .clear_organization_index("t@example.com")
            .await
            .unwrap();
        let page = repos
            .technicians
            .list_for_organization("org-1", None, PageRequest::all())
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_companions() {
        let repos = repositories();
        repos
            .technicians
            .create(&technician("t@example.com", &["pm1@example.com"]))
            .await
            .unwrap();

        repos.technicians.delete("t@example.com").await.unwrap();

        assert!(repos.technicians.get("t@example.com").await.unwrap().is_none());
        assert!(linked(&repos, "pm1@example.com").await.is_empty());
    }
}
