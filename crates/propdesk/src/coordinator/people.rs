//! Invitations and role removal for managers and technicians.

use std::collections::BTreeSet;

use chrono::Utc;

use propdesk_core::entities::{
    ActorContext, InviteManagerRequest, InviteStatus, InviteTechnicianRequest, Role, Technician,
    User,
};
use propdesk_core::storage::Index;

use super::{require_organization, require_role, Coordinator, CoordinatorError, Result};
use crate::notify::Notification;
use crate::repository::UserUpsert;

impl Coordinator {
    /// Invites a technician under the acting manager.
    ///
    /// A technician already working for another manager of the organization
    /// is associated rather than recreated.
    pub async fn invite_technician(
        &self,
        actor: &ActorContext,
        request: InviteTechnicianRequest,
    ) -> Result<Technician> {
        require_role(actor, &[Role::PropertyManager])?;
        let organization = require_organization(actor)?;
        let request = request.validate()?;

        let technician = match self.repos.technicians.get_consistent(&request.email).await? {
            Some(existing) if existing.manager_emails.contains(&actor.email) => {
                return Err(CoordinatorError::Duplicate(format!(
                    "{} is already one of your technicians",
                    request.email
                )));
            }
            Some(_) => {
                self.repos
                    .technicians
                    .add_managers(&request.email, &BTreeSet::from([actor.email.clone()]))
                    .await?
            }
            None => {
                let technician = Technician {
                    email: request.email.clone(),
                    name: request.name.clone(),
                    organization: organization.to_string(),
                    organization_name: None,
                    status: InviteStatus::Invited,
                    manager_emails: BTreeSet::from([actor.email.clone()]),
                    created_at: Utc::now(),
                };
                self.repos.technicians.create(&technician).await?;
                technician
            }
        };

        let is_new_user = self.repos.users.get_consistent(&request.email).await?.is_none();
        let mut upsert = UserUpsert::new(&request.email).role(Role::Technician);
        if is_new_user {
            upsert = upsert.name(&request.name).status(InviteStatus::Invited);
        }
        self.repos.users.upsert(&upsert).await?;

        self.notify(Notification::TechnicianInvited {
            email: request.email.clone(),
            name: technician.name.clone(),
            manager_name: actor.name.clone(),
        })
        .await;

        tracing::info!(
            email = %request.email,
            manager = %actor.email,
            "Invited technician"
        );
        Ok(technician)
    }

    /// Invites another property manager into the actor's organization.
    pub async fn invite_property_manager(
        &self,
        actor: &ActorContext,
        request: InviteManagerRequest,
    ) -> Result<User> {
        require_role(actor, &[Role::PropertyManager])?;
        let organization = require_organization(actor)?;
        let request = request.validate()?;
        if request.organization != organization {
            return Err(CoordinatorError::NotPermitted(format!(
                "cannot invite into organization {}",
                request.organization
            )));
        }

        let existing = self.repos.users.get_consistent(&request.email).await?;
        if existing
            .as_ref()
            .is_some_and(|user| user.has_role(Role::PropertyManager))
        {
            return Err(CoordinatorError::Duplicate(format!(
                "{} is already a property manager",
                request.email
            )));
        }

        let mut upsert = UserUpsert::new(&request.email)
            .role(Role::PropertyManager)
            .organization(&request.organization, request.organization_name.clone())
            .admin(request.is_admin);
        if existing.is_none() {
            upsert = upsert.name(&request.name).status(InviteStatus::Invited);
        }
        let user = self.repos.users.upsert(&upsert).await?;

        self.notify(Notification::ManagerInvited {
            email: request.email.clone(),
            name: request.name.clone(),
            organization: request
                .organization_name
                .clone()
                .unwrap_or_else(|| request.organization.clone()),
        })
        .await;

        Ok(user)
    }

    /// Removes one role and strips the index attributes the remaining roles
    /// no longer justify. Returns the remaining roles.
    pub async fn delete_role(
        &self,
        actor: &ActorContext,
        email: &str,
        role: Role,
    ) -> Result<BTreeSet<Role>> {
        require_role(actor, &[Role::PropertyManager])?;
        let remaining = self
            .repos
            .users
            .remove_roles(email, &BTreeSet::from([role]))
            .await?;

        // Each index belongs to exactly one role, so losing the role always
        // leaves its index attributes stale.
        match role {
            Role::Tenant => {
                self.repos
                    .users
                    .clear_index_attributes(email, Index::Gsi1)
                    .await?;
            }
            Role::PropertyManager => {
                self.repos
                    .users
                    .clear_index_attributes(email, Index::Gsi2)
                    .await?;
            }
            Role::Technician => {
                if let Some(technician) = self.repos.technicians.get_consistent(email).await? {
                    self.repos
                        .technicians
                        .remove_managers(email, &technician.manager_emails)
                        .await?;
                    self.repos.technicians.clear_organization_index(email).await?;
                }
            }
        }

        tracing::info!(email = %email, role = %role, remaining = ?remaining, "Deleted role");
        Ok(remaining)
    }

    /// Physically removes a user. Links held by properties and the
    /// technician row are cleaned up afterwards, best effort.
    pub async fn delete_user(&self, actor: &ActorContext, email: &str) -> Result<()> {
        require_role(actor, &[Role::PropertyManager])?;
        let user = self
            .repos
            .users
            .get_consistent(email)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("User", email))?;

        self.repos.users.delete(email).await?;

        let tenant = BTreeSet::from([email.to_string()]);
        for property_id in user.addresses.keys() {
            if let Err(err) = self.repos.properties.remove_tenants(property_id, &tenant).await {
                tracing::warn!(
                    email = %email,
                    property_id = %property_id,
                    error = %err,
                    "Property still lists deleted user"
                );
            }
        }
        if user.has_role(Role::Technician) {
            if let Err(err) = self.repos.technicians.delete(email).await {
                tracing::warn!(email = %email, error = %err, "Technician row not deleted");
            }
        }

        tracing::info!(email = %email, "Deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use propdesk_core::entities::{CreateTenantRequest, TenantProperty};

    use super::*;
    use crate::coordinator::testing::{coordinator, elm, manager, with_notifier};
    use crate::notify::RecordingNotifier;
    use crate::query::PageRequest;

    fn terry() -> InviteTechnicianRequest {
        InviteTechnicianRequest {
            email: "terry@example.com".to_string(),
            name: "Terry Tech".to_string(),
        }
    }

    async fn tenant_emails(coordinator: &Coordinator) -> Vec<String> {
        coordinator
            .repos
            .users
            .list_tenants_for_manager("pm@example.com", None, PageRequest::all())
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|user| user.email)
            .collect()
    }

    #[tokio::test]
    async fn test_invite_technician_twice_is_duplicate() {
        let (coordinator, notifier) = coordinator();
        coordinator.invite_technician(&manager(), terry()).await.unwrap();

        let err = coordinator
            .invite_technician(&manager(), terry())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Duplicate(_)));
        assert_eq!(notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_second_manager_is_associated_with_existing_technician() {
        let (coordinator, _) = coordinator();
        coordinator.invite_technician(&manager(), terry()).await.unwrap();

        let other = ActorContext::new("pm2@example.com", "Other Manager", Role::PropertyManager)
            .with_organization("org-1");
        let technician = coordinator.invite_technician(&other, terry()).await.unwrap();
        assert_eq!(technician.manager_emails.len(), 2);

        let linked = coordinator
            .repos
            .technicians
            .list_for_manager("pm2@example.com", None, PageRequest::all())
            .await
            .unwrap();
        assert_eq!(linked.items.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_notification_does_not_fail_invite() {
        let (coordinator, notifier) = with_notifier(RecordingNotifier::failing());
        let technician = coordinator.invite_technician(&manager(), terry()).await.unwrap();
        assert_eq!(technician.email, "terry@example.com");
        assert_eq!(notifier.sent().await.len(), 1);

        let user = coordinator.repos.users.get("terry@example.com").await.unwrap().unwrap();
        assert!(user.has_role(Role::Technician));
    }

    #[tokio::test]
    async fn test_invite_manager_outside_organization_is_rejected() {
        let (coordinator, _) = coordinator();
        let err = coordinator
            .invite_property_manager(
                &manager(),
                InviteManagerRequest {
                    email: "new@example.com".to_string(),
                    name: "New".to_string(),
                    organization: "org-2".to_string(),
                    organization_name: None,
                    is_admin: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotPermitted(_)));
    }

    #[tokio::test]
    async fn test_invited_manager_is_listed_for_organization() {
        let (coordinator, _) = coordinator();
        let user = coordinator
            .invite_property_manager(
                &manager(),
                InviteManagerRequest {
                    email: "new@example.com".to_string(),
                    name: "New Manager".to_string(),
                    organization: "org-1".to_string(),
                    organization_name: Some("Acme".to_string()),
                    is_admin: true,
                },
            )
            .await
            .unwrap();
        assert!(user.is_admin);

        let managers = coordinator
            .repos
            .users
            .list_managers_for_organization("org-1", None, PageRequest::all())
            .await
            .unwrap();
        assert_eq!(managers.items.len(), 1);

        let remaining = coordinator
            .delete_role(&manager(), "new@example.com", Role::PropertyManager)
            .await
            .unwrap();
        assert!(remaining.is_empty());
        let managers = coordinator
            .repos
            .users
            .list_managers_for_organization("org-1", None, PageRequest::all())
            .await
            .unwrap();
        assert!(managers.items.is_empty());
    }

    #[tokio::test]
    async fn test_role_deletion_clears_only_stale_index_attributes() {
        let (coordinator, _) = coordinator();
        coordinator
            .create_tenant(
                &manager(),
                CreateTenantRequest {
                    email: "terry@example.com".to_string(),
                    name: "Terry Tech".to_string(),
                    property: TenantProperty::New {
                        address: elm(),
                        bedrooms: None,
                        bathrooms: None,
                    },
                },
            )
            .await
            .unwrap();
        coordinator.invite_technician(&manager(), terry()).await.unwrap();

        let remaining = coordinator
            .delete_role(&manager(), "terry@example.com", Role::Technician)
            .await
            .unwrap();
        assert_eq!(remaining, BTreeSet::from([Role::Tenant]));
        assert_eq!(tenant_emails(&coordinator).await, vec!["terry@example.com"]);

        let technicians = coordinator
            .repos
            .technicians
            .list_for_manager("pm@example.com", None, PageRequest::all())
            .await
            .unwrap();
        assert!(technicians.items.is_empty());

        let remaining = coordinator
            .delete_role(&manager(), "terry@example.com", Role::Tenant)
            .await
            .unwrap();
        assert!(remaining.is_empty());
        assert!(tenant_emails(&coordinator).await.is_empty());

        let user = coordinator.repos.users.get("terry@example.com").await.unwrap();
        assert!(user.is_some(), "role removal keeps the row");
    }

    #[tokio::test]
    async fn test_delete_user_unlinks_properties() {
        let (coordinator, _) = coordinator();
        let user = coordinator
            .create_tenant(
                &manager(),
                CreateTenantRequest {
                    email: "t@example.com".to_string(),
                    name: "Tina".to_string(),
                    property: TenantProperty::New {
                        address: elm(),
                        bedrooms: None,
                        bathrooms: None,
                    },
                },
            )
            .await
            .unwrap();
        let property_id = user.primary_address().unwrap().0.to_string();

        coordinator.delete_user(&manager(), "t@example.com").await.unwrap();

        assert!(coordinator.repos.users.get("t@example.com").await.unwrap().is_none());
        let property = coordinator.repos.properties.get(&property_id).await.unwrap().unwrap();
        assert!(property.tenant_emails.is_empty());

        let err = coordinator
            .delete_user(&manager(), "t@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound { .. }));
    }
}
