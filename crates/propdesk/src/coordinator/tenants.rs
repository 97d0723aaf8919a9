//! Tenant protocols.
//!
//! A tenant's address map is the one attribute written by read-modify-write.
//! Two concurrent edits of the same tenant's map can lose one of them.

use std::collections::{BTreeMap, BTreeSet};

use propdesk_core::entities::{
    ActorContext, AddressSnapshot, CreateTenantRequest, EventParent, InviteStatus, Property, Role,
    TenantProperty, UpdateType, User,
};

use super::{require_organization, require_role, Coordinator, CoordinatorError, Result};
use crate::notify::Notification;
use crate::repository::UserUpsert;

/// Links a property into an address map. The first entry becomes primary.
fn link(addresses: &mut BTreeMap<String, AddressSnapshot>, property: &Property) {
    let has_primary = addresses.values().any(|s| s.is_primary);
    addresses
        .entry(property.id.clone())
        .or_insert_with(|| AddressSnapshot {
            address: property.address.clone(),
            is_primary: !has_primary,
        });
}

/// Unlinks a property; if it was primary, the first remaining entry takes over.
fn unlink(addresses: &mut BTreeMap<String, AddressSnapshot>, property_id: &str) -> bool {
    let Some(removed) = addresses.remove(property_id) else {
        return false;
    };
    if removed.is_primary {
        if let Some(next) = addresses.values_mut().next() {
            next.is_primary = true;
        }
    }
    true
}

impl Coordinator {
    /// Invites a tenant, creating the property they live at when needed.
    ///
    /// The user row is written first, holding the property id that the
    /// property row is then created with (or linked to).
    pub async fn create_tenant(
        &self,
        actor: &ActorContext,
        request: CreateTenantRequest,
    ) -> Result<User> {
        require_role(actor, &[Role::PropertyManager])?;
        let organization = require_organization(actor)?;
        let request = request.validate()?;

        let (property, is_new) = match &request.property {
            TenantProperty::Existing { property_id } => {
                let property = self
                    .repos
                    .properties
                    .get(property_id)
                    .await?
                    .ok_or_else(|| CoordinatorError::not_found("Property", property_id))?;
                if property.organization != organization {
                    return Err(CoordinatorError::NotPermitted(format!(
                        "property {property_id} belongs to another organization"
                    )));
                }
                (property, false)
            }
            TenantProperty::New {
                address,
                bedrooms,
                bathrooms,
            } => match self
                .repos
                .properties
                .find_by_address(organization, address)
                .await?
            {
                Some(existing) => (existing, false),
                None => (
                    Property::new(address.clone(), &actor.email, organization)
                        .with_rooms(*bedrooms, *bathrooms),
                    true,
                ),
            },
        };

        let existing = self.repos.users.get_consistent(&request.email).await?;
        if let Some(user) = &existing {
            if user.has_role(Role::Tenant) && user.addresses.contains_key(&property.id) {
                return Err(CoordinatorError::Duplicate(format!(
                    "{} is already a tenant of {}",
                    request.email, property.address
                )));
            }
        }

        let mut addresses = existing
            .as_ref()
            .map(|user| user.addresses.clone())
            .unwrap_or_default();
        link(&mut addresses, &property);

        let mut upsert = UserUpsert::new(&request.email)
            .role(Role::Tenant)
            .manager(&actor.email)
            .organization(organization, None)
            .addresses(addresses);
        if existing.is_none() {
            upsert = upsert.name(&request.name).status(InviteStatus::Invited);
        }
        let user = self.repos.users.upsert(&upsert).await?;

        let tenants = BTreeSet::from([request.email.clone()]);
        if is_new {
            let mut property = property.clone();
            property.tenant_emails = tenants;
            self.repos.properties.create(&property).await?;
        } else {
            self.repos.properties.add_tenants(&property.id, &tenants).await?;
        }

        self.record(
            EventParent::Property(property.id.clone()),
            actor,
            UpdateType::TenantUpdate,
            format!("Added tenant {}", request.email),
        )
        .await?;

        self.notify(Notification::TenantInvited {
            email: request.email.clone(),
            name: request.name.clone(),
            manager_name: actor.name.clone(),
        })
        .await;

        tracing::info!(
            email = %request.email,
            property_id = %property.id,
            new_property = is_new,
            "Created tenant"
        );
        Ok(user)
    }

    /// Links an existing tenant to another property.
    pub async fn add_tenant_to_property(
        &self,
        actor: &ActorContext,
        tenant_email: &str,
        property_id: &str,
    ) -> Result<User> {
        require_role(actor, &[Role::PropertyManager])?;
        let property = self
            .repos
            .properties
            .get(property_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Property", property_id))?;
        let user = self.require_tenant(tenant_email).await?;

        let mut addresses = user.addresses;
        link(&mut addresses, &property);
        let user = self.repos.users.put_address_map(tenant_email, &addresses).await?;

        self.repos
            .properties
            .add_tenants(property_id, &BTreeSet::from([tenant_email.to_string()]))
            .await?;
        self.record(
            EventParent::Property(property.id),
            actor,
            UpdateType::TenantUpdate,
            format!("Added tenant {tenant_email}"),
        )
        .await?;

        Ok(user)
    }

    /// Unlinks a tenant from a property, promoting another primary address
    /// when needed.
    pub async fn remove_tenant_from_property(
        &self,
        actor: &ActorContext,
        tenant_email: &str,
        property_id: &str,
    ) -> Result<User> {
        require_role(actor, &[Role::PropertyManager])?;
        let user = self.require_tenant(tenant_email).await?;

        let mut addresses = user.addresses.clone();
        let user = if unlink(&mut addresses, property_id) {
            self.repos.users.put_address_map(tenant_email, &addresses).await?
        } else {
            user
        };

        self.repos
            .properties
            .remove_tenants(property_id, &BTreeSet::from([tenant_email.to_string()]))
            .await?;
        self.record(
            EventParent::Property(property_id.to_string()),
            actor,
            UpdateType::TenantUpdate,
            format!("Removed tenant {tenant_email}"),
        )
        .await?;

        Ok(user)
    }

    /// Makes one linked property the tenant's only primary address.
    pub async fn set_primary_address(
        &self,
        actor: &ActorContext,
        tenant_email: &str,
        property_id: &str,
    ) -> Result<User> {
        if actor.role != Role::PropertyManager && actor.email != tenant_email {
            return Err(CoordinatorError::NotPermitted(
                "only the tenant or a property manager can change the primary address".to_string(),
            ));
        }
        let user = self.require_tenant(tenant_email).await?;
        if !user.addresses.contains_key(property_id) {
            return Err(CoordinatorError::not_found("Property", property_id));
        }

        let mut addresses = user.addresses;
        for (id, snapshot) in addresses.iter_mut() {
            snapshot.is_primary = id == property_id;
        }
        Ok(self.repos.users.put_address_map(tenant_email, &addresses).await?)
    }

    async fn require_tenant(&self, email: &str) -> Result<User> {
        match self.repos.users.get_consistent(email).await? {
            Some(user) if user.has_role(Role::Tenant) => Ok(user),
            _ => Err(CoordinatorError::not_found("Tenant", email)),
        }
    }
}

#[cfg(test)]
mod tests {
    use propdesk_core::entities::Address;

    use super::*;
    use crate::coordinator::testing::{coordinator, elm, manager};
    use crate::query::PageRequest;

    fn new_tenant(email: &str, address: Address) -> CreateTenantRequest {
        CreateTenantRequest {
            email: email.to_string(),
            name: "Tina Tenant".to_string(),
            property: TenantProperty::New {
                address,
                bedrooms: Some(1),
                bathrooms: None,
            },
        }
    }

    fn primaries(user: &User) -> Vec<&str> {
        user.addresses
            .iter()
            .filter(|(_, s)| s.is_primary)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_create_tenant_creates_property_with_same_id() {
        let (coordinator, notifier) = coordinator();
        let user = coordinator
            .create_tenant(&manager(), new_tenant(" Tina@Example.com ", elm()))
            .await
            .unwrap();

        assert_eq!(user.email, "tina@example.com");
        assert!(user.has_role(Role::Tenant));
        assert_eq!(user.status, InviteStatus::Invited);
        let (property_id, snapshot) = user.primary_address().unwrap();
        assert_eq!(snapshot.address, elm());

        let property = coordinator
            .repos
            .properties
            .get(property_id)
            .await
            .unwrap()
            .expect("property row created with the id held by the tenant");
        assert!(property.tenant_emails.contains("tina@example.com"));
        assert_eq!(notifier.sent().await.len(), 1);

        let tenants = coordinator
            .repos
            .users
            .list_tenants_for_manager("pm@example.com", None, PageRequest::all())
            .await
            .unwrap();
        assert_eq!(tenants.items.len(), 1);
    }

    #[tokio::test]
    async fn test_second_tenant_at_same_address_reuses_property() {
        let (coordinator, _) = coordinator();
        let first = coordinator
            .create_tenant(&manager(), new_tenant("a@example.com", elm()))
            .await
            .unwrap();
        let second = coordinator
            .create_tenant(&manager(), new_tenant("b@example.com", elm()))
            .await
            .unwrap();

        let first_id = first.primary_address().unwrap().0.to_string();
        assert_eq!(second.primary_address().unwrap().0, first_id);

        let property = coordinator.repos.properties.get(&first_id).await.unwrap().unwrap();
        assert_eq!(property.tenant_emails.len(), 2);
    }

    #[tokio::test]
    async fn test_create_tenant_twice_is_duplicate() {
        let (coordinator, _) = coordinator();
        coordinator
            .create_tenant(&manager(), new_tenant("a@example.com", elm()))
            .await
            .unwrap();
        let err = coordinator
            .create_tenant(&manager(), new_tenant("a@example.com", elm()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_create_tenant_keeps_existing_user_name() {
        let (coordinator, _) = coordinator();
        coordinator
            .repos
            .users
            .upsert(&UserUpsert::new("sam@example.com").name("Sam").role(Role::Technician))
            .await
            .unwrap();

        let user = coordinator
            .create_tenant(&manager(), new_tenant("sam@example.com", elm()))
            .await
            .unwrap();
        assert_eq!(user.name, "Sam");
        assert_eq!(
            user.roles,
            BTreeSet::from([Role::Tenant, Role::Technician])
        );
    }

    #[tokio::test]
    async fn test_primary_address_stays_unique() {
        let (coordinator, _) = coordinator();
        let user = coordinator
            .create_tenant(&manager(), new_tenant("a@example.com", elm()))
            .await
            .unwrap();
        let first_id = user.primary_address().unwrap().0.to_string();

        let oak = Address::new("1 Oak Ave", "Springfield", "IL", "62701");
        let other = coordinator
            .create_property(
                &manager(),
                propdesk_core::entities::CreatePropertyRequest {
                    address: oak,
                    bedrooms: None,
                    bathrooms: None,
                },
            )
            .await
            .unwrap();

        let user = coordinator
            .add_tenant_to_property(&manager(), "a@example.com", &other.id)
            .await
            .unwrap();
        assert_eq!(primaries(&user), vec![first_id.as_str()]);

        let user = coordinator
            .set_primary_address(&manager(), "a@example.com", &other.id)
            .await
            .unwrap();
        assert_eq!(primaries(&user), vec![other.id.as_str()]);

        let user = coordinator
            .remove_tenant_from_property(&manager(), "a@example.com", &other.id)
            .await
            .unwrap();
        assert_eq!(primaries(&user), vec![first_id.as_str()]);

        let property = coordinator.repos.properties.get(&other.id).await.unwrap().unwrap();
        assert!(property.tenant_emails.is_empty());
    }

    #[tokio::test]
    async fn test_set_primary_requires_linked_property() {
        let (coordinator, _) = coordinator();
        coordinator
            .create_tenant(&manager(), new_tenant("a@example.com", elm()))
            .await
            .unwrap();

        let err = coordinator
            .set_primary_address(&manager(), "a@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotFound { .. }));
    }
}
