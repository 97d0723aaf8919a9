//! Property protocols, including the address-edit fan-out.

use serde::Serialize;

use propdesk_core::entities::{
    ActorContext, Address, AddressSnapshot, CreatePropertyRequest, EventParent, Property, Role,
    UpdateType,
};

use super::{require_organization, require_role, Coordinator, CoordinatorError, Result};

/// A tenant whose address snapshot could not be rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantFailure {
    pub email: String,
    pub reason: String,
}

/// Outcome of an address edit: the property row was rewritten; each linked
/// tenant either followed or is listed as failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressEditReport {
    pub property: Property,
    pub updated_tenants: Vec<String>,
    pub failed_tenants: Vec<TenantFailure>,
}

impl AddressEditReport {
    pub fn is_complete(&self) -> bool {
        self.failed_tenants.is_empty()
    }
}

impl Coordinator {
    /// Registers a property under the acting manager, rejecting an address
    /// the organization already has.
    pub async fn create_property(
        &self,
        actor: &ActorContext,
        request: CreatePropertyRequest,
    ) -> Result<Property> {
        require_role(actor, &[Role::PropertyManager])?;
        let organization = require_organization(actor)?;
        let request = request.validate()?;

        if let Some(existing) = self
            .repos
            .properties
            .find_by_address(organization, &request.address)
            .await?
        {
            return Err(duplicate_address(&existing));
        }

        let property = Property::new(request.address, &actor.email, organization)
            .with_rooms(request.bedrooms, request.bathrooms);
        self.repos.properties.create(&property).await?;
        self.record(
            EventParent::Property(property.id.clone()),
            actor,
            UpdateType::PropertyUpdate,
            format!("Property created at {}", property.address),
        )
        .await?;

        Ok(property)
    }

    /// Moves a property to a new address and rewrites every linked tenant's
    /// snapshot. Tenant failures are reported, not raised.
    pub async fn edit_property_address(
        &self,
        actor: &ActorContext,
        property_id: &str,
        address: Address,
    ) -> Result<AddressEditReport> {
        require_role(actor, &[Role::PropertyManager])?;
        address.validate()?;
        let address = address.normalized();

        let current = self
            .repos
            .properties
            .get_consistent(property_id)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("Property", property_id))?;

        if let Some(existing) = self
            .repos
            .properties
            .find_by_address(&current.organization, &address)
            .await?
        {
            if existing.id != current.id {
                return Err(duplicate_address(&existing));
            }
        }

        let property = self
            .repos
            .properties
            .update_address(property_id, &address)
            .await?;

        let mut updated_tenants = Vec::new();
        let mut failed_tenants = Vec::new();
        for email in &property.tenant_emails {
            match self.rewrite_snapshot(email, property_id, &address).await {
                Ok(()) => updated_tenants.push(email.clone()),
                Err(err) => {
                    tracing::warn!(
                        property_id = %property_id,
                        email = %email,
                        error = %err,
                        "Tenant address not updated"
                    );
                    failed_tenants.push(TenantFailure {
                        email: email.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        self.record(
            EventParent::Property(property.id.clone()),
            actor,
            UpdateType::PropertyUpdate,
            format!("Address changed from {} to {}", current.address, property.address),
        )
        .await?;

        tracing::info!(
            property_id = %property.id,
            updated = updated_tenants.len(),
            failed = failed_tenants.len(),
            "Edited property address"
        );

        Ok(AddressEditReport {
            property,
            updated_tenants,
            failed_tenants,
        })
    }

    async fn rewrite_snapshot(
        &self,
        email: &str,
        property_id: &str,
        address: &Address,
    ) -> Result<()> {
        let user = self
            .repos
            .users
            .get_consistent(email)
            .await?
            .ok_or_else(|| CoordinatorError::not_found("User", email))?;

        let mut addresses = user.addresses;
        let has_primary = addresses.values().any(|s| s.is_primary);
        addresses
            .entry(property_id.to_string())
            .and_modify(|snapshot| snapshot.address = address.clone())
            .or_insert_with(|| AddressSnapshot {
                address: address.clone(),
                is_primary: !has_primary,
            });

        self.repos.users.put_address_map(email, &addresses).await?;
        Ok(())
    }
}

fn duplicate_address(existing: &Property) -> CoordinatorError {
    CoordinatorError::Duplicate(format!(
        "A property already exists at {} ({})",
        existing.address, existing.id
    ))
}
