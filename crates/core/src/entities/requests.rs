//! Request payloads for the data-layer protocols.
//!
//! Pure data with validation; handlers deserialize these and coordinators
//! consume them already validated and normalized.

use serde::{Deserialize, Serialize};

use crate::serde::deserialize_optional_string;

use super::address::Address;
use super::error::ValidationError;
use super::types::PermissionToEnter;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_ISSUE_LENGTH: usize = 500;
pub const MAX_COMMENT_LENGTH: usize = 2_000;

/// Trims and lower-cases an email, rejecting anything that is not `local@domain`.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidEmail(raw.trim().to_string()));
    }
    Ok(email)
}

fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_string())
}

/// Which property a new tenant is linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TenantProperty {
    Existing {
        property_id: String,
    },
    New {
        address: Address,
        #[serde(default)]
        bedrooms: Option<u32>,
        #[serde(default)]
        bathrooms: Option<f32>,
    },
}

/// Invite a tenant, optionally creating the property they live at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    pub email: String,
    pub name: String,
    pub property: TenantProperty,
}

impl CreateTenantRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.email = normalize_email(&self.email)?;
        self.name = required("name", &self.name, MAX_NAME_LENGTH)?;
        match &mut self.property {
            TenantProperty::Existing { property_id } => {
                *property_id = required("property_id", property_id, MAX_NAME_LENGTH)?;
            }
            TenantProperty::New { address, .. } => {
                address.validate()?;
                *address = address.normalized();
            }
        }
        Ok(self)
    }
}

/// Invite a property manager into an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteManagerRequest {
    pub email: String,
    pub name: String,
    pub organization: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl InviteManagerRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.email = normalize_email(&self.email)?;
        self.name = required("name", &self.name, MAX_NAME_LENGTH)?;
        self.organization = required("organization", &self.organization, MAX_NAME_LENGTH)?;
        Ok(self)
    }
}

/// Invite a technician on behalf of a property manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteTechnicianRequest {
    pub email: String,
    pub name: String,
}

impl InviteTechnicianRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.email = normalize_email(&self.email)?;
        self.name = required("name", &self.name, MAX_NAME_LENGTH)?;
        Ok(self)
    }
}

/// Open a work order against one of the tenant's properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkOrderRequest {
    pub property_id: String,
    pub issue: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub location: Option<String>,
    pub permission_to_enter: PermissionToEnter,
    #[serde(default)]
    pub images: Vec<String>,
    /// Tenant the order is opened for, when a property manager files it.
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub tenant_email: Option<String>,
}

impl CreateWorkOrderRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.property_id = required("property_id", &self.property_id, MAX_NAME_LENGTH)?;
        self.tenant_email = self.tenant_email.as_deref().map(normalize_email).transpose()?;
        self.issue = required("issue", &self.issue, MAX_ISSUE_LENGTH)?;
        self.images.retain(|key| !key.trim().is_empty());
        Ok(self)
    }
}

/// Free-text comment on a work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub message: String,
}

impl CommentRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.message = required("message", &self.message, MAX_COMMENT_LENGTH)?;
        Ok(self)
    }
}

/// Register a property directly under a property manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePropertyRequest {
    pub address: Address,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<f32>,
}

impl CreatePropertyRequest {
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.address.validate()?;
        self.address = self.address.normalized();
        Ok(self)
    }
}
