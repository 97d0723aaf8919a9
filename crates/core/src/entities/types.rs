use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::Address;
use super::error::ValidationError;

/// Declares a string-backed enum with its wire representation.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(ValidationError::UnknownValue {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// A role a user can hold. A user may hold several at once.
    Role {
        Tenant => "TENANT",
        PropertyManager => "PROPERTY_MANAGER",
        Technician => "TECHNICIAN",
    }
}

wire_enum! {
    InviteStatus {
        Created => "CREATED",
        Invited => "INVITED",
        ReInvited => "RE_INVITED",
        Joined => "JOINED",
    }
}

wire_enum! {
    /// Work order lifecycle. `Deleted` is terminal.
    WorkOrderStatus {
        ToDo => "TO_DO",
        Complete => "COMPLETE",
        Deleted => "DELETED",
    }
}

wire_enum! {
    PermissionToEnter {
        Yes => "YES",
        No => "NO",
    }
}

wire_enum! {
    UpdateType {
        StatusUpdate => "STATUS_UPDATE",
        CommentUpdate => "COMMENT_UPDATE",
        AssignTechnician => "ASSIGN_TECHNICIAN",
        RemoveTechnician => "REMOVE_TECHNICIAN",
        WorkOrderCreated => "WORK_ORDER_CREATED",
        PropertyUpdate => "PROPERTY_UPDATE",
        TenantUpdate => "TENANT_UPDATE",
    }
}

/// Address snapshot a tenant holds for one linked property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub address: Address,
    pub is_primary: bool,
}

/// A person, identified by email, holding one or more roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    pub organization: Option<String>,
    pub organization_name: Option<String>,
    pub roles: BTreeSet<Role>,
    pub status: InviteStatus,
    pub is_admin: bool,
    /// Property manager a tenant was invited by.
    pub manager_email: Option<String>,
    /// Property id to address snapshot.
    pub addresses: BTreeMap<String, AddressSnapshot>,
    /// Names a property manager acts under.
    pub alternate_names: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn primary_address(&self) -> Option<(&str, &AddressSnapshot)> {
        self.addresses
            .iter()
            .find(|(_, snapshot)| snapshot.is_primary)
            .map(|(id, snapshot)| (id.as_str(), snapshot))
    }
}

/// A physical address managed by a property manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub address: Address,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f32>,
    pub manager_email: String,
    pub organization: String,
    pub tenant_emails: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn new(
        address: Address,
        manager_email: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            address,
            bedrooms: None,
            bathrooms: None,
            manager_email: manager_email.into(),
            organization: organization.into(),
            tenant_emails: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_rooms(mut self, bedrooms: Option<u32>, bathrooms: Option<f32>) -> Self {
        self.bedrooms = bedrooms;
        self.bathrooms = bathrooms;
        self
    }
}

/// A service worker who can be assigned work orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub email: String,
    pub name: String,
    pub organization: String,
    pub organization_name: Option<String>,
    pub status: InviteStatus,
    /// Property managers allowed to assign this technician.
    pub manager_emails: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Manager-scoped companion row for a technician.
///
/// Exists once per (property manager, technician) pair so a manager's
/// technicians are one partition scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianLink {
    pub manager_email: String,
    pub technician_email: String,
    pub name: String,
    pub status: InviteStatus,
}

/// A single maintenance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    pub tenant_email: String,
    pub tenant_name: String,
    pub manager_email: String,
    pub organization: String,
    pub property_id: String,
    pub address: Address,
    pub issue: String,
    pub location: Option<String>,
    pub status: WorkOrderStatus,
    pub permission_to_enter: PermissionToEnter,
    /// Canonical technician emails.
    pub assigned_to: BTreeSet<String>,
    pub viewed_by: BTreeSet<String>,
    pub images: BTreeSet<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn is_deleted(&self) -> bool {
        self.status == WorkOrderStatus::Deleted
    }
}

/// Row an audit event hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventParent {
    WorkOrder(String),
    Property(String),
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Time-ordered identifier; lexical order is creation order.
    pub id: String,
    pub parent: EventParent,
    pub actor_email: String,
    pub actor_name: String,
    pub message: String,
    pub update_type: UpdateType,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        parent: EventParent,
        actor: &ActorContext,
        update_type: UpdateType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: sortable_id(),
            parent,
            actor_email: actor.email.clone(),
            actor_name: actor.name.clone(),
            message: message.into(),
            update_type,
            created_at: Utc::now(),
        }
    }
}

/// Generates an identifier whose lexical order follows creation time.
pub fn sortable_id() -> String {
    Uuid::now_v7().to_string()
}

/// Who is performing an operation, passed explicitly with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub email: String,
    /// Name the actor is acting under for this request.
    pub name: String,
    pub role: Role,
    pub organization: Option<String>,
}

impl ActorContext {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            role,
            organization: None,
        }
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

/// A member of the assigned-technician set as found in storage.
///
/// Older rows hold `name##email` composites; newer rows hold the bare email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeRef {
    Identity(String),
    Legacy { name: String, email: String },
}

impl AssigneeRef {
    pub const LEGACY_SEPARATOR: &'static str = "##";

    pub fn parse(raw: &str) -> Self {
        match raw.split_once(Self::LEGACY_SEPARATOR) {
            Some((name, email)) => AssigneeRef::Legacy {
                name: name.trim().to_string(),
                email: email.trim().to_lowercase(),
            },
            None => AssigneeRef::Identity(raw.trim().to_lowercase()),
        }
    }

    /// The identity written back to storage.
    pub fn canonical(&self) -> &str {
        match self {
            AssigneeRef::Identity(email) => email,
            AssigneeRef::Legacy { email, .. } => email,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, AssigneeRef::Legacy { .. })
    }
}
