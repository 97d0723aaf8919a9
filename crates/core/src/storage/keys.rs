//! Key codec for the single-table design.
//!
//! Pure functions that derive partition, sort and secondary-index keys from an
//! entity's natural identity and relationships, and decode them back.
//! Every key is `<TAG>#<value>[#<value>...]`; tags never contain `#`, so
//! decoding splits on the first delimiter only and natural ids may contain it.

use thiserror::Error;

use crate::entities::{Address, EventParent};

use super::types::PrimaryKey;

pub const DELIMITER: char = '#';

/// Errors from decoding a key that was not built by this module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Key has no delimiter: {0}")]
    MissingDelimiter(String),
    #[error("Unknown key tag: {0}")]
    UnknownTag(String),
    #[error("Expected {expected} key, found {found}")]
    UnexpectedTag {
        expected: &'static str,
        found: String,
    },
}

// ============================================================================
// Tags
// ============================================================================

/// Logical entity types stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Property,
    Technician,
    WorkOrder,
    Event,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::User,
        EntityType::Property,
        EntityType::Technician,
        EntityType::WorkOrder,
        EntityType::Event,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            EntityType::User => "USER",
            EntityType::Property => "PROPERTY",
            EntityType::Technician => "TECH",
            EntityType::WorkOrder => "WO",
            EntityType::Event => "EVENT",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Sort-key prefix selecting every row of this type in a partition.
    pub fn prefix(&self) -> String {
        format!("{}{DELIMITER}", self.tag())
    }
}

/// Relationships that scope secondary-index partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    PropertyManager,
    Organization,
    Tenant,
}

impl Relationship {
    pub fn tag(&self) -> &'static str {
        match self {
            Relationship::PropertyManager => "PM",
            Relationship::Organization => "ORG",
            Relationship::Tenant => "TENANT",
        }
    }
}

// ============================================================================
// Generic codec
// ============================================================================

/// Trims and case-folds a natural identifier.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Builds the primary key string for an entity.
///
/// Pattern: `<TAG>#<normalized id>`
pub fn build_primary_key(entity: EntityType, natural_id: &str) -> String {
    format!("{}{DELIMITER}{}", entity.tag(), normalize_id(natural_id))
}

/// Builds a relationship key: the partition of "all children of X".
///
/// Pattern: `<REL>#<normalized related id>`, followed by one `#<value>` per
/// ordering attribute, in the order given.
pub fn build_secondary_key(
    relationship: Relationship,
    related_id: &str,
    ordering: &[&str],
) -> String {
    let mut key = format!("{}{DELIMITER}{}", relationship.tag(), normalize_id(related_id));
    for value in ordering {
        key.push(DELIMITER);
        key.push_str(value);
    }
    key
}

/// Splits a primary key into its entity type and natural id.
pub fn try_decode(key: &str) -> Result<(EntityType, String), KeyError> {
    let (tag, id) = key
        .split_once(DELIMITER)
        .ok_or_else(|| KeyError::MissingDelimiter(key.to_string()))?;
    let entity = EntityType::from_tag(tag).ok_or_else(|| KeyError::UnknownTag(tag.to_string()))?;
    Ok((entity, id.to_string()))
}

/// Decodes a key, checking it belongs to the expected entity type.
pub fn decode_as(expected: EntityType, key: &str) -> Result<String, KeyError> {
    let (entity, id) = try_decode(key)?;
    if entity != expected {
        return Err(KeyError::UnexpectedTag {
            expected: expected.tag(),
            found: entity.tag().to_string(),
        });
    }
    Ok(id)
}

/// Inverse of [`build_primary_key`].
///
/// # Panics
/// Panics if `key` was not produced by [`build_primary_key`]. Callers only
/// decode keys they built; use [`try_decode`] for keys read from storage.
pub fn decode(key: &str) -> String {
    match try_decode(key) {
        Ok((_, id)) => id,
        Err(err) => panic!("decode called on a foreign key: {err}"),
    }
}

// ============================================================================
// User keys
// ============================================================================

/// Pattern: `USER#<email>` / `USER#<email>`
pub fn user_key(email: &str) -> PrimaryKey {
    PrimaryKey::singleton(build_primary_key(EntityType::User, email))
}

/// GSI1 keys placing a tenant under their property manager.
///
/// Pattern: `PM#<manager>` / `TENANT#<email>`
pub fn tenant_index_keys(manager_email: &str, tenant_email: &str) -> (String, String) {
    (
        manager_partition(manager_email),
        build_secondary_key(Relationship::Tenant, tenant_email, &[]),
    )
}

/// GSI2 keys placing a property manager under their organization.
///
/// Pattern: `ORG#<organization>` / `PM#<email>`
pub fn manager_index_keys(organization: &str, manager_email: &str) -> (String, String) {
    (
        organization_partition(organization),
        manager_partition(manager_email),
    )
}

// ============================================================================
// Relationship partitions
// ============================================================================

/// Pattern: `PM#<manager email>`
pub fn manager_partition(manager_email: &str) -> String {
    build_secondary_key(Relationship::PropertyManager, manager_email, &[])
}

/// Pattern: `ORG#<organization id>`
pub fn organization_partition(organization: &str) -> String {
    build_secondary_key(Relationship::Organization, organization, &[])
}

/// Pattern: `TENANT#<tenant email>`
pub fn tenant_partition(tenant_email: &str) -> String {
    build_secondary_key(Relationship::Tenant, tenant_email, &[])
}

// ============================================================================
// Property keys
// ============================================================================

/// Pattern: `PROPERTY#<id>` / `PROPERTY#<id>`
pub fn property_key(property_id: &str) -> PrimaryKey {
    PrimaryKey::singleton(build_primary_key(EntityType::Property, property_id))
}

/// Address-ordering sort key.
///
/// Pattern: `PROPERTY#STREET#<s>#CITY#<c>#STATE#<st>#POSTAL#<p>#UNIT#<u>`
///
/// Components are upper-cased and whitespace-collapsed in a fixed order, so a
/// range scan yields addresses alphabetically and equal addresses collide.
pub fn address_sort_key(address: &Address) -> String {
    let mut key = EntityType::Property.tag().to_string();
    for (tag, value) in address.ordering_components() {
        key.push(DELIMITER);
        key.push_str(tag);
        key.push(DELIMITER);
        key.push_str(&value);
    }
    key
}

// ============================================================================
// Technician keys
// ============================================================================

/// Pattern: `TECH#<email>` / `TECH#<email>`
pub fn technician_key(email: &str) -> PrimaryKey {
    PrimaryKey::singleton(build_primary_key(EntityType::Technician, email))
}

/// Companion row linking a technician to one property manager.
///
/// Pattern: `PM#<manager>` / `TECH#<email>`
pub fn technician_link_key(manager_email: &str, technician_email: &str) -> PrimaryKey {
    PrimaryKey::new(
        manager_partition(manager_email),
        build_primary_key(EntityType::Technician, technician_email),
    )
}

// ============================================================================
// Work order keys
// ============================================================================

/// Pattern: `WO#<id>` / `WO#<id>`
pub fn work_order_key(work_order_id: &str) -> PrimaryKey {
    PrimaryKey::singleton(build_primary_key(EntityType::WorkOrder, work_order_id))
}

/// Chronological sort key for a work order in manager and tenant listings.
///
/// Pattern: `WO#<id>`; ids are time-ordered so lexical order is creation order.
pub fn work_order_sort_key(work_order_id: &str) -> String {
    build_primary_key(EntityType::WorkOrder, work_order_id)
}

// ============================================================================
// Event keys
// ============================================================================

/// Partition an event lives in: its parent's primary key.
pub fn event_partition(parent: &EventParent) -> String {
    match parent {
        EventParent::WorkOrder(id) => build_primary_key(EntityType::WorkOrder, id),
        EventParent::Property(id) => build_primary_key(EntityType::Property, id),
    }
}

/// Pattern: `<parent key>` / `EVENT#<id>`
pub fn event_key(parent: &EventParent, event_id: &str) -> PrimaryKey {
    PrimaryKey::new(
        event_partition(parent),
        build_primary_key(EntityType::Event, event_id),
    )
}
