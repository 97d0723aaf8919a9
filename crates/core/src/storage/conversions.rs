//! Item attribute conversion functions.
//!
//! Pure functions for converting between stored items and domain types.
//! These are testable in isolation without a store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::entities::{
    Address, AddressSnapshot, AssigneeRef, Event, EventParent, Property, Technician,
    TechnicianLink, User, WorkOrder,
};

use super::keys;
use super::types::{AttributeValue, Item, GSI1PK, GSI1SK, GSI2PK, GSI2SK};
use super::RepositoryError;

// ============================================================================
// Attribute names
// ============================================================================

/// Attribute names shared by conversions and repository update clauses.
pub mod attr {
    pub const ENTITY_TYPE: &str = "entityType";
    pub const EMAIL: &str = "email";
    pub const NAME: &str = "name";
    pub const ORGANIZATION: &str = "organization";
    pub const ORGANIZATION_NAME: &str = "organizationName";
    pub const ROLES: &str = "roles";
    pub const STATUS: &str = "status";
    pub const IS_ADMIN: &str = "isAdmin";
    pub const MANAGER_EMAIL: &str = "managerEmail";
    pub const MANAGER_EMAILS: &str = "managerEmails";
    pub const ADDRESSES: &str = "addresses";
    pub const ADDRESS_STRING: &str = "addressString";
    pub const ALTERNATE_NAMES: &str = "alternateNames";
    pub const SEARCH_TEXT: &str = "searchText";
    pub const ID: &str = "id";
    pub const ADDRESS: &str = "address";
    pub const BEDROOMS: &str = "bedrooms";
    pub const BATHROOMS: &str = "bathrooms";
    pub const TENANT_EMAILS: &str = "tenantEmails";
    pub const TECHNICIAN_EMAIL: &str = "technicianEmail";
    pub const TENANT_EMAIL: &str = "tenantEmail";
    pub const TENANT_NAME: &str = "tenantName";
    pub const PROPERTY_ID: &str = "propertyId";
    pub const ISSUE: &str = "issue";
    pub const LOCATION: &str = "location";
    pub const PERMISSION_TO_ENTER: &str = "permissionToEnter";
    pub const ASSIGNED_TO: &str = "assignedTo";
    pub const VIEWED_BY: &str = "viewedBy";
    pub const IMAGES: &str = "images";
    pub const CREATED_BY: &str = "createdBy";
    pub const PARENT_TYPE: &str = "parentType";
    pub const PARENT_ID: &str = "parentId";
    pub const ACTOR_EMAIL: &str = "actorEmail";
    pub const ACTOR_NAME: &str = "actorName";
    pub const MESSAGE: &str = "message";
    pub const UPDATE_TYPE: &str = "updateType";
    pub const IS_PRIMARY: &str = "isPrimary";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

// ============================================================================
// Entity type constants
// ============================================================================

pub const ENTITY_TYPE_USER: &str = "USER";
pub const ENTITY_TYPE_PROPERTY: &str = "PROPERTY";
pub const ENTITY_TYPE_TECHNICIAN: &str = "TECHNICIAN";
pub const ENTITY_TYPE_TECHNICIAN_LINK: &str = "TECHNICIAN_LINK";
pub const ENTITY_TYPE_WORK_ORDER: &str = "WORK_ORDER";
pub const ENTITY_TYPE_EVENT: &str = "EVENT";

// ============================================================================
// Address conversions
// ============================================================================

pub fn address_to_value(address: &Address) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert("street".to_string(), AttributeValue::string(&address.street));
    if let Some(unit) = &address.unit {
        map.insert("unit".to_string(), AttributeValue::string(unit));
    }
    map.insert("city".to_string(), AttributeValue::string(&address.city));
    map.insert("state".to_string(), AttributeValue::string(&address.state));
    map.insert(
        "postalCode".to_string(),
        AttributeValue::string(&address.postal_code),
    );
    map.insert("country".to_string(), AttributeValue::string(&address.country));
    AttributeValue::M(map)
}

pub fn value_to_address(value: &AttributeValue) -> Result<Address, RepositoryError> {
    let map = value
        .as_m()
        .ok_or_else(|| RepositoryError::Serialization("address is not a map".to_string()))?;
    Ok(Address {
        street: get_string(map, "street")?,
        unit: get_optional_string(map, "unit"),
        city: get_string(map, "city")?,
        state: get_string(map, "state")?,
        postal_code: get_string(map, "postalCode")?,
        country: get_optional_string(map, "country").unwrap_or_else(|| "US".to_string()),
    })
}

/// Converts a tenant's property-id to snapshot map into its stored form.
pub fn addresses_to_value(addresses: &BTreeMap<String, AddressSnapshot>) -> AttributeValue {
    let map = addresses
        .iter()
        .map(|(property_id, snapshot)| {
            let mut entry = HashMap::new();
            entry.insert(attr::ADDRESS.to_string(), address_to_value(&snapshot.address));
            entry.insert(
                attr::IS_PRIMARY.to_string(),
                AttributeValue::Bool(snapshot.is_primary),
            );
            (property_id.clone(), AttributeValue::M(entry))
        })
        .collect();
    AttributeValue::M(map)
}

pub fn value_to_addresses(
    value: &AttributeValue,
) -> Result<BTreeMap<String, AddressSnapshot>, RepositoryError> {
    let map = value
        .as_m()
        .ok_or_else(|| RepositoryError::Serialization("addresses is not a map".to_string()))?;
    map.iter()
        .map(|(property_id, entry)| {
            let entry = entry.as_m().ok_or_else(|| {
                RepositoryError::Serialization(format!("address entry {property_id} is not a map"))
            })?;
            let address = entry
                .get(attr::ADDRESS)
                .ok_or_else(|| missing(attr::ADDRESS))
                .and_then(value_to_address)?;
            let is_primary = entry
                .get(attr::IS_PRIMARY)
                .and_then(AttributeValue::as_bool)
                .unwrap_or(false);
            Ok((
                property_id.clone(),
                AddressSnapshot {
                    address,
                    is_primary,
                },
            ))
        })
        .collect()
}

/// Concatenated, upper-cased search string over every linked address.
pub fn address_string(addresses: &BTreeMap<String, AddressSnapshot>) -> String {
    addresses
        .values()
        .map(|snapshot| snapshot.address.search_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Upper-cased search text for people rows.
pub fn person_search_text(name: &str, email: &str) -> String {
    format!("{} {}", name.trim(), email.trim()).to_uppercase()
}

// ============================================================================
// User conversions
// ============================================================================

/// Convert a stored item to User.
pub fn item_to_user(item: &Item) -> Result<User, RepositoryError> {
    let roles = get_string_set(item, attr::ROLES)
        .iter()
        .map(|r| parse_enum(r))
        .collect::<Result<_, _>>()?;
    let addresses = match item.get(attr::ADDRESSES) {
        Some(value) => value_to_addresses(value)?,
        None => BTreeMap::new(),
    };

    Ok(User {
        email: get_string(item, attr::EMAIL)?,
        name: get_optional_string(item, attr::NAME).unwrap_or_default(),
        organization: get_optional_string(item, attr::ORGANIZATION),
        organization_name: get_optional_string(item, attr::ORGANIZATION_NAME),
        roles,
        status: parse_enum(&get_string(item, attr::STATUS)?)?,
        is_admin: get_bool(item, attr::IS_ADMIN),
        manager_email: get_optional_string(item, attr::MANAGER_EMAIL),
        addresses,
        alternate_names: get_string_set(item, attr::ALTERNATE_NAMES),
        created_at: get_datetime(item, attr::CREATED_AT)?,
        updated_at: get_datetime(item, attr::UPDATED_AT)?,
    })
}

// ============================================================================
// Property conversions
// ============================================================================

/// Convert a Property to a stored item, including its index keys.
pub fn property_to_item(property: &Property) -> Item {
    let mut item = HashMap::new();

    keys::property_key(&property.id).write_to(&mut item);
    let sort_key = keys::address_sort_key(&property.address);
    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::manager_partition(&property.manager_email)),
    );
    item.insert(GSI1SK.to_string(), AttributeValue::S(sort_key.clone()));
    item.insert(
        GSI2PK.to_string(),
        AttributeValue::S(keys::organization_partition(&property.organization)),
    );
    item.insert(GSI2SK.to_string(), AttributeValue::S(sort_key));

    item.insert(
        attr::ENTITY_TYPE.to_string(),
        AttributeValue::string(ENTITY_TYPE_PROPERTY),
    );

    item.insert(attr::ID.to_string(), AttributeValue::string(&property.id));
    item.insert(attr::ADDRESS.to_string(), address_to_value(&property.address));
    item.insert(
        attr::SEARCH_TEXT.to_string(),
        AttributeValue::S(property.address.search_string()),
    );
    if let Some(bedrooms) = property.bedrooms {
        item.insert(attr::BEDROOMS.to_string(), AttributeValue::number(bedrooms));
    }
    if let Some(bathrooms) = property.bathrooms {
        item.insert(attr::BATHROOMS.to_string(), AttributeValue::number(bathrooms));
    }
    item.insert(
        attr::MANAGER_EMAIL.to_string(),
        AttributeValue::string(&property.manager_email),
    );
    item.insert(
        attr::ORGANIZATION.to_string(),
        AttributeValue::string(&property.organization),
    );
    if !property.tenant_emails.is_empty() {
        item.insert(
            attr::TENANT_EMAILS.to_string(),
            AttributeValue::Ss(property.tenant_emails.clone()),
        );
    }
    item.insert(
        attr::CREATED_AT.to_string(),
        AttributeValue::S(property.created_at.to_rfc3339()),
    );

    item
}

/// Convert a stored item to Property.
pub fn item_to_property(item: &Item) -> Result<Property, RepositoryError> {
    Ok(Property {
        id: get_string(item, attr::ID)?,
        address: item
            .get(attr::ADDRESS)
            .ok_or_else(|| missing(attr::ADDRESS))
            .and_then(value_to_address)?,
        bedrooms: get_optional_number(item, attr::BEDROOMS)?,
        bathrooms: get_optional_number(item, attr::BATHROOMS)?,
        manager_email: get_string(item, attr::MANAGER_EMAIL)?,
        organization: get_string(item, attr::ORGANIZATION)?,
        tenant_emails: get_string_set(item, attr::TENANT_EMAILS),
        created_at: get_datetime(item, attr::CREATED_AT)?,
    })
}

// ============================================================================
// Technician conversions
// ============================================================================

/// Convert a Technician to its primary row.
pub fn technician_to_item(technician: &Technician) -> Item {
    let mut item = HashMap::new();

    keys::technician_key(&technician.email).write_to(&mut item);
    item.insert(
        GSI2PK.to_string(),
        AttributeValue::S(keys::organization_partition(&technician.organization)),
    );
    item.insert(
        GSI2SK.to_string(),
        AttributeValue::S(keys::technician_key(&technician.email).sk),
    );

    item.insert(
        attr::ENTITY_TYPE.to_string(),
        AttributeValue::string(ENTITY_TYPE_TECHNICIAN),
    );

    item.insert(attr::EMAIL.to_string(), AttributeValue::string(&technician.email));
    item.insert(attr::NAME.to_string(), AttributeValue::string(&technician.name));
    item.insert(
        attr::SEARCH_TEXT.to_string(),
        AttributeValue::S(person_search_text(&technician.name, &technician.email)),
    );
    item.insert(
        attr::ORGANIZATION.to_string(),
        AttributeValue::string(&technician.organization),
    );
    if let Some(name) = &technician.organization_name {
        item.insert(attr::ORGANIZATION_NAME.to_string(), AttributeValue::string(name));
    }
    item.insert(
        attr::STATUS.to_string(),
        AttributeValue::string(technician.status.as_str()),
    );
    if !technician.manager_emails.is_empty() {
        item.insert(
            attr::MANAGER_EMAILS.to_string(),
            AttributeValue::Ss(technician.manager_emails.clone()),
        );
    }
    item.insert(
        attr::CREATED_AT.to_string(),
        AttributeValue::S(technician.created_at.to_rfc3339()),
    );

    item
}

/// Convert a stored item to Technician.
pub fn item_to_technician(item: &Item) -> Result<Technician, RepositoryError> {
    Ok(Technician {
        email: get_string(item, attr::EMAIL)?,
        name: get_string(item, attr::NAME)?,
        organization: get_string(item, attr::ORGANIZATION)?,
        organization_name: get_optional_string(item, attr::ORGANIZATION_NAME),
        status: parse_enum(&get_string(item, attr::STATUS)?)?,
        manager_emails: get_string_set(item, attr::MANAGER_EMAILS),
        created_at: get_datetime(item, attr::CREATED_AT)?,
    })
}

/// Convert a companion link to its stored row.
pub fn technician_link_to_item(link: &TechnicianLink) -> Item {
    let mut item = HashMap::new();

    keys::technician_link_key(&link.manager_email, &link.technician_email).write_to(&mut item);
    item.insert(
        attr::ENTITY_TYPE.to_string(),
        AttributeValue::string(ENTITY_TYPE_TECHNICIAN_LINK),
    );
    item.insert(
        attr::MANAGER_EMAIL.to_string(),
        AttributeValue::string(&link.manager_email),
    );
    item.insert(
        attr::TECHNICIAN_EMAIL.to_string(),
        AttributeValue::string(&link.technician_email),
    );
    item.insert(attr::NAME.to_string(), AttributeValue::string(&link.name));
    item.insert(
        attr::SEARCH_TEXT.to_string(),
        AttributeValue::S(person_search_text(&link.name, &link.technician_email)),
    );
    item.insert(
        attr::STATUS.to_string(),
        AttributeValue::string(link.status.as_str()),
    );

    item
}

/// Convert a stored companion row to TechnicianLink.
pub fn item_to_technician_link(item: &Item) -> Result<TechnicianLink, RepositoryError> {
    Ok(TechnicianLink {
        manager_email: get_string(item, attr::MANAGER_EMAIL)?,
        technician_email: get_string(item, attr::TECHNICIAN_EMAIL)?,
        name: get_string(item, attr::NAME)?,
        status: parse_enum(&get_string(item, attr::STATUS)?)?,
    })
}

// ============================================================================
// Work order conversions
// ============================================================================

/// Upper-cased search text for a work order.
pub fn work_order_search_text(work_order: &WorkOrder) -> String {
    format!(
        "{} {} {}",
        work_order.address.search_string(),
        work_order.issue.trim().to_uppercase(),
        work_order.tenant_name.trim().to_uppercase()
    )
}

/// Convert a WorkOrder to a stored item, including its index keys.
pub fn work_order_to_item(work_order: &WorkOrder) -> Item {
    let mut item = HashMap::new();

    keys::work_order_key(&work_order.id).write_to(&mut item);
    let sort_key = keys::work_order_sort_key(&work_order.id);
    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::manager_partition(&work_order.manager_email)),
    );
    item.insert(GSI1SK.to_string(), AttributeValue::S(sort_key.clone()));
    item.insert(
        GSI2PK.to_string(),
        AttributeValue::S(keys::tenant_partition(&work_order.tenant_email)),
    );
    item.insert(GSI2SK.to_string(), AttributeValue::S(sort_key));

    item.insert(
        attr::ENTITY_TYPE.to_string(),
        AttributeValue::string(ENTITY_TYPE_WORK_ORDER),
    );

    item.insert(attr::ID.to_string(), AttributeValue::string(&work_order.id));
    item.insert(
        attr::TENANT_EMAIL.to_string(),
        AttributeValue::string(&work_order.tenant_email),
    );
    item.insert(
        attr::TENANT_NAME.to_string(),
        AttributeValue::string(&work_order.tenant_name),
    );
    item.insert(
        attr::MANAGER_EMAIL.to_string(),
        AttributeValue::string(&work_order.manager_email),
    );
    item.insert(
        attr::ORGANIZATION.to_string(),
        AttributeValue::string(&work_order.organization),
    );
    item.insert(
        attr::PROPERTY_ID.to_string(),
        AttributeValue::string(&work_order.property_id),
    );
    item.insert(attr::ADDRESS.to_string(), address_to_value(&work_order.address));
    item.insert(attr::ISSUE.to_string(), AttributeValue::string(&work_order.issue));
    if let Some(location) = &work_order.location {
        item.insert(attr::LOCATION.to_string(), AttributeValue::string(location));
    }
    item.insert(
        attr::STATUS.to_string(),
        AttributeValue::string(work_order.status.as_str()),
    );
    item.insert(
        attr::PERMISSION_TO_ENTER.to_string(),
        AttributeValue::string(work_order.permission_to_enter.as_str()),
    );
    for (name, set) in [
        (attr::ASSIGNED_TO, &work_order.assigned_to),
        (attr::VIEWED_BY, &work_order.viewed_by),
        (attr::IMAGES, &work_order.images),
    ] {
        if !set.is_empty() {
            item.insert(name.to_string(), AttributeValue::Ss(set.clone()));
        }
    }
    item.insert(
        attr::SEARCH_TEXT.to_string(),
        AttributeValue::S(work_order_search_text(work_order)),
    );
    item.insert(
        attr::CREATED_BY.to_string(),
        AttributeValue::string(&work_order.created_by),
    );
    item.insert(
        attr::CREATED_AT.to_string(),
        AttributeValue::S(work_order.created_at.to_rfc3339()),
    );

    item
}

/// Convert a stored item to WorkOrder.
///
/// Legacy `name##email` members of the assigned set are decoded to their
/// canonical email here, once.
pub fn item_to_work_order(item: &Item) -> Result<WorkOrder, RepositoryError> {
    Ok(WorkOrder {
        id: get_string(item, attr::ID)?,
        tenant_email: get_string(item, attr::TENANT_EMAIL)?,
        tenant_name: get_optional_string(item, attr::TENANT_NAME).unwrap_or_default(),
        manager_email: get_string(item, attr::MANAGER_EMAIL)?,
        organization: get_optional_string(item, attr::ORGANIZATION).unwrap_or_default(),
        property_id: get_string(item, attr::PROPERTY_ID)?,
        address: item
            .get(attr::ADDRESS)
            .ok_or_else(|| missing(attr::ADDRESS))
            .and_then(value_to_address)?,
        issue: get_string(item, attr::ISSUE)?,
        location: get_optional_string(item, attr::LOCATION),
        status: parse_enum(&get_string(item, attr::STATUS)?)?,
        permission_to_enter: parse_enum(&get_string(item, attr::PERMISSION_TO_ENTER)?)?,
        assigned_to: decode_assignees(&get_string_set(item, attr::ASSIGNED_TO)),
        viewed_by: decode_assignees(&get_string_set(item, attr::VIEWED_BY)),
        images: get_string_set(item, attr::IMAGES),
        created_by: get_optional_string(item, attr::CREATED_BY).unwrap_or_default(),
        created_at: get_datetime(item, attr::CREATED_AT)?,
    })
}

/// Raw stored set members that refer to `email`, in any historical encoding.
pub fn assignee_members_for(raw: &BTreeSet<String>, email: &str) -> BTreeSet<String> {
    raw.iter()
        .filter(|member| AssigneeRef::parse(member).canonical() == email)
        .cloned()
        .collect()
}

fn decode_assignees(raw: &BTreeSet<String>) -> BTreeSet<String> {
    raw.iter()
        .map(|member| AssigneeRef::parse(member).canonical().to_string())
        .collect()
}

// ============================================================================
// Event conversions
// ============================================================================

/// Convert an Event to a stored item.
pub fn event_to_item(event: &Event) -> Item {
    let mut item = HashMap::new();

    keys::event_key(&event.parent, &event.id).write_to(&mut item);
    item.insert(
        attr::ENTITY_TYPE.to_string(),
        AttributeValue::string(ENTITY_TYPE_EVENT),
    );

    let (parent_type, parent_id) = match &event.parent {
        EventParent::WorkOrder(id) => (ENTITY_TYPE_WORK_ORDER, id),
        EventParent::Property(id) => (ENTITY_TYPE_PROPERTY, id),
    };
    item.insert(attr::ID.to_string(), AttributeValue::string(&event.id));
    item.insert(attr::PARENT_TYPE.to_string(), AttributeValue::string(parent_type));
    item.insert(attr::PARENT_ID.to_string(), AttributeValue::string(parent_id));
    item.insert(
        attr::ACTOR_EMAIL.to_string(),
        AttributeValue::string(&event.actor_email),
    );
    item.insert(
        attr::ACTOR_NAME.to_string(),
        AttributeValue::string(&event.actor_name),
    );
    item.insert(attr::MESSAGE.to_string(), AttributeValue::string(&event.message));
    item.insert(
        attr::UPDATE_TYPE.to_string(),
        AttributeValue::string(event.update_type.as_str()),
    );
    item.insert(
        attr::CREATED_AT.to_string(),
        AttributeValue::S(event.created_at.to_rfc3339()),
    );

    item
}

/// Convert a stored item to Event.
pub fn item_to_event(item: &Item) -> Result<Event, RepositoryError> {
    let parent_id = get_string(item, attr::PARENT_ID)?;
    let parent = match get_string(item, attr::PARENT_TYPE)?.as_str() {
        ENTITY_TYPE_WORK_ORDER => EventParent::WorkOrder(parent_id),
        ENTITY_TYPE_PROPERTY => EventParent::Property(parent_id),
        other => {
            return Err(RepositoryError::Serialization(format!(
                "unknown event parent type: {other}"
            )))
        }
    };

    Ok(Event {
        id: get_string(item, attr::ID)?,
        parent,
        actor_email: get_string(item, attr::ACTOR_EMAIL)?,
        actor_name: get_optional_string(item, attr::ACTOR_NAME).unwrap_or_default(),
        message: get_string(item, attr::MESSAGE)?,
        update_type: parse_enum(&get_string(item, attr::UPDATE_TYPE)?)?,
        created_at: get_datetime(item, attr::CREATED_AT)?,
    })
}

// ============================================================================
// Helper functions
// ============================================================================

fn missing(key: &str) -> RepositoryError {
    RepositoryError::Serialization(format!("Missing or invalid field: {key}"))
}

fn get_string(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(AttributeValue::as_s)
        .map(str::to_string)
        .ok_or_else(|| missing(key))
}

fn get_optional_string(item: &HashMap<String, AttributeValue>, key: &str) -> Option<String> {
    item.get(key)
        .and_then(AttributeValue::as_s)
        .map(str::to_string)
}

fn get_bool(item: &Item, key: &str) -> bool {
    item.get(key).and_then(AttributeValue::as_bool).unwrap_or(false)
}

fn get_string_set(item: &Item, key: &str) -> BTreeSet<String> {
    item.get(key)
        .and_then(AttributeValue::as_ss)
        .cloned()
        .unwrap_or_default()
}

fn get_optional_number<T: FromStr>(item: &Item, key: &str) -> Result<Option<T>, RepositoryError> {
    match item.get(key).and_then(AttributeValue::as_n) {
        Some(n) => n
            .parse()
            .map(Some)
            .map_err(|_| RepositoryError::Serialization(format!("Invalid number in {key}: {n}"))),
        None => Ok(None),
    }
}

fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let s = get_string(item, key)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Serialization(format!("Invalid datetime in {key}: {e}")))
}

fn parse_enum<T>(s: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    s.parse()
        .map_err(|e: T::Err| RepositoryError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        ActorContext, InviteStatus, PermissionToEnter, Role, UpdateType, WorkOrderStatus,
    };

    fn sample_address() -> Address {
        Address::new("12 Main St", "Boise", "ID", "83702").with_unit("4")
    }

    fn sample_property() -> Property {
        Property::new(sample_address(), "pm@x.com", "org-1")
            .with_id("p1")
            .with_rooms(Some(2), Some(1.5))
    }

    fn sample_work_order() -> WorkOrder {
        WorkOrder {
            id: "0191b6c4-7f00-7000-8000-000000000001".to_string(),
            tenant_email: "t@x.com".to_string(),
            tenant_name: "Tina".to_string(),
            manager_email: "pm@x.com".to_string(),
            organization: "org-1".to_string(),
            property_id: "p1".to_string(),
            address: sample_address(),
            issue: "Leaky faucet".to_string(),
            location: Some("Kitchen".to_string()),
            status: WorkOrderStatus::ToDo,
            permission_to_enter: PermissionToEnter::Yes,
            assigned_to: BTreeSet::from(["tech@x.com".to_string()]),
            viewed_by: BTreeSet::new(),
            images: BTreeSet::new(),
            created_by: "t@x.com".to_string(),
            created_at: DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_property_item_has_index_keys() {
        let item = property_to_item(&sample_property());

        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "PROPERTY#p1");
        assert_eq!(item.get("GSI1PK").unwrap().as_s().unwrap(), "PM#pm@x.com");
        assert_eq!(item.get("GSI2PK").unwrap().as_s().unwrap(), "ORG#org-1");
        assert_eq!(
            item.get("GSI1SK").unwrap().as_s().unwrap(),
            "PROPERTY#STREET#12 MAIN ST#CITY#BOISE#STATE#ID#POSTAL#83702#UNIT#4"
        );
        assert_eq!(item.get("entityType").unwrap().as_s().unwrap(), "PROPERTY");
    }

    #[test]
    fn test_property_round_trip() {
        let property = sample_property();
        let parsed = item_to_property(&property_to_item(&property)).unwrap();

        assert_eq!(parsed.id, property.id);
        assert_eq!(parsed.address, property.address);
        assert_eq!(parsed.bedrooms, Some(2));
        assert_eq!(parsed.bathrooms, Some(1.5));
    }

    #[test]
    fn test_work_order_item_keys() {
        let item = work_order_to_item(&sample_work_order());

        assert_eq!(item.get("GSI1PK").unwrap().as_s().unwrap(), "PM#pm@x.com");
        assert_eq!(item.get("GSI2PK").unwrap().as_s().unwrap(), "TENANT#t@x.com");
        assert!(item
            .get("searchText")
            .unwrap()
            .as_s()
            .unwrap()
            .contains("LEAKY FAUCET"));
        assert!(!item.contains_key("viewedBy"));
    }

    #[test]
    fn test_work_order_decodes_legacy_assignees() {
        let mut item = work_order_to_item(&sample_work_order());
        item.insert(
            "assignedTo".to_string(),
            AttributeValue::string_set(["Old Tech##Old@X.com", "new@x.com"]),
        );

        let parsed = item_to_work_order(&item).unwrap();
        assert_eq!(
            parsed.assigned_to,
            BTreeSet::from(["old@x.com".to_string(), "new@x.com".to_string()])
        );
    }

    #[test]
    fn test_assignee_members_for_matches_every_encoding() {
        let raw = BTreeSet::from([
            "Old Tech##old@x.com".to_string(),
            "old@x.com".to_string(),
            "other@x.com".to_string(),
        ]);
        let members = assignee_members_for(&raw, "old@x.com");
        assert_eq!(members.len(), 2);
        assert!(!members.contains("other@x.com"));
    }

    #[test]
    fn test_event_round_trip() {
        let actor = ActorContext::new("pm@x.com", "Pat", Role::PropertyManager);
        let event = Event::new(
            EventParent::WorkOrder("w1".to_string()),
            &actor,
            UpdateType::StatusUpdate,
            "Status set to COMPLETE",
        );
        let item = event_to_item(&event);
        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "WO#w1");
        assert!(item.get("SK").unwrap().as_s().unwrap().starts_with("EVENT#"));

        let parsed = item_to_event(&item).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.parent, event.parent);
        assert_eq!(parsed.update_type, UpdateType::StatusUpdate);
    }

    #[test]
    fn test_technician_and_link_round_trip() {
        let technician = Technician {
            email: "tech@x.com".to_string(),
            name: "Terry".to_string(),
            organization: "org-1".to_string(),
            organization_name: None,
            status: InviteStatus::Invited,
            manager_emails: BTreeSet::from(["pm@x.com".to_string()]),
            created_at: Utc::now(),
        };
        let parsed = item_to_technician(&technician_to_item(&technician)).unwrap();
        assert_eq!(parsed.manager_emails, technician.manager_emails);

        let link = TechnicianLink {
            manager_email: "pm@x.com".to_string(),
            technician_email: "tech@x.com".to_string(),
            name: "Terry".to_string(),
            status: InviteStatus::Invited,
        };
        let item = technician_link_to_item(&link);
        assert_eq!(item.get("PK").unwrap().as_s().unwrap(), "PM#pm@x.com");
        assert_eq!(item_to_technician_link(&item).unwrap(), link);
    }

    #[test]
    fn test_addresses_map_round_trip() {
        let mut addresses = BTreeMap::new();
        addresses.insert(
            "p1".to_string(),
            AddressSnapshot {
                address: sample_address(),
                is_primary: true,
            },
        );
        let parsed = value_to_addresses(&addresses_to_value(&addresses)).unwrap();
        assert_eq!(parsed, addresses);
        assert_eq!(address_string(&addresses), "12 MAIN ST 4, BOISE, ID 83702");
    }

    #[test]
    fn test_get_string_missing_field() {
        let item = HashMap::new();
        assert!(get_string(&item, "missing").is_err());
    }

    #[test]
    fn test_get_optional_string() {
        let mut item = HashMap::new();
        assert!(get_optional_string(&item, "missing").is_none());

        item.insert(
            "present".to_string(),
            AttributeValue::S("value".to_string()),
        );
        assert_eq!(
            get_optional_string(&item, "present"),
            Some("value".to_string())
        );
    }
}
