//! Conversions between backend-neutral attribute values and the SDK's.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue as SdkValue;

use propdesk_core::storage::{AttributeValue, Cursor, Item, PrimaryKey, RepositoryError, PK, SK};

/// Converts a value for the wire. Empty sets have no wire form and yield `None`.
pub fn to_sdk(value: &AttributeValue) -> Option<SdkValue> {
    Some(match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::Bool(b) => SdkValue::Bool(*b),
        AttributeValue::Ss(set) if set.is_empty() => return None,
        AttributeValue::Ss(set) => SdkValue::Ss(set.iter().cloned().collect()),
        AttributeValue::L(list) => SdkValue::L(list.iter().filter_map(to_sdk).collect()),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
        AttributeValue::Null => SdkValue::Null(true),
    })
}

pub fn to_sdk_item(item: &Item) -> HashMap<String, SdkValue> {
    item.iter()
        .filter_map(|(name, value)| to_sdk(value).map(|v| (name.clone(), v)))
        .collect()
}

/// Converts placeholder bindings, returning `None` when there are none.
pub fn to_sdk_values(
    values: &BTreeMap<String, AttributeValue>,
) -> Option<HashMap<String, SdkValue>> {
    let converted: HashMap<String, SdkValue> = values
        .iter()
        .filter_map(|(name, value)| to_sdk(value).map(|v| (name.clone(), v)))
        .collect();
    (!converted.is_empty()).then_some(converted)
}

pub fn to_sdk_names(names: &BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    (!names.is_empty()).then(|| names.clone().into_iter().collect())
}

pub fn from_sdk(value: &SdkValue) -> Result<AttributeValue, RepositoryError> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s.clone()),
        SdkValue::N(n) => AttributeValue::N(n.clone()),
        SdkValue::Bool(b) => AttributeValue::Bool(*b),
        SdkValue::Ss(set) => AttributeValue::Ss(set.iter().cloned().collect()),
        SdkValue::L(list) => {
            AttributeValue::L(list.iter().map(from_sdk).collect::<Result<_, _>>()?)
        }
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        SdkValue::Null(_) => AttributeValue::Null,
        other => {
            return Err(RepositoryError::Serialization(format!(
                "Unsupported attribute type: {other:?}"
            )))
        }
    })
}

pub fn from_sdk_item(item: &HashMap<String, SdkValue>) -> Result<Item, RepositoryError> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_sdk(value)?)))
        .collect()
}

pub fn key_to_sdk(key: &PrimaryKey) -> HashMap<String, SdkValue> {
    HashMap::from([
        (PK.to_string(), SdkValue::S(key.pk.clone())),
        (SK.to_string(), SdkValue::S(key.sk.clone())),
    ])
}

pub fn cursor_to_sdk(cursor: &Cursor) -> HashMap<String, SdkValue> {
    cursor
        .attributes()
        .iter()
        .map(|(name, value)| (name.clone(), SdkValue::S(value.clone())))
        .collect()
}

/// Wraps a `LastEvaluatedKey`. Key attributes in this table are always strings.
pub fn cursor_from_sdk(key: &HashMap<String, SdkValue>) -> Option<Cursor> {
    let attributes: BTreeMap<String, String> = key
        .iter()
        .filter_map(|(name, value)| value.as_s().ok().map(|s| (name.clone(), s.clone())))
        .collect();
    (!attributes.is_empty()).then(|| Cursor::from_attributes(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_empty_sets_are_dropped() {
        let mut item = Item::new();
        item.insert("roles".to_string(), AttributeValue::Ss(BTreeSet::new()));
        item.insert("name".to_string(), AttributeValue::string("Jane"));

        let sdk = to_sdk_item(&item);
        assert!(!sdk.contains_key("roles"));
        assert_eq!(sdk.get("name").unwrap().as_s().unwrap(), "Jane");
    }

    #[test]
    fn test_nested_map_round_trip() {
        let mut inner = HashMap::new();
        inner.insert("isPrimary".to_string(), AttributeValue::Bool(true));
        inner.insert("bedrooms".to_string(), AttributeValue::number(3));
        let mut item = Item::new();
        item.insert("addresses".to_string(), AttributeValue::M(inner));

        let back = from_sdk_item(&to_sdk_item(&item)).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_cursor_round_trip() {
        let key = HashMap::from([
            ("PK".to_string(), SdkValue::S("WO#1".to_string())),
            ("SK".to_string(), SdkValue::S("WO#1".to_string())),
        ]);
        let cursor = cursor_from_sdk(&key).unwrap();
        assert_eq!(cursor.get("PK"), Some("WO#1"));
        assert_eq!(cursor_to_sdk(&cursor), key);
    }

    #[test]
    fn test_no_values_means_no_binding() {
        assert!(to_sdk_values(&BTreeMap::new()).is_none());
        assert!(to_sdk_names(&BTreeMap::new()).is_none());
    }
}
