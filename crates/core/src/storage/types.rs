//! Backend-neutral types for the single-table store.
//!
//! Every entity lives in one physical table addressed by `PK`/`SK`, with two
//! overloaded global secondary indexes. These types describe items, keys,
//! conditional writes, delta updates and index queries without referring to
//! any particular storage product.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::cursor::Cursor;
use super::filter::Filter;

// ============================================================================
// Key attribute names
// ============================================================================

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1PK: &str = "GSI1PK";
pub const GSI1SK: &str = "GSI1SK";
pub const GSI2PK: &str = "GSI2PK";
pub const GSI2SK: &str = "GSI2SK";

/// A single attribute value stored in an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    /// Numbers are kept in their decimal string form, as the wire format does.
    N(String),
    Bool(bool),
    Ss(BTreeSet<String>),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
    Null,
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn number(value: impl ToString) -> Self {
        AttributeValue::N(value.to_string())
    }

    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeValue::Ss(values.into_iter().map(Into::into).collect())
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_ss(&self) -> Option<&BTreeSet<String>> {
        match self {
            AttributeValue::Ss(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            AttributeValue::M(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::L(list) => Some(list),
            _ => None,
        }
    }
}

/// A stored row: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// Which physical index a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Table,
    Gsi1,
    Gsi2,
}

impl Index {
    /// Index name as known to the store, `None` for the base table.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Index::Table => None,
            Index::Gsi1 => Some("GSI1"),
            Index::Gsi2 => Some("GSI2"),
        }
    }

    pub fn partition_attribute(&self) -> &'static str {
        match self {
            Index::Table => PK,
            Index::Gsi1 => GSI1PK,
            Index::Gsi2 => GSI2PK,
        }
    }

    pub fn sort_attribute(&self) -> &'static str {
        match self {
            Index::Table => SK,
            Index::Gsi1 => GSI1SK,
            Index::Gsi2 => GSI2SK,
        }
    }

    /// Attributes that identify an item's position within this index.
    pub fn position_attributes(&self) -> &'static [&'static str] {
        match self {
            Index::Table => &[PK, SK],
            Index::Gsi1 => &[GSI1PK, GSI1SK, PK, SK],
            Index::Gsi2 => &[GSI2PK, GSI2SK, PK, SK],
        }
    }
}

/// Base-table primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryKey {
    pub pk: String,
    pub sk: String,
}

impl PrimaryKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Key for rows whose partition and sort key are the same string.
    pub fn singleton(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            pk: key.clone(),
            sk: key,
        }
    }

    /// Reads the key attributes out of an item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let pk = item.get(PK)?.as_s()?;
        let sk = item.get(SK)?.as_s()?;
        Some(Self::new(pk, sk))
    }

    /// Writes the key attributes into an item.
    pub fn write_to(&self, item: &mut Item) {
        item.insert(PK.to_string(), AttributeValue::string(&self.pk));
        item.insert(SK.to_string(), AttributeValue::string(&self.sk));
    }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.pk, self.sk)
    }
}

/// Read mode for gets and base-table queries.
///
/// Secondary indexes only support eventual consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConsistency {
    #[default]
    Eventual,
    Strong,
}

/// Sort-key condition applied inside a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCondition {
    Equals(String),
    BeginsWith(String),
    Between(String, String),
}

impl KeyCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            KeyCondition::Equals(value) => sort_key == value,
            KeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            KeyCondition::Between(low, high) => {
                sort_key >= low.as_str() && sort_key <= high.as_str()
            }
        }
    }
}

/// Guard evaluated atomically against the current row before a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The row exists.
    Exists,
    /// The row does not exist.
    NotExists,
    /// The attribute is absent or holds a different value.
    AttributeNotEquals {
        attribute: String,
        value: AttributeValue,
    },
    All(Vec<Condition>),
}

impl Condition {
    pub fn not_equals(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Condition::AttributeNotEquals {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn evaluate(&self, current: Option<&Item>) -> bool {
        match self {
            Condition::Exists => current.is_some(),
            Condition::NotExists => current.is_none(),
            Condition::AttributeNotEquals { attribute, value } => {
                current.and_then(|item| item.get(attribute)) != Some(value)
            }
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(current)),
        }
    }
}

/// One clause of a partial update.
///
/// Set-valued attributes are only ever changed through `AddToSet` and
/// `RemoveFromSet`, which the store applies atomically per row.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set {
        attribute: String,
        value: AttributeValue,
    },
    /// Sets the attribute only when the row does not hold it yet.
    SetIfAbsent {
        attribute: String,
        value: AttributeValue,
    },
    Remove {
        attribute: String,
    },
    AddToSet {
        attribute: String,
        values: BTreeSet<String>,
    },
    RemoveFromSet {
        attribute: String,
        values: BTreeSet<String>,
    },
}

impl UpdateAction {
    pub fn set(attribute: impl Into<String>, value: AttributeValue) -> Self {
        UpdateAction::Set {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn set_if_absent(attribute: impl Into<String>, value: AttributeValue) -> Self {
        UpdateAction::SetIfAbsent {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn remove(attribute: impl Into<String>) -> Self {
        UpdateAction::Remove {
            attribute: attribute.into(),
        }
    }

    pub fn add_to_set<I, S>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UpdateAction::AddToSet {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remove_from_set<I, S>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UpdateAction::RemoveFromSet {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            UpdateAction::Set { attribute, .. }
            | UpdateAction::SetIfAbsent { attribute, .. }
            | UpdateAction::Remove { attribute }
            | UpdateAction::AddToSet { attribute, .. }
            | UpdateAction::RemoveFromSet { attribute, .. } => attribute,
        }
    }

    /// Delta clauses with nothing to add or remove are rejected by the store.
    pub fn is_empty_delta(&self) -> bool {
        match self {
            UpdateAction::AddToSet { values, .. } | UpdateAction::RemoveFromSet { values, .. } => {
                values.is_empty()
            }
            _ => false,
        }
    }
}

/// Applies update clauses to an item in place.
///
/// Sets that become empty are removed, matching stores that cannot hold empty
/// sets.
pub fn apply_updates(item: &mut Item, actions: &[UpdateAction]) {
    for action in actions {
        match action {
            UpdateAction::Set { attribute, value } => {
                item.insert(attribute.clone(), value.clone());
            }
            UpdateAction::SetIfAbsent { attribute, value } => {
                item.entry(attribute.clone()).or_insert_with(|| value.clone());
            }
            UpdateAction::Remove { attribute } => {
                item.remove(attribute);
            }
            UpdateAction::AddToSet { attribute, values } => {
                let entry = item
                    .entry(attribute.clone())
                    .or_insert_with(|| AttributeValue::Ss(BTreeSet::new()));
                match entry {
                    AttributeValue::Ss(set) => set.extend(values.iter().cloned()),
                    other => *other = AttributeValue::Ss(values.clone()),
                }
            }
            UpdateAction::RemoveFromSet { attribute, values } => {
                let now_empty = match item.get_mut(attribute) {
                    Some(AttributeValue::Ss(set)) => {
                        set.retain(|v| !values.contains(v));
                        set.is_empty()
                    }
                    _ => false,
                };
                if now_empty {
                    item.remove(attribute);
                }
            }
        }
    }
}

/// A single index scan request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index: Index,
    pub partition: String,
    pub sort: Option<KeyCondition>,
    pub filters: Vec<Filter>,
    /// Maximum number of items the store evaluates, before filters run.
    pub limit: Option<usize>,
    pub start: Option<Cursor>,
    pub forward: bool,
    pub consistency: ReadConsistency,
}

impl QueryRequest {
    pub fn new(index: Index, partition: impl Into<String>) -> Self {
        Self {
            index,
            partition: partition.into(),
            sort: None,
            filters: Vec::new(),
            limit: None,
            start: None,
            forward: true,
            consistency: ReadConsistency::Eventual,
        }
    }

    pub fn sort_key(mut self, condition: KeyCondition) -> Self {
        self.sort = Some(condition);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_from(mut self, cursor: Option<Cursor>) -> Self {
        self.start = cursor;
        self
    }

    pub fn descending(mut self) -> Self {
        self.forward = false;
        self
    }

    pub fn consistent(mut self) -> Self {
        self.consistency = ReadConsistency::Strong;
        self
    }
}

/// What a single scan returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Position to resume from; `None` once the index range is exhausted.
    pub last_evaluated: Option<Cursor>,
}
