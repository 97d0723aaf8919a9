//! In-memory `TableStore` implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use propdesk_core::storage::{
    apply_updates, matches_all, AttributeValue, Condition, Cursor, Index, Item, PrimaryKey,
    QueryPage, QueryRequest, ReadConsistency, RepositoryError, Result, TableStore, UpdateAction,
};

/// In-memory single-table store.
///
/// Reads are always strongly consistent. `scan_limit` caps how many rows a
/// single query call evaluates, standing in for the production store's
/// response size limit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    rows: Arc<RwLock<BTreeMap<PrimaryKey, Item>>>,
    scan_limit: Option<usize>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of rows evaluated per query call.
    pub fn with_scan_limit(mut self, limit: usize) -> Self {
        self.scan_limit = Some(limit.max(1));
        self
    }

    /// Number of stored rows.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

fn check(condition: Option<&Condition>, current: Option<&Item>, key: &PrimaryKey) -> Result<()> {
    match condition {
        Some(condition) if !condition.evaluate(current) => {
            Err(RepositoryError::ConditionFailed(key.to_string()))
        }
        _ => Ok(()),
    }
}

/// Sort position of an item inside one partition of `index`.
fn position(item: &Item, index: Index) -> Vec<String> {
    index.position_attributes()[1..]
        .iter()
        .map(|name| {
            item.get(*name)
                .and_then(AttributeValue::as_s)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

fn cursor_position(cursor: &Cursor, request: &QueryRequest) -> Result<Vec<String>> {
    let index = request.index;
    if cursor.get(index.partition_attribute()) != Some(request.partition.as_str()) {
        return Err(RepositoryError::InvalidData(
            "cursor belongs to a different partition".to_string(),
        ));
    }
    index.position_attributes()[1..]
        .iter()
        .map(|name| {
            cursor.get(name).map(str::to_string).ok_or_else(|| {
                RepositoryError::InvalidData(format!("cursor is missing {name}"))
            })
        })
        .collect()
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn get_item(
        &self,
        key: &PrimaryKey,
        _consistency: ReadConsistency,
    ) -> Result<Option<Item>> {
        let rows = self.rows.read().await;
        Ok(rows.get(key).cloned())
    }

    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<()> {
        let key = PrimaryKey::from_item(&item)
            .ok_or_else(|| RepositoryError::InvalidData("item has no primary key".to_string()))?;

        let mut rows = self.rows.write().await;
        check(condition.as_ref(), rows.get(&key), &key)?;
        rows.insert(key, item);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        actions: Vec<UpdateAction>,
        condition: Option<Condition>,
    ) -> Result<Item> {
        if let Some(action) = actions.iter().find(|a| a.is_empty_delta()) {
            return Err(RepositoryError::InvalidData(format!(
                "empty set delta on {}",
                action.attribute()
            )));
        }

        let mut rows = self.rows.write().await;
        check(condition.as_ref(), rows.get(key), key)?;

        let row = rows.entry(key.clone()).or_insert_with(|| {
            let mut item = Item::new();
            key.write_to(&mut item);
            item
        });
        apply_updates(row, &actions);
        Ok(row.clone())
    }

    async fn delete_item(&self, key: &PrimaryKey, condition: Option<Condition>) -> Result<()> {
        let mut rows = self.rows.write().await;
        check(condition.as_ref(), rows.get(key), key)?;
        rows.remove(key);
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        if request.limit == Some(0) {
            return Err(RepositoryError::InvalidData(
                "query limit must be at least 1".to_string(),
            ));
        }

        let index = request.index;
        let partition_attribute = index.partition_attribute();
        let sort_attribute = index.sort_attribute();

        let rows = self.rows.read().await;
        let mut candidates: Vec<&Item> = rows
            .values()
            .filter(|item| {
                item.get(partition_attribute).and_then(AttributeValue::as_s)
                    == Some(request.partition.as_str())
            })
            .filter(|item| {
                item.get(sort_attribute)
                    .and_then(AttributeValue::as_s)
                    .is_some_and(|sk| request.sort.as_ref().is_none_or(|c| c.matches(sk)))
            })
            .collect();

        candidates.sort_by_cached_key(|item| position(item, index));
        if !request.forward {
            candidates.reverse();
        }

        if let Some(cursor) = &request.start {
            let after = cursor_position(cursor, request)?;
            candidates.retain(|item| {
                let current = position(item, index);
                if request.forward {
                    current > after
                } else {
                    current < after
                }
            });
        }

        let window = [request.limit, self.scan_limit].into_iter().flatten().min();
        let evaluated = window.map_or(candidates.len(), |n| n.min(candidates.len()));

        let items = candidates[..evaluated]
            .iter()
            .filter(|item| matches_all(&request.filters, item))
            .map(|item| (*item).clone())
            .collect();

        let last_evaluated = if evaluated < candidates.len() && evaluated > 0 {
            Cursor::after(candidates[evaluated - 1], index)
        } else {
            None
        };

        Ok(QueryPage {
            items,
            last_evaluated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propdesk_core::storage::{Filter, KeyCondition, GSI1PK, GSI1SK};

    fn row(pk: &str, sk: &str, status: &str) -> Item {
        let mut item = Item::new();
        PrimaryKey::new(pk, sk).write_to(&mut item);
        item.insert("status".to_string(), AttributeValue::string(status));
        item
    }

    async fn seeded(statuses: &[&str]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for (i, status) in statuses.iter().enumerate() {
            store
                .put_item(row("P", &format!("WO#{i:02}"), status), None)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        store.put_item(row("A", "A", "X"), None).await.unwrap();

        let key = PrimaryKey::singleton("A");
        let item = store.get_item(&key, ReadConsistency::Strong).await.unwrap();
        assert_eq!(item.unwrap().get("status").unwrap().as_s(), Some("X"));

        let missing = store
            .get_item(&PrimaryKey::singleton("B"), ReadConsistency::Eventual)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_conditional_put_rejects_existing_row() {
        let store = InMemoryStore::new();
        store
            .put_item(row("A", "A", "X"), Some(Condition::NotExists))
            .await
            .unwrap();
        let result = store
            .put_item(row("A", "A", "Y"), Some(Condition::NotExists))
            .await;
        assert!(matches!(result, Err(RepositoryError::ConditionFailed(_))));
    }

    #[tokio::test]
    async fn test_update_upserts_and_returns_new_row() {
        let store = InMemoryStore::new();
        let key = PrimaryKey::singleton("USER#a@x.com");

        let item = store
            .update_item(
                &key,
                vec![UpdateAction::add_to_set("roles", ["TENANT"])],
                None,
            )
            .await
            .unwrap();
        assert_eq!(item.get("PK").unwrap().as_s(), Some("USER#a@x.com"));
        assert!(item.get("roles").unwrap().as_ss().unwrap().contains("TENANT"));
    }

    #[tokio::test]
    async fn test_update_with_exists_condition_does_not_create() {
        let store = InMemoryStore::new();
        let key = PrimaryKey::singleton("USER#ghost@x.com");
        let result = store
            .update_item(
                &key,
                vec![UpdateAction::remove("GSI1PK")],
                Some(Condition::Exists),
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::ConditionFailed(_))));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_delta() {
        let store = InMemoryStore::new();
        let key = PrimaryKey::singleton("X");
        let empty: [&str; 0] = [];
        let result = store
            .update_item(&key, vec![UpdateAction::add_to_set("roles", empty)], None)
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_limit_is_applied_before_filters() {
        let store = seeded(&["DONE", "DONE", "OPEN", "DONE", "OPEN"]).await;
        let request = QueryRequest::new(Index::Table, "P")
            .filters([Filter::in_set("status", ["OPEN"])])
            .limit(2);

        let page = store.query(&request).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.last_evaluated.is_some());

        let next = request.clone().start_from(page.last_evaluated);
        let page = store.query(&next).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].get("SK").unwrap().as_s(), Some("WO#02"));
    }

    #[tokio::test]
    async fn test_scan_limit_caps_evaluation() {
        let store = seeded(&["OPEN", "OPEN", "OPEN"]).await.with_scan_limit(1);
        let page = store
            .query(&QueryRequest::new(Index::Table, "P").limit(10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.last_evaluated.is_some());
    }

    #[tokio::test]
    async fn test_descending_query_with_cursor() {
        let store = seeded(&["A", "B", "C"]).await;
        let request = QueryRequest::new(Index::Table, "P")
            .sort_key(KeyCondition::BeginsWith("WO#".to_string()))
            .descending()
            .limit(2);

        let first = store.query(&request).await.unwrap();
        let sks: Vec<_> = first
            .items
            .iter()
            .map(|i| i.get("SK").unwrap().as_s().unwrap().to_string())
            .collect();
        assert_eq!(sks, vec!["WO#02", "WO#01"]);

        let second = store
            .query(&request.clone().start_from(first.last_evaluated))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].get("SK").unwrap().as_s(), Some("WO#00"));
        assert!(second.last_evaluated.is_none());
    }

    #[tokio::test]
    async fn test_secondary_index_is_sparse() {
        let store = InMemoryStore::new();
        let mut indexed = row("USER#a", "USER#a", "X");
        indexed.insert(GSI1PK.to_string(), AttributeValue::string("PM#pm"));
        indexed.insert(GSI1SK.to_string(), AttributeValue::string("TENANT#a"));
        store.put_item(indexed, None).await.unwrap();
        store
            .put_item(row("USER#b", "USER#b", "X"), None)
            .await
            .unwrap();

        let page = store
            .query(&QueryRequest::new(Index::Gsi1, "PM#pm"))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.last_evaluated.is_none());
    }

    #[tokio::test]
    async fn test_cursor_from_other_partition_is_rejected() {
        let store = seeded(&["A", "B"]).await;
        let first = store
            .query(&QueryRequest::new(Index::Table, "P").limit(1))
            .await
            .unwrap();
        let result = store
            .query(&QueryRequest::new(Index::Table, "Q").start_from(first.last_evaluated))
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }
}
