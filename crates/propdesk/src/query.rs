//! Pagination engine.
//!
//! A single store query evaluates at most `limit` rows *before* filters run,
//! so one call can return fewer matches than asked for while still handing
//! back a cursor. `fetch_page` keeps scanning until the page budget is met or
//! the partition is exhausted. `fetch_all` drains the partition.

use serde::Serialize;

use propdesk_core::storage::{Cursor, Item, QueryRequest, Result, TableStore};

/// Caller-facing page request: a size budget and an optional continuation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// `None` fetches everything.
    pub size: Option<usize>,
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    pub fn sized(size: usize) -> Self {
        Self {
            size: Some(size),
            cursor: None,
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// One business-level page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Absent when there is nothing more to read.
    #[serde(rename = "nextCursor", serialize_with = "serialize_cursor")]
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }

    /// Converts every item, failing on the first conversion error.
    pub fn try_map<U, E, F>(self, f: F) -> std::result::Result<Page<U>, E>
    where
        F: FnMut(T) -> std::result::Result<U, E>,
    {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<std::result::Result<_, _>>()?,
            next: self.next,
        })
    }
}

fn serialize_cursor<S>(
    cursor: &Option<Cursor>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match cursor {
        Some(cursor) => serializer.serialize_some(&cursor.encode()),
        None => serializer.serialize_none(),
    }
}

/// Fetches up to `page.size` matching items starting at `page.cursor`.
pub async fn fetch_page(
    store: &dyn TableStore,
    request: QueryRequest,
    page: PageRequest,
) -> Result<Page<Item>> {
    let Some(budget) = page.size else {
        return fetch_all(store, request.start_from(page.cursor)).await;
    };
    let budget = budget.max(1);

    if request.filters.iter().any(|f| f.is_unsatisfiable()) {
        return Ok(Page::empty());
    }

    let mut items = Vec::with_capacity(budget);
    let mut cursor = page.cursor;

    loop {
        let remaining = budget - items.len();
        let scan = request.clone().limit(remaining).start_from(cursor.take());
        let result = store.query(&scan).await?;

        items.extend(result.items);
        cursor = result.last_evaluated;

        if cursor.is_none() || items.len() >= budget {
            break;
        }
    }

    tracing::trace!(
        partition = %request.partition,
        returned = items.len(),
        more = cursor.is_some(),
        "Fetched page"
    );

    Ok(Page {
        items,
        next: cursor,
    })
}

/// Drains every matching item, following cursors until the store reports no
/// further continuation.
pub async fn fetch_all(store: &dyn TableStore, request: QueryRequest) -> Result<Page<Item>> {
    if request.filters.iter().any(|f| f.is_unsatisfiable()) {
        return Ok(Page::empty());
    }

    let mut items = Vec::new();
    let mut cursor = request.start.clone();
    let mut scans = 0usize;

    loop {
        let scan = request.clone().start_from(cursor.take());
        let result = store.query(&scan).await?;
        scans += 1;

        items.extend(result.items);
        match result.last_evaluated {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::trace!(
        partition = %request.partition,
        returned = items.len(),
        scans,
        "Fetched all"
    );

    Ok(Page {
        items,
        next: None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::storage::InMemoryStore;
    use propdesk_core::storage::{
        AttributeValue, Filter, Index, PrimaryKey, TableStore, GSI1PK, GSI1SK,
    };

    const PARTITION: &str = "PM#pm@example.com";

    /// Seeds 40 rows in one GSI1 partition; every third one is COMPLETE.
    async fn seeded(store: &InMemoryStore) -> usize {
        let mut matching = 0;
        for i in 0..40 {
            let status = if i % 3 == 0 { "COMPLETE" } else { "TO_DO" };
            if status == "COMPLETE" {
                matching += 1;
            }
            let mut item = Item::new();
            PrimaryKey::singleton(format!("WO#{i:03}")).write_to(&mut item);
            item.insert(GSI1PK.to_string(), AttributeValue::string(PARTITION));
            item.insert(GSI1SK.to_string(), AttributeValue::string(format!("WO#{i:03}")));
            item.insert("status".to_string(), AttributeValue::string(status));
            store.put_item(item, None).await.unwrap();
        }
        matching
    }

    fn completed() -> QueryRequest {
        QueryRequest::new(Index::Gsi1, PARTITION).filters([Filter::in_set("status", ["COMPLETE"])])
    }

    async fn drain(store: &InMemoryStore, size: usize) -> Vec<String> {
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = fetch_page(store, completed(), PageRequest::sized(size).after(cursor))
                .await
                .unwrap();
            assert!(page.items.len() <= size);
            seen.extend(
                page.items
                    .iter()
                    .map(|item| item.get("PK").and_then(AttributeValue::as_s).unwrap().to_string()),
            );
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_pagination_is_complete_for_every_page_size() {
        let store = InMemoryStore::new();
        let matching = seeded(&store).await;

        for size in 1..=matching + 10 {
            let seen = drain(&store, size).await;
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(seen.len(), matching, "page size {size}");
            assert_eq!(unique.len(), matching, "duplicates at page size {size}");
        }
    }

    #[tokio::test]
    async fn test_pagination_is_complete_under_scan_cap() {
        let store = InMemoryStore::new().with_scan_limit(4);
        let matching = seeded(&store).await;

        for size in [1, 3, matching, matching + 10] {
            let seen = drain(&store, size).await;
            assert_eq!(seen.len(), matching, "page size {size}");
        }
    }

    #[tokio::test]
    async fn test_pages_are_filled_despite_filters() {
        let store = InMemoryStore::new();
        seeded(&store).await;

        let page = fetch_page(&store, completed(), PageRequest::sized(5)).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert!(page.next.is_some());
    }

    #[tokio::test]
    async fn test_fetch_all_follows_cursors() {
        let store = InMemoryStore::new().with_scan_limit(3);
        let matching = seeded(&store).await;

        let page = fetch_all(&store, completed()).await.unwrap();
        assert_eq!(page.items.len(), matching);
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_unsatisfiable_filter_returns_empty_page() {
        let store = InMemoryStore::new();
        seeded(&store).await;

        let request = QueryRequest::new(Index::Gsi1, PARTITION)
            .filters([Filter::in_set("status", Vec::<String>::new())]);
        let page = fetch_page(&store, request, PageRequest::sized(10)).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_page_serializes_cursor_as_token() {
        let page: Page<u32> = Page {
            items: vec![1],
            next: None,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["nextCursor"], serde_json::Value::Null);
    }
}
