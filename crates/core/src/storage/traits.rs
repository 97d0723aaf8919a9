use async_trait::async_trait;

use super::types::{
    Condition, Item, PrimaryKey, QueryPage, QueryRequest, ReadConsistency, UpdateAction,
};
use super::Result;

/// A partition/sort-keyed store with secondary indexes, conditional writes and
/// atomic per-row set deltas.
///
/// Implementations report a failed [`Condition`] as
/// [`RepositoryError::ConditionFailed`](super::RepositoryError::ConditionFailed)
/// and never treat a missing row as an error on reads.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Gets a single row by its primary key.
    async fn get_item(
        &self,
        key: &PrimaryKey,
        consistency: ReadConsistency,
    ) -> Result<Option<Item>>;

    /// Writes a whole row, replacing any existing one.
    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<()>;

    /// Applies update clauses to a row, creating it when absent, and returns
    /// the row as it is after the update.
    async fn update_item(
        &self,
        key: &PrimaryKey,
        actions: Vec<UpdateAction>,
        condition: Option<Condition>,
    ) -> Result<Item>;

    /// Deletes a row. Deleting a missing row is not an error unless a
    /// condition says otherwise.
    async fn delete_item(&self, key: &PrimaryKey, condition: Option<Condition>) -> Result<()>;

    /// Runs a single scan over one partition of an index.
    ///
    /// A single call may return fewer matches than `limit`, including none,
    /// while still returning a continuation cursor.
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage>;
}
