//! DynamoDB `TableStore` implementation.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::ReturnValue;
use aws_sdk_dynamodb::Client;

use propdesk_core::storage::{
    build_filter_expression, Condition, Index, Item, PrimaryKey, QueryPage, QueryRequest,
    ReadConsistency, RepositoryError, Result, TableStore, UpdateAction,
};

use super::conversions::{
    cursor_from_sdk, cursor_to_sdk, from_sdk_item, key_to_sdk, to_sdk_item, to_sdk_names,
    to_sdk_values,
};
use super::error::{
    map_delete_item_error, map_get_item_error, map_put_item_error, map_query_error,
    map_update_item_error,
};
use super::expressions::{condition_expression, key_condition, update_expression, Expression};
use super::table::{ensure_table, table_definition};

/// DynamoDB-backed single-table store.
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a store using the AWS SDK default credential chain.
    ///
    /// `AWS_ENDPOINT_URL` points the client at a local DynamoDB.
    pub async fn connect(table_name: impl Into<String>, create_table: bool) -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let store = Self::new(Client::new(&config), table_name);

        if create_table {
            ensure_table(&store.client, &table_definition(&store.table_name)).await?;
        }

        Ok(store)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl TableStore for DynamoDbStore {
    async fn get_item(
        &self,
        key: &PrimaryKey,
        consistency: ReadConsistency,
    ) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .consistent_read(consistency == ReadConsistency::Strong)
            .send()
            .await
            .map_err(|e| map_get_item_error(e, key))?;

        result.item.as_ref().map(from_sdk_item).transpose()
    }

    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<()> {
        let key = PrimaryKey::from_item(&item)
            .ok_or_else(|| RepositoryError::InvalidData("item has no primary key".to_string()))?;

        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_sdk_item(&item)));

        if let Some(condition) = &condition {
            let expr = condition_expression(condition);
            request = request
                .condition_expression(expr.text)
                .set_expression_attribute_names(to_sdk_names(&expr.names))
                .set_expression_attribute_values(to_sdk_values(&expr.values));
        }

        request
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &key))?;

        Ok(())
    }

    async fn update_item(
        &self,
        key: &PrimaryKey,
        actions: Vec<UpdateAction>,
        condition: Option<Condition>,
    ) -> Result<Item> {
        if actions.is_empty() {
            return Err(RepositoryError::InvalidData(format!("no updates for {key}")));
        }
        if let Some(action) = actions.iter().find(|a| a.is_empty_delta()) {
            return Err(RepositoryError::InvalidData(format!(
                "empty set delta on {}",
                action.attribute()
            )));
        }

        let mut expr = update_expression(&actions);
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .return_values(ReturnValue::AllNew);

        if let Some(condition) = &condition {
            let guard = condition_expression(condition);
            request = request.condition_expression(guard.text);
            expr.merge_bindings(guard.names, guard.values);
        }

        let result = request
            .update_expression(&expr.text)
            .set_expression_attribute_names(to_sdk_names(&expr.names))
            .set_expression_attribute_values(to_sdk_values(&expr.values))
            .send()
            .await
            .map_err(|e| map_update_item_error(e, key))?;

        match result.attributes {
            Some(attributes) => from_sdk_item(&attributes),
            None => Ok(Item::new()),
        }
    }

    async fn delete_item(&self, key: &PrimaryKey, condition: Option<Condition>) -> Result<()> {
        let mut request = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)));

        if let Some(condition) = &condition {
            let expr = condition_expression(condition);
            request = request
                .condition_expression(expr.text)
                .set_expression_attribute_names(to_sdk_names(&expr.names))
                .set_expression_attribute_values(to_sdk_values(&expr.values));
        }

        request
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, key))?;

        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage> {
        if request.filters.iter().any(|f| f.is_unsatisfiable()) {
            return Ok(QueryPage::default());
        }

        let mut expr: Expression = key_condition(request);
        let filter = build_filter_expression(&request.filters).map(Expression::from);
        if let Some(filter) = &filter {
            expr.merge_bindings(filter.names.clone(), filter.values.clone());
        }

        let limit = request.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX));
        let consistent =
            request.index == Index::Table && request.consistency == ReadConsistency::Strong;

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(request.index.name().map(str::to_string))
            .key_condition_expression(&expr.text)
            .set_filter_expression(filter.map(|f| f.text))
            .set_expression_attribute_names(to_sdk_names(&expr.names))
            .set_expression_attribute_values(to_sdk_values(&expr.values))
            .scan_index_forward(request.forward)
            .consistent_read(consistent)
            .set_limit(limit)
            .set_exclusive_start_key(request.start.as_ref().map(cursor_to_sdk))
            .send()
            .await
            .map_err(map_query_error)?;

        let items = result
            .items
            .unwrap_or_default()
            .iter()
            .map(from_sdk_item)
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(
            table = %self.table_name,
            partition = %request.partition,
            scanned = result.scanned_count,
            returned = items.len(),
            "Query page"
        );

        Ok(QueryPage {
            items,
            last_evaluated: result.last_evaluated_key.as_ref().and_then(cursor_from_sdk),
        })
    }
}
