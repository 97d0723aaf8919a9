//! Canonical table definition and on-demand provisioning.

use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;

use propdesk_core::storage::{Index, RepositoryError, Result};

use super::error::map_connection_error;

/// Key schema of the table or one of its indexes (pure data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub name: Option<&'static str>,
    pub partition_key: &'static str,
    pub sort_key: &'static str,
}

/// Table schema: base keys plus every secondary index, projection ALL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub table_name: String,
    pub base: KeySchema,
    pub indexes: Vec<KeySchema>,
}

/// Returns the table layout every repository relies on.
pub fn table_definition(table_name: &str) -> TableDefinition {
    let schema = |index: Index| KeySchema {
        name: index.name(),
        partition_key: index.partition_attribute(),
        sort_key: index.sort_attribute(),
    };
    TableDefinition {
        table_name: table_name.to_string(),
        base: schema(Index::Table),
        indexes: vec![schema(Index::Gsi1), schema(Index::Gsi2)],
    }
}

impl TableDefinition {
    /// Every key attribute, each listed once.
    pub fn key_attributes(&self) -> Vec<&'static str> {
        let mut attributes = Vec::new();
        for schema in std::iter::once(&self.base).chain(&self.indexes) {
            for name in [schema.partition_key, schema.sort_key] {
                if !attributes.contains(&name) {
                    attributes.push(name);
                }
            }
        }
        attributes
    }
}

fn key_schema(schema: &KeySchema) -> Result<Vec<KeySchemaElement>> {
    [(schema.partition_key, KeyType::Hash), (schema.sort_key, KeyType::Range)]
        .into_iter()
        .map(|(name, key_type)| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(map_connection_error)
        })
        .collect()
}

/// Creates the table when it does not exist yet. Existing tables are left as is.
pub async fn ensure_table(client: &Client, definition: &TableDefinition) -> Result<()> {
    match client
        .describe_table()
        .table_name(&definition.table_name)
        .send()
        .await
    {
        Ok(_) => {
            tracing::debug!(table = %definition.table_name, "Table already exists");
            return Ok(());
        }
        Err(err) => {
            let service_error = err.into_service_error();
            if !service_error.is_resource_not_found_exception() {
                return Err(map_connection_error(service_error));
            }
        }
    }

    let attribute_definitions = definition
        .key_attributes()
        .into_iter()
        .map(|name| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(map_connection_error)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut request = client
        .create_table()
        .table_name(&definition.table_name)
        .set_key_schema(Some(key_schema(&definition.base)?))
        .set_attribute_definitions(Some(attribute_definitions))
        .billing_mode(BillingMode::PayPerRequest);

    for index in &definition.indexes {
        let name = index.name.ok_or_else(|| {
            RepositoryError::InvalidData("secondary index without a name".to_string())
        })?;
        request = request.global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name(name)
                .set_key_schema(Some(key_schema(index)?))
                .projection(
                    Projection::builder()
                        .projection_type(ProjectionType::All)
                        .build(),
                )
                .build()
                .map_err(map_connection_error)?,
        );
    }

    request.send().await.map_err(map_connection_error)?;
    tracing::info!(table = %definition.table_name, "Created table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_definition_has_both_indexes() {
        let definition = table_definition("propdesk");
        assert_eq!(definition.base.partition_key, "PK");
        assert_eq!(definition.indexes.len(), 2);
        assert_eq!(definition.indexes[0].name, Some("GSI1"));
        assert_eq!(definition.indexes[1].sort_key, "GSI2SK");
    }

    #[test]
    fn test_key_attributes_are_unique() {
        let attributes = table_definition("propdesk").key_attributes();
        assert_eq!(
            attributes,
            vec!["PK", "SK", "GSI1PK", "GSI1SK", "GSI2PK", "GSI2SK"]
        );
    }
}
