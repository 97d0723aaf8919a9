//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the `TableStore`
//! trait using `aws-sdk-dynamodb`. Expression rendering and value conversion
//! are pure and tested without a live table.

mod conversions;
mod error;
mod expressions;
mod store;
mod table;

pub use store::DynamoDbStore;
