pub mod conversions;
mod cursor;
mod error;
mod filter;
mod http_mapping;
pub mod keys;
mod traits;
mod types;

pub use cursor::Cursor;
pub use error::{RepositoryError, Result};
pub use filter::{
    build_filter_expression, matches_all, Filter, FilterExpression, FilterTerm, Predicate,
};
pub use http_mapping::repository_error_to_status_code;
pub use keys::{EntityType, KeyError, Relationship};
pub use traits::TableStore;
pub use types::{
    apply_updates, AttributeValue, Condition, Index, Item, KeyCondition, PrimaryKey, QueryPage,
    QueryRequest, ReadConsistency, UpdateAction, GSI1PK, GSI1SK, GSI2PK, GSI2SK, PK, SK,
};
