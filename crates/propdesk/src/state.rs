//! Shared application state handed to every request handler.

use std::sync::Arc;

use propdesk_core::storage::TableStore;

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::notify::{LogNotifier, Notifier};
use crate::repository::Repositories;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the state over an already-connected store.
    pub fn build(store: Arc<dyn TableStore>, notifier: Arc<dyn Notifier>, config: Config) -> Self {
        Self {
            coordinator: Coordinator::new(Repositories::new(store), notifier),
            config: Arc::new(config),
        }
    }

    pub fn repos(&self) -> &Repositories {
        self.coordinator.repositories()
    }
}

#[cfg(feature = "inmemory")]
mod inmemory {
    use super::*;
    use crate::storage::InMemoryStore;

    impl AppState {
        /// Creates AppState over a fresh in-memory store.
        pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
            tracing::info!("Using in-memory storage");
            Ok(Self::build(
                Arc::new(InMemoryStore::new()),
                Arc::new(LogNotifier),
                config,
            ))
        }
    }
}

#[cfg(feature = "dynamodb")]
mod dynamodb {
    use super::*;
    use crate::storage::DynamoDbStore;

    impl AppState {
        /// Creates AppState over DynamoDB, using the default AWS credential chain.
        pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
            let store = DynamoDbStore::connect(&config.table_name, config.create_table).await?;
            tracing::info!(table = %store.table_name(), "Using DynamoDB storage");
            Ok(Self::build(Arc::new(store), Arc::new(LogNotifier), config))
        }
    }
}

#[cfg(test)]
impl Default for AppState {
    fn default() -> Self {
        Self::build(
            Arc::new(crate::storage::InMemoryStore::new()),
            Arc::new(LogNotifier),
            Config::default(),
        )
    }
}
