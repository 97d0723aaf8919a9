//! Typed repositories over the shared single table.
//!
//! Each repository owns one logical entity: key derivation goes through
//! `propdesk_core::storage::keys`, item shapes through
//! `propdesk_core::storage::conversions`. Set-valued attributes only change
//! through add/remove deltas.

mod events;
mod properties;
mod technicians;
mod users;
mod work_orders;

use std::sync::Arc;

use propdesk_core::storage::{RepositoryError, TableStore};

pub use events::EventRepository;
pub use properties::PropertyRepository;
pub use technicians::TechnicianRepository;
pub use users::{UserRepository, UserUpsert};
pub use work_orders::{WorkOrderFilter, WorkOrderRepository};

/// Every repository, sharing one store.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub properties: PropertyRepository,
    pub technicians: TechnicianRepository,
    pub work_orders: WorkOrderRepository,
    pub events: EventRepository,
}

impl Repositories {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            users: UserRepository::new(store.clone()),
            properties: PropertyRepository::new(store.clone()),
            technicians: TechnicianRepository::new(store.clone()),
            work_orders: WorkOrderRepository::new(store.clone()),
            events: EventRepository::new(store),
        }
    }
}

/// Turns a failed existence guard into a not-found error for `entity_type`.
pub(crate) fn not_found_on_condition<'a>(
    entity_type: &'static str,
    id: &'a str,
) -> impl FnOnce(RepositoryError) -> RepositoryError + 'a {
    move |err| match err {
        RepositoryError::ConditionFailed(_) => RepositoryError::NotFound {
            entity_type,
            id: id.to_string(),
        },
        other => other,
    }
}

/// Turns a failed absence guard into an already-exists error for `entity_type`.
pub(crate) fn exists_on_condition<'a>(
    entity_type: &'static str,
    id: &'a str,
) -> impl FnOnce(RepositoryError) -> RepositoryError + 'a {
    move |err| match err {
        RepositoryError::ConditionFailed(_) => RepositoryError::AlreadyExists {
            entity_type,
            id: id.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::storage::InMemoryStore;

    use super::Repositories;

    pub fn repositories() -> Repositories {
        Repositories::new(Arc::new(InMemoryStore::new()))
    }

    /// Repositories over a store that evaluates at most `limit` rows per scan.
    pub fn capped_repositories(limit: usize) -> Repositories {
        Repositories::new(Arc::new(InMemoryStore::new().with_scan_limit(limit)))
    }
}
