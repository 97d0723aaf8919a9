//! In-memory storage backend.
//!
//! Holds every row in a single ordered map behind a `tokio::sync::RwLock` and
//! evaluates index queries the way the production store does: the per-call
//! limit counts rows *evaluated*, filters run afterwards, and a continuation
//! cursor is returned whenever the range was not exhausted. Used for tests and
//! for running the service without AWS.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new().with_scan_limit(2);
//! ```

mod store;

pub use store::InMemoryStore;
