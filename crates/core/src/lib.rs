//! Pure domain types and storage codecs for propdesk.
//!
//! Nothing in this crate performs I/O. Store backends, repositories and the
//! consistency coordinator live in the `propdesk` crate and build on the
//! [`storage::TableStore`] trait defined here.

pub mod entities;
pub mod serde;
pub mod storage;
