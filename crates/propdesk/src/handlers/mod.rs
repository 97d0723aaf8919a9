//! JSON API handlers.
//!
//! Handlers are thin: they extract the acting user, parse input, call one
//! coordinator protocol or repository listing and serialize the result.

pub mod error;
pub mod health;
pub mod properties;
pub mod technicians;
pub mod users;
pub mod work_orders;

use serde::Deserialize;

use propdesk_core::serde::deserialize_optional_string;
use propdesk_core::storage::Cursor;

use crate::{query::PageRequest, state::AppState};

pub use error::AppError;

/// Which partition a listing reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Rows linked to the acting manager.
    #[default]
    Manager,
    /// Rows of the acting user's whole organization.
    Organization,
}

/// Query parameters shared by every listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub scope: Scope,
    /// Free-text search over the listed entity.
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    pub page_size: Option<usize>,
    /// Token from a previous page's `nextCursor`.
    pub cursor: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self, state: &AppState) -> Result<PageRequest, AppError> {
        let cursor = self
            .cursor
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .map(Cursor::decode)
            .transpose()?;

        Ok(PageRequest::sized(state.config.page_size(self.page_size)).after(cursor))
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }
}
