//! Opaque continuation tokens.
//!
//! A cursor wraps the store's "last evaluated position": the key attributes of
//! the last item a scan looked at. Callers get it as an opaque string and hand
//! it back unmodified to continue; a missing cursor means the end of results.

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::types::{Index, Item};
use super::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(BTreeMap<String, String>);

impl Cursor {
    pub fn from_attributes(attributes: BTreeMap<String, String>) -> Self {
        Self(attributes)
    }

    /// Builds the cursor that resumes right after `item` within `index`.
    ///
    /// Returns `None` when the item lacks one of the index's key attributes.
    pub fn after(item: &Item, index: Index) -> Option<Self> {
        let mut attributes = BTreeMap::new();
        for name in index.position_attributes() {
            let value = item.get(*name)?.as_s()?;
            attributes.insert(name.to_string(), value.to_string());
        }
        Some(Self(attributes))
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).map(String::as_str)
    }

    pub fn encode(&self) -> String {
        // A BTreeMap<String, String> always serializes.
        let json = serde_json::to_vec(&self.0).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, RepositoryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| RepositoryError::InvalidData(format!("malformed cursor: {e}")))?;
        let attributes: BTreeMap<String, String> = serde_json::from_slice(&bytes)
            .map_err(|e| RepositoryError::InvalidData(format!("malformed cursor: {e}")))?;
        if attributes.is_empty() {
            return Err(RepositoryError::InvalidData("empty cursor".to_string()));
        }
        Ok(Self(attributes))
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Cursor {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
