use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Postal address components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "US".to_string()
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            unit: None,
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
            country: default_country(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Trims every component and collapses inner whitespace.
    ///
    /// An empty unit becomes `None`.
    pub fn normalized(&self) -> Self {
        Self {
            street: collapse(&self.street),
            unit: self
                .unit
                .as_deref()
                .map(collapse)
                .filter(|u| !u.is_empty()),
            city: collapse(&self.city),
            state: collapse(&self.state).to_uppercase(),
            postal_code: collapse(&self.postal_code),
            country: collapse(&self.country).to_uppercase(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField(field));
            }
        }
        Ok(())
    }

    /// Components in key order: street, city, state, postal code, unit.
    pub fn ordering_components(&self) -> [(&'static str, String); 5] {
        let n = self.normalized();
        [
            ("STREET", n.street.to_uppercase()),
            ("CITY", n.city.to_uppercase()),
            ("STATE", n.state),
            ("POSTAL", n.postal_code.to_uppercase()),
            ("UNIT", n.unit.unwrap_or_default().to_uppercase()),
        ]
    }

    /// Upper-cased single-line form used for substring search.
    pub fn search_string(&self) -> String {
        self.to_string().to_uppercase()
    }

    /// Two addresses denote the same location after normalization.
    pub fn same_location(&self, other: &Address) -> bool {
        self.ordering_components() == other.ordering_components()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.normalized();
        write!(f, "{}", n.street)?;
        if let Some(unit) = &n.unit {
            write!(f, " {unit}")?;
        }
        write!(f, ", {}, {} {}", n.city, n.state, n.postal_code)
    }
}

fn collapse(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
