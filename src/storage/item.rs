//! Item and Scalar - the schemaless record stored in a table.
//!
//! An [`Item`] is an open mapping from field name to a [`Scalar`]. There is
//! no fixed schema; identity inside a table comes from the derived key
//! (see [`crate::storage::keys`]), not from a dedicated id field.
//!
//! # Example
//!
//! ```rust
//! use diary::storage::{Item, Scalar};
//!
//! let mut item = Item::new();
//! item.insert("date".to_string(), Scalar::from("2020-01-01"));
//! item.insert("ratingOutOfFive".to_string(), Scalar::from(3));
//! item.insert("private".to_string(), Scalar::from(false));
//! assert_eq!(item["ratingOutOfFive"].to_string(), "3");
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single field value: boolean, number or string.
///
/// JSON-compatible through serde; untagged so that `true`, `3` and `"x"`
/// map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Number(f64),
    String(String),
}

/// A stored record. Insertion order is preserved.
pub type Item = IndexMap<String, Scalar>;

impl Scalar {
    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

// Conversions
impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

/// Renders the value the way it appears inside a composite key: strings
/// unquoted, integral numbers without a fractional part.
impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}
