//! Composite keys and metadata stamping
//!
//! Two separators are in play and are deliberately distinct:
//!
//! ```text
//! component join (within one key):   userId|device   ->  u1|phone
//! storage key (hash + sort):          <hash>+<sort>   ->  u1|phone+2020-01-01
//! ```

use super::error::{Result, StorageError};
use super::item::{Item, Scalar};

/// Joins the components of one composite key
pub const COMPONENT_SEPARATOR: &str = "|";

/// Joins hash and sort values into the storage key used by local engines
pub const STORAGE_KEY_SEPARATOR: char = '+';

/// Generated identifier field stamped on every written item
pub const ID_FIELD: &str = "id";

/// Generated creation timestamp field stamped on every written item
pub const CREATED_DATE_FIELD: &str = "createdDate";

/// A synthesized key field: joined component names and joined values
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKey {
    pub name: String,
    pub value: Scalar,
}

/// Field name of the composite key built from `fields`.
///
/// A single component keeps its own name.
pub fn composite_name(fields: &[String]) -> Result<String> {
    if fields.is_empty() {
        return Err(StorageError::InvalidKeySchema(
            "a key needs at least one component field".to_string(),
        ));
    }
    Ok(fields.join(COMPONENT_SEPARATOR))
}

/// Gather `fields` from `item` in order and build the composite key.
///
/// One component yields the raw value unchanged; several yield their
/// rendered values joined with `|`.
pub fn format_key(item: &Item, fields: &[String]) -> Result<CompositeKey> {
    let name = composite_name(fields)?;
    let mut values = fields
        .iter()
        .map(|field| item.get(field).cloned().ok_or(StorageError::MissingKey))
        .collect::<Result<Vec<_>>>()?;

    let value = if values.len() == 1 {
        values.remove(0)
    } else {
        let joined: Vec<String> = values.iter().map(Scalar::to_string).collect();
        Scalar::String(joined.join(COMPONENT_SEPARATOR))
    };

    Ok(CompositeKey { name, value })
}

/// Copy `item` and add the creation timestamp, the composite key fields and
/// the generated id.
pub fn stamp_item(
    item: &Item,
    hash_key: &CompositeKey,
    sort_key: Option<&CompositeKey>,
    id: String,
    now: String,
) -> Item {
    let mut stamped = item.clone();
    stamped.insert(CREATED_DATE_FIELD.to_string(), Scalar::String(now));
    stamped.insert(hash_key.name.clone(), hash_key.value.clone());
    stamped.insert(ID_FIELD.to_string(), Scalar::String(id));
    if let Some(sort_key) = sort_key {
        stamped.insert(sort_key.name.clone(), sort_key.value.clone());
    }
    stamped
}

/// Derive the storage key for `item` under a table's single-field key schema.
///
/// `hashValue` alone without a sort key, `hashValue+sortValue` otherwise.
pub fn storage_key(item: &Item, hash_key: &str, sort_key: Option<&str>) -> Result<String> {
    let hash_value = item.get(hash_key).ok_or(StorageError::MissingKey)?;
    match sort_key {
        None => Ok(hash_value.to_string()),
        Some(sort_key) => {
            let sort_value = item.get(sort_key).ok_or(StorageError::MissingKey)?;
            Ok(format!("{}{}{}", hash_value, STORAGE_KEY_SEPARATOR, sort_value))
        }
    }
}
