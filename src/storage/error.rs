//! Storage error taxonomy
//!
//! Every engine translates its backend-specific failure signals into these
//! variants at the boundary. Anything an engine cannot classify travels as
//! [`StorageError::Backend`] with the backend's message intact.

use thiserror::Error;

/// Errors raised by storage engines and the storage client
#[derive(Error, Debug)]
pub enum StorageError {
    /// The named table does not exist
    #[error("A table with the name '{table_name}' could not be found.")]
    MissingTable { table_name: String },

    /// `create_table` was called for a name already in use
    #[error(
        "A table with the name '{table_name}' could not be created because table with the same name and different keys already exists."
    )]
    ExistingTable { table_name: String },

    /// An item lacks a value for a key component
    #[error("The item is missing a key attribute.")]
    MissingKey,

    /// A directory required by the file engine does not exist
    #[error("Directory '{location}' could not be found.")]
    MissingLocation { location: String },

    /// A table spec named no key components
    #[error("Invalid key schema: {0}")]
    InvalidKeySchema(String),

    /// `wait_for_table` gave up before the table left `CREATING`
    #[error("Timed out waiting for table '{table_name}' to become active.")]
    TableWaitTimeout { table_name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure, passed through unmodified
    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    pub fn missing_table(table_name: impl Into<String>) -> Self {
        Self::MissingTable {
            table_name: table_name.into(),
        }
    }

    pub fn existing_table(table_name: impl Into<String>) -> Self {
        Self::ExistingTable {
            table_name: table_name.into(),
        }
    }

    pub fn missing_location(location: impl Into<String>) -> Self {
        Self::MissingLocation {
            location: location.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// True when the error means "no such table"
    pub fn is_missing_table(&self) -> bool {
        matches!(self, Self::MissingTable { .. })
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_table() {
        let err = StorageError::missing_table("dev-entries");
        assert_eq!(
            err.to_string(),
            "A table with the name 'dev-entries' could not be found."
        );
        assert!(err.is_missing_table());

        let err = StorageError::existing_table("dev-entries");
        assert!(err.to_string().contains("'dev-entries'"));
        assert!(!err.is_missing_table());
    }

    #[test]
    fn test_missing_location_message() {
        let err = StorageError::missing_location("/nowhere/.filedb");
        assert_eq!(err.to_string(), "Directory '/nowhere/.filedb' could not be found.");
    }
}
