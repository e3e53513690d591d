//! Storage client
//!
//! The layer callers use. It derives composite keys, stamps each written
//! item with a generated id and creation timestamp, and provisions missing
//! tables on first write.
//!
//! # Auto-provisioning
//!
//! ```text
//! add_item ──> engine.add_item ──ok──> stamped item
//!                   │
//!              MissingTable
//!                   │
//!                   v
//!          create_table -> wait_for_table -> engine.add_item (once)
//! ```
//!
//! Only `MissingTable` triggers recovery, and only once. Two writers racing
//! to create the same new table can both see `MissingTable`; the loser gets
//! `ExistingTable` from `create_table` and its write fails.

use crate::storage::engine::StorageEngine;
use crate::storage::error::Result;
use crate::storage::item::{Item, Scalar};
use crate::storage::keys::{composite_name, format_key, stamp_item};
use std::sync::Arc;
use tracing::{debug, info};

/// Zero-argument generator for item ids
pub type IdSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Zero-argument source of the creation timestamp
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// A logical table: name plus ordered key components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub hash_key_fields: Vec<String>,
    pub sort_key_fields: Option<Vec<String>>,
}

impl TableSpec {
    pub fn new<S: Into<String>>(name: impl Into<String>, hash_key_fields: Vec<S>) -> Self {
        Self {
            name: name.into(),
            hash_key_fields: hash_key_fields.into_iter().map(Into::into).collect(),
            sort_key_fields: None,
        }
    }

    pub fn with_sort_key<S: Into<String>>(mut self, sort_key_fields: Vec<S>) -> Self {
        self.sort_key_fields = Some(sort_key_fields.into_iter().map(Into::into).collect());
        self
    }
}

/// UUID v4 ids
pub fn uuid_ids() -> IdSource {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

/// Current UTC time, RFC 3339
pub fn utc_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().to_rfc3339())
}

/// Orchestrates key derivation, stamping and auto-provisioning over an engine
#[derive(Clone)]
pub struct StorageClient {
    engine: Arc<dyn StorageEngine>,
    environment: Option<String>,
    get_id: IdSource,
    get_now: Clock,
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("environment", &self.environment)
            .finish()
    }
}

impl StorageClient {
    /// Client with UUID ids, a UTC clock and no environment prefix
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self::builder(engine).build()
    }

    pub fn builder(engine: Arc<dyn StorageEngine>) -> StorageClientBuilder {
        StorageClientBuilder {
            engine,
            environment: None,
            get_id: uuid_ids(),
            get_now: utc_clock(),
        }
    }

    /// The engine this client writes through
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Physical name for a logical table: `<environment>-<name>` when an
    /// environment is set.
    pub fn table_name(&self, name: &str) -> String {
        match &self.environment {
            Some(environment) => format!("{}-{}", environment, name),
            None => name.to_string(),
        }
    }

    /// Write `item` to `table`, creating the table on first write.
    ///
    /// Fails with `MissingKey` before touching the engine when a key
    /// component is absent from `item`.
    pub async fn add_item(&self, item: Item, table: &TableSpec) -> Result<Item> {
        let table_name = self.table_name(&table.name);

        let hash_key = format_key(&item, &table.hash_key_fields)?;
        let sort_key = table
            .sort_key_fields
            .as_deref()
            .map(|fields| format_key(&item, fields))
            .transpose()?;
        let stamped = stamp_item(
            &item,
            &hash_key,
            sort_key.as_ref(),
            (self.get_id)(),
            (self.get_now)(),
        );

        match self.engine.add_item(stamped.clone(), &table_name).await {
            Ok(_) => {}
            Err(e) if e.is_missing_table() => {
                let sort_key_name = table
                    .sort_key_fields
                    .as_deref()
                    .map(composite_name)
                    .transpose()?;
                self.engine
                    .create_table(&hash_key.name, sort_key_name.as_deref(), &table_name)
                    .await?;
                info!(
                    table = %table_name,
                    hash_key = %hash_key.name,
                    sort_key = ?sort_key_name,
                    "Created table"
                );
                self.engine.wait_for_table(&table_name).await?;
                debug!(table = %table_name, "Table active");
                self.engine.add_item(stamped.clone(), &table_name).await?;
            }
            Err(e) => return Err(e),
        }

        info!(table = %table_name, "Added item");
        Ok(stamped)
    }

    /// All items in `table_name` whose hash key field equals `hash_key_value`.
    ///
    /// Errors, `MissingTable` included, pass through untouched.
    pub async fn get_items(
        &self,
        hash_key: &str,
        hash_key_value: &Scalar,
        table_name: &str,
    ) -> Result<Vec<Item>> {
        self.engine
            .get_items(hash_key, hash_key_value, &self.table_name(table_name))
            .await
    }
}

/// Builder for [`StorageClient`]
pub struct StorageClientBuilder {
    engine: Arc<dyn StorageEngine>,
    environment: Option<String>,
    get_id: IdSource,
    get_now: Clock,
}

impl StorageClientBuilder {
    /// Prefix every table name with `<environment>-`
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn id_source(mut self, get_id: IdSource) -> Self {
        self.get_id = get_id;
        self
    }

    pub fn clock(mut self, get_now: Clock) -> Self {
        self.get_now = get_now;
        self
    }

    pub fn build(self) -> StorageClient {
        StorageClient {
            engine: self.engine,
            environment: self.environment,
            get_id: self.get_id,
            get_now: self.get_now,
        }
    }
}
