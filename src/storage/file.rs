//! File-backed storage engine
//!
//! # Layout
//!
//! ```text
//! <location>/.filedb/<db_name>/
//!   tables.json        table name -> {"hashKey": .., "sortKey": ..}
//!   <table>.json       derived key -> item
//! ```
//!
//! The derived key is `hashValue` when the table has no sort key and
//! `hashValue+sortValue` otherwise. Tables have no asynchronous
//! provisioning here, so they report `Active` as soon as they exist.
//!
//! Documents are rewritten whole on every put (write to a temporary file,
//! then rename). Puts within one engine instance are serialized; separate
//! processes sharing a directory are not coordinated.

use crate::storage::engine::{StorageEngine, TableDescription, TableStatus, WaitPolicy};
use crate::storage::error::{Result, StorageError};
use crate::storage::item::{Item, Scalar};
use crate::storage::keys::storage_key;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

const FILE_DB_DIR: &str = ".filedb";
const TABLES_FILE: &str = "tables.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableSchema {
    hash_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_key: Option<String>,
}

type Tables = IndexMap<String, TableSchema>;
type Items = IndexMap<String, Item>;

/// File-backed storage engine
pub struct FileStorageEngine {
    location: PathBuf,
    file_db_root: PathBuf,
    db_root: PathBuf,
    write_lock: Mutex<()>,
    wait: WaitPolicy,
}

impl std::fmt::Debug for FileStorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorageEngine")
            .field("db_root", &self.db_root)
            .finish()
    }
}

impl Default for FileStorageEngine {
    fn default() -> Self {
        Self::new(".", "default")
    }
}

impl FileStorageEngine {
    /// Create an engine rooted at `<location>/.filedb/<db_name>`.
    ///
    /// Nothing touches the disk until the first operation.
    pub fn new<P: AsRef<Path>>(location: P, db_name: &str) -> Self {
        let location = location.as_ref().to_path_buf();
        let file_db_root = location.join(FILE_DB_DIR);
        let db_root = file_db_root.join(db_name);
        Self {
            location,
            file_db_root,
            db_root,
            write_lock: Mutex::new(()),
            wait: WaitPolicy::default(),
        }
    }

    /// Override the polling policy
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Directory holding this database's documents
    pub fn db_root(&self) -> &Path {
        &self.db_root
    }

    fn tables_path(&self) -> PathBuf {
        self.db_root.join(TABLES_FILE)
    }

    fn table_path(&self, table_name: &str) -> PathBuf {
        self.db_root.join(format!("{}.json", table_name))
    }

    async fn tables(&self) -> Tables {
        read_json(&self.tables_path()).await
    }

    async fn table_schema(&self, table_name: &str) -> Result<TableSchema> {
        verify_location_exists(&self.db_root).await?;
        self.tables()
            .await
            .shift_remove(table_name)
            .ok_or_else(|| StorageError::missing_table(table_name))
    }

    async fn create_db_if_necessary(&self) -> Result<()> {
        verify_location_exists(&self.location).await?;
        create_dir_if_missing(&self.file_db_root, "fileDb root").await?;
        create_dir_if_missing(&self.db_root, "db root").await
    }
}

#[async_trait]
impl StorageEngine for FileStorageEngine {
    #[instrument(skip(self, item))]
    async fn add_item(&self, item: Item, table_name: &str) -> Result<Item> {
        let _guard = self.write_lock.lock().await;
        let schema = self.table_schema(table_name).await?;
        let key = storage_key(&item, &schema.hash_key, schema.sort_key.as_deref())?;

        let path = self.table_path(table_name);
        let mut items: Items = read_json(&path).await;
        items.insert(key, item.clone());
        write_json(&path, &items).await?;

        debug!(table = table_name, items = items.len(), "Wrote table document");
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn create_table(
        &self,
        hash_key: &str,
        sort_key: Option<&str>,
        table_name: &str,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.create_db_if_necessary().await?;

        let mut tables = self.tables().await;
        if tables.contains_key(table_name) {
            return Err(StorageError::existing_table(table_name));
        }
        tables.insert(
            table_name.to_string(),
            TableSchema {
                hash_key: hash_key.to_string(),
                sort_key: sort_key.map(str::to_string),
            },
        );
        write_json(&self.tables_path(), &tables).await
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableDescription> {
        let schema = self.table_schema(table_name).await?;
        Ok(TableDescription {
            hash_key: schema.hash_key,
            sort_key: schema.sort_key,
            status: TableStatus::Active,
        })
    }

    async fn get_items(
        &self,
        hash_key: &str,
        hash_key_value: &Scalar,
        table_name: &str,
    ) -> Result<Vec<Item>> {
        self.table_schema(table_name).await?;
        let items: Items = read_json(&self.table_path(table_name)).await;

        Ok(items
            .into_values()
            .filter(|item| item.get(hash_key) == Some(hash_key_value))
            .collect())
    }

    fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }
}

async fn verify_location_exists(location: &Path) -> Result<()> {
    match fs::metadata(location).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::missing_location(
            location.display().to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn create_dir_if_missing(dir: &Path, label: &str) -> Result<()> {
    match verify_location_exists(dir).await {
        Ok(()) => Ok(()),
        Err(StorageError::MissingLocation { .. }) => {
            fs::create_dir(dir).await?;
            info!(path = %dir.display(), "created {}", label);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Absent or unreadable documents read as empty
async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(_) => return T::default(),
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        debug!(path = %path.display(), error = %e, "Ignoring unreadable document");
        T::default()
    })
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
