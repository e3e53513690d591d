//! In-memory storage engine
//!
//! No I/O; used for unit tests and local development. Tables are created
//! `Active` unless created through [`MemoryStorageEngine::create_table_pending`],
//! which leaves them `Creating` until [`MemoryStorageEngine::finish_creating_table`].

use crate::storage::engine::{StorageEngine, TableDescription, TableStatus, WaitPolicy};
use crate::storage::error::{Result, StorageError};
use crate::storage::item::{Item, Scalar};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryTable {
    hash_key: String,
    sort_key: Option<String>,
    status: TableStatus,
    items: IndexMap<ItemKey, Item>,
}

/// Hash value, then sort value when the table has one
type ItemKey = (String, Option<String>);

impl MemoryTable {
    fn new(hash_key: &str, sort_key: Option<&str>, status: TableStatus) -> Self {
        Self {
            hash_key: hash_key.to_string(),
            sort_key: sort_key.map(str::to_string),
            status,
            items: IndexMap::new(),
        }
    }

    fn item_key(&self, item: &Item) -> Result<ItemKey> {
        let value = |field: &str| {
            item.get(field)
                .map(ToString::to_string)
                .ok_or(StorageError::MissingKey)
        };
        let sort_value = match &self.sort_key {
            Some(sort_key) => Some(value(sort_key.as_str())?),
            None => None,
        };
        Ok((value(self.hash_key.as_str())?, sort_value))
    }
}

/// In-memory storage engine
#[derive(Clone, Default)]
pub struct MemoryStorageEngine {
    tables: Arc<RwLock<IndexMap<String, MemoryTable>>>,
    wait: WaitPolicy,
}

impl std::fmt::Debug for MemoryStorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorageEngine")
            .field("tables", &self.tables.read().len())
            .finish()
    }
}

impl MemoryStorageEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the polling policy
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Seed an active, empty table
    pub fn with_table(self, table_name: &str, hash_key: &str, sort_key: Option<&str>) -> Self {
        self.insert_table(table_name, hash_key, sort_key, TableStatus::Active);
        self
    }

    /// Seed items into a table added with [`Self::with_table`]
    pub fn with_items(self, table_name: &str, items: Vec<Item>) -> Result<Self> {
        {
            let mut tables = self.tables.write();
            let table = tables
                .get_mut(table_name)
                .ok_or_else(|| StorageError::missing_table(table_name))?;
            for item in items {
                let key = table.item_key(&item)?;
                table.items.insert(key, item);
            }
        }
        Ok(self)
    }

    /// Create a table that stays `Creating` until finished explicitly
    pub fn create_table_pending(
        &self,
        table_name: &str,
        hash_key: &str,
        sort_key: Option<&str>,
    ) -> Result<()> {
        self.insert_new_table(table_name, hash_key, sort_key, TableStatus::Creating)
    }

    /// Flip a `Creating` table to `Active`
    pub fn finish_creating_table(&self, table_name: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StorageError::missing_table(table_name))?;
        table.status = TableStatus::Active;
        Ok(())
    }

    /// Names of all tables, in creation order
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Number of items stored in a table (0 if absent)
    pub fn item_count(&self, table_name: &str) -> usize {
        self.tables
            .read()
            .get(table_name)
            .map(|t| t.items.len())
            .unwrap_or(0)
    }

    fn insert_table(
        &self,
        table_name: &str,
        hash_key: &str,
        sort_key: Option<&str>,
        status: TableStatus,
    ) {
        self.tables.write().insert(
            table_name.to_string(),
            MemoryTable::new(hash_key, sort_key, status),
        );
    }

    fn insert_new_table(
        &self,
        table_name: &str,
        hash_key: &str,
        sort_key: Option<&str>,
        status: TableStatus,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table_name) {
            return Err(StorageError::existing_table(table_name));
        }
        tables.insert(
            table_name.to_string(),
            MemoryTable::new(hash_key, sort_key, status),
        );
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for MemoryStorageEngine {
    async fn add_item(&self, item: Item, table_name: &str) -> Result<Item> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StorageError::missing_table(table_name))?;

        let key = table.item_key(&item)?;
        debug!(table = table_name, hash = %key.0, sort = ?key.1, "Put item");
        table.items.insert(key, item.clone());
        Ok(item)
    }

    async fn create_table(
        &self,
        hash_key: &str,
        sort_key: Option<&str>,
        table_name: &str,
    ) -> Result<()> {
        self.insert_new_table(table_name, hash_key, sort_key, TableStatus::Active)
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableDescription> {
        let tables = self.tables.read();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::missing_table(table_name))?;
        Ok(TableDescription {
            hash_key: table.hash_key.clone(),
            sort_key: table.sort_key.clone(),
            status: table.status,
        })
    }

    async fn get_items(
        &self,
        hash_key: &str,
        hash_key_value: &Scalar,
        table_name: &str,
    ) -> Result<Vec<Item>> {
        let tables = self.tables.read();
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::missing_table(table_name))?;
        Ok(table
            .items
            .values()
            .filter(|item| item.get(hash_key) == Some(hash_key_value))
            .cloned()
            .collect())
    }

    fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(user: &str, date: &str, notes: &str) -> Item {
        let mut item = Item::new();
        item.insert("userId".to_string(), Scalar::from(user));
        item.insert("date".to_string(), Scalar::from(date));
        item.insert("notes".to_string(), Scalar::from(notes));
        item
    }

    #[tokio::test]
    async fn test_add_item_requires_table() {
        let engine = MemoryStorageEngine::new();

        let err = engine
            .add_item(entry("u1", "2020-01-01", "x"), "entries")
            .await
            .unwrap_err();
        assert!(err.is_missing_table());
    }

    #[tokio::test]
    async fn test_add_item_requires_key_fields() {
        let engine = MemoryStorageEngine::new().with_table("entries", "userId", Some("date"));

        let mut item = entry("u1", "2020-01-01", "x");
        item.shift_remove("date");
        let err = engine.add_item(item, "entries").await.unwrap_err();
        assert!(matches!(err, StorageError::MissingKey));

        let mut item = entry("u1", "2020-01-01", "x");
        item.shift_remove("userId");
        let err = engine.add_item(item, "entries").await.unwrap_err();
        assert!(matches!(err, StorageError::MissingKey));
    }

    #[tokio::test]
    async fn test_add_and_get_items() -> Result<()> {
        let engine = MemoryStorageEngine::new().with_table("entries", "userId", Some("date"));

        engine.add_item(entry("u1", "2020-01-01", "a"), "entries").await?;
        engine.add_item(entry("u2", "2020-01-01", "b"), "entries").await?;
        engine.add_item(entry("u1", "2020-01-02", "c"), "entries").await?;

        let items = engine.get_items("userId", &Scalar::from("u1"), "entries").await?;
        let notes: Vec<_> = items.iter().map(|i| i["notes"].clone()).collect();
        assert_eq!(notes, vec![Scalar::from("a"), Scalar::from("c")]);

        let none = engine.get_items("userId", &Scalar::from("u3"), "entries").await?;
        assert!(none.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_seeded_items_are_readable() -> Result<()> {
        let engine = MemoryStorageEngine::new()
            .with_table("entries", "userId", Some("date"))
            .with_items(
                "entries",
                vec![entry("u1", "2020-01-01", "a"), entry("u1", "2020-01-02", "b")],
            )?;

        assert_eq!(engine.item_count("entries"), 2);
        let items = engine.get_items("userId", &Scalar::from("u1"), "entries").await?;
        assert_eq!(items.len(), 2);

        let err = MemoryStorageEngine::new()
            .with_items("entries", vec![])
            .unwrap_err();
        assert!(err.is_missing_table());
        Ok(())
    }

    #[tokio::test]
    async fn test_same_key_overwrites() -> Result<()> {
        let engine = MemoryStorageEngine::new().with_table("entries", "userId", Some("date"));

        engine.add_item(entry("u1", "2020-01-01", "first"), "entries").await?;
        engine.add_item(entry("u1", "2020-01-01", "second"), "entries").await?;

        assert_eq!(engine.item_count("entries"), 1);
        let items = engine.get_items("userId", &Scalar::from("u1"), "entries").await?;
        assert_eq!(items[0]["notes"], Scalar::from("second"));
        Ok(())
    }

    #[tokio::test]
    async fn test_keys_with_separator_do_not_collide() -> Result<()> {
        let engine = MemoryStorageEngine::new().with_table("entries", "userId", Some("date"));

        engine.add_item(entry("a+b", "c", "first"), "entries").await?;
        engine.add_item(entry("a", "b+c", "second"), "entries").await?;

        assert_eq!(engine.item_count("entries"), 2);
        let items = engine.get_items("userId", &Scalar::from("a+b"), "entries").await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["notes"], Scalar::from("first"));
        let items = engine.get_items("userId", &Scalar::from("a"), "entries").await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["notes"], Scalar::from("second"));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_table_twice_fails() -> Result<()> {
        let engine = MemoryStorageEngine::new();
        engine.create_table("userId", None, "entries").await?;

        let err = engine
            .create_table("otherKey", Some("date"), "entries")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ExistingTable { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_describe_table() -> Result<()> {
        let engine = MemoryStorageEngine::new();
        assert!(engine.describe_table("entries").await.unwrap_err().is_missing_table());

        engine.create_table("userId", Some("date"), "entries").await?;
        let description = engine.describe_table("entries").await?;
        assert_eq!(
            description,
            TableDescription {
                hash_key: "userId".to_string(),
                sort_key: Some("date".to_string()),
                status: TableStatus::Active,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_wait_for_table_follows_status() -> Result<()> {
        let engine = MemoryStorageEngine::new().with_wait_policy(WaitPolicy {
            interval: Duration::from_millis(5),
            timeout: None,
        });
        engine.create_table_pending("entries", "userId", None)?;
        assert_eq!(
            engine.describe_table("entries").await?.status,
            TableStatus::Creating
        );

        let finisher = engine.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            finisher.finish_creating_table("entries")
        });

        engine.wait_for_table("entries").await?;
        assert_eq!(
            engine.describe_table("entries").await?.status,
            TableStatus::Active
        );
        handle.await.expect("finisher task")?;
        Ok(())
    }

    #[tokio::test]
    async fn test_wait_for_table_times_out() {
        let engine = MemoryStorageEngine::new().with_wait_policy(WaitPolicy {
            interval: Duration::from_millis(5),
            timeout: Some(Duration::from_millis(20)),
        });
        engine
            .create_table_pending("entries", "userId", None)
            .expect("new table");

        let err = engine.wait_for_table("entries").await.unwrap_err();
        assert!(matches!(err, StorageError::TableWaitTimeout { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_missing_table_fails() {
        let engine = MemoryStorageEngine::new();
        let err = engine.wait_for_table("entries").await.unwrap_err();
        assert!(err.is_missing_table());
    }
}
