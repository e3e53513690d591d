//! Storage engine trait

use crate::storage::error::{Result, StorageError};
use crate::storage::item::{Item, Scalar};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Table lifecycle status.
///
/// Tables move `Creating -> Active` and are never altered afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Creating,
    Active,
}

/// Table metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub hash_key: String,
    pub sort_key: Option<String>,
    pub status: TableStatus,
}

/// How `wait_for_table` polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between status checks
    pub interval: Duration,
    /// Give up after this long; `None` polls forever
    pub timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            timeout: None,
        }
    }
}

/// Raw, table-scoped persistence against one physical backend
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Store `item`, overwriting any item with the same derived key
    async fn add_item(&self, item: Item, table_name: &str) -> Result<Item>;

    /// Provision a table keyed by a single hash field and optional sort field
    async fn create_table(
        &self,
        hash_key: &str,
        sort_key: Option<&str>,
        table_name: &str,
    ) -> Result<()>;

    /// Get table metadata
    async fn describe_table(&self, table_name: &str) -> Result<TableDescription>;

    /// All items whose hash key field equals `hash_key_value`
    async fn get_items(
        &self,
        hash_key: &str,
        hash_key_value: &Scalar,
        table_name: &str,
    ) -> Result<Vec<Item>>;

    /// Polling policy used by `wait_for_table`
    fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::default()
    }

    /// Block until the table has left `Creating`
    async fn wait_for_table(&self, table_name: &str) -> Result<()> {
        poll_until_active(self, table_name, self.wait_policy()).await
    }
}

/// Poll `describe_table` until the table is no longer `Creating`.
pub async fn poll_until_active<E>(engine: &E, table_name: &str, policy: WaitPolicy) -> Result<()>
where
    E: StorageEngine + ?Sized,
{
    let started = Instant::now();
    loop {
        let description = engine.describe_table(table_name).await?;
        if description.status != TableStatus::Creating {
            return Ok(());
        }

        if let Some(timeout) = policy.timeout {
            if started.elapsed() >= timeout {
                return Err(StorageError::TableWaitTimeout {
                    table_name: table_name.to_string(),
                });
            }
        }

        debug!(table = table_name, "Table still creating");
        tokio::time::sleep(policy.interval).await;
    }
}
