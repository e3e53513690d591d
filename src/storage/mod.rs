//! Storage layer
//!
//! # Architecture
//!
//! ```text
//! StorageClient   key derivation, id/timestamp stamping, create-on-first-write
//!   └─→ StorageEngine (trait)
//!        ├─→ MemoryStorageEngine   in-process, for tests
//!        ├─→ FileStorageEngine     JSON documents under <location>/.filedb
//!        └─→ DynamoStorageEngine   Amazon DynamoDB (`dynamodb` feature)
//! ```
//!
//! ## Keys
//!
//! A table is declared with ordered hash key components and optional sort
//! key components. The client synthesizes one field per key: a single
//! component keeps its name and value, several are joined with `|`
//! (`a|b` = `x|y`). Engines only ever see single-field keys.
//!
//! ## Table lifecycle
//!
//! `Creating -> Active`. The client creates a table when the engine reports
//! it missing on write, waits for it to become active and retries once.

pub mod client;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod engine;
pub mod error;
pub mod file;
pub mod item;
pub mod keys;
pub mod memory;
pub mod testing;

pub use client::{Clock, IdSource, StorageClient, StorageClientBuilder, TableSpec};
#[cfg(feature = "dynamodb")]
pub use dynamodb::{DynamoDbConfig, DynamoStorageEngine};
pub use engine::{StorageEngine, TableDescription, TableStatus, WaitPolicy};
pub use error::{Result, StorageError};
pub use file::FileStorageEngine;
pub use item::{Item, Scalar};
pub use memory::MemoryStorageEngine;
