//! Deterministic client wiring for tests

use crate::storage::client::StorageClient;
use crate::storage::memory::MemoryStorageEngine;
use std::sync::Arc;

pub const TEST_ID: &str = "test-id";
pub const TEST_NOW: &str = "2020-01-01T00:00:00";

/// A client over a fresh memory engine with a fixed id and clock.
///
/// Returns the engine too, so tests can inspect or seed it.
pub fn test_client() -> (StorageClient, MemoryStorageEngine) {
    test_client_with(MemoryStorageEngine::new(), None)
}

/// Like [`test_client`] over a caller-supplied engine and optional environment
pub fn test_client_with(
    engine: MemoryStorageEngine,
    environment: Option<&str>,
) -> (StorageClient, MemoryStorageEngine) {
    let mut builder = StorageClient::builder(Arc::new(engine.clone()))
        .id_source(Arc::new(|| TEST_ID.to_string()))
        .clock(Arc::new(|| TEST_NOW.to_string()));
    if let Some(environment) = environment {
        builder = builder.environment(environment);
    }
    (builder.build(), engine)
}
