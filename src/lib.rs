// Diary - journaling backend
// Storage abstraction over DynamoDB, local files and memory

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod config;
pub mod server;
pub mod storage;
pub mod telemetry;

// Re-exports for convenience
pub use auth::{AuthClient, AuthError, Principal};
pub use config::Settings;
pub use storage::{Item, Scalar, StorageClient, StorageEngine, StorageError, TableSpec};

/// Diary error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Storage error: {0}")]
        Storage(#[from] crate::storage::StorageError),

        #[error("Auth error: {0}")]
        Auth(#[from] crate::auth::AuthError),

        #[error("Config error: {0}")]
        Config(#[from] crate::config::ConfigError),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
