//! Layered configuration
//!
//! Loaded in order, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `diary.toml` in the current directory (optional)
//! 3. An explicit config file, if given
//! 4. Environment variables prefixed `DIARY__`, with `__` between levels
//!    (`DIARY__STORAGE__ENGINE=file`, `DIARY__SERVER__PORT=9000`)

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{AuthClient, JwksKeyEngine};
use crate::server::{ServerConfig, DEFAULT_USER_ID};
use crate::storage::{
    FileStorageEngine, MemoryStorageEngine, StorageClient, StorageEngine, WaitPolicy,
};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "diary";

/// Prefix for environment overrides
pub const CONFIG_ENV_PREFIX: &str = "DIARY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("storage engine '{0}' is not available in this build")]
    UnsupportedEngine(String),

    #[error("auth is enabled but '{0}' is not set")]
    MissingAuthSetting(&'static str),
}

/// Top-level settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Table name prefix
    pub environment: Option<String>,
    pub log_level: String,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Some("development".to_string()),
            log_level: "info".to_string(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Acting user when auth is disabled
    pub default_user_id: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            default_user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl ServerSettings {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            http_addr: self.host.clone(),
            http_port: self.port,
            enable_cors: self.enable_cors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Memory,
    File,
    Dynamodb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub engine: EngineKind,
    /// Parent directory of `.filedb` for the file engine
    pub location: PathBuf,
    pub db_name: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub poll_interval_ms: u64,
    /// Unbounded when unset
    pub wait_timeout_ms: Option<u64>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::Memory,
            location: PathBuf::from("."),
            db_name: "default".to_string(),
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            poll_interval_ms: 100,
            wait_timeout_ms: None,
        }
    }
}

impl StorageSettings {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.wait_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Build the configured engine
    pub async fn open_engine(&self) -> Result<Arc<dyn StorageEngine>, ConfigError> {
        let wait = self.wait_policy();
        match self.engine {
            EngineKind::Memory => Ok(Arc::new(MemoryStorageEngine::new().with_wait_policy(wait))),
            EngineKind::File => Ok(Arc::new(
                FileStorageEngine::new(&self.location, &self.db_name).with_wait_policy(wait),
            )),
            #[cfg(feature = "dynamodb")]
            EngineKind::Dynamodb => {
                let config = crate::storage::DynamoDbConfig {
                    region: self.region.clone(),
                    endpoint: self.endpoint.clone(),
                    access_key_id: self.access_key_id.clone(),
                    secret_access_key: self.secret_access_key.clone(),
                };
                Ok(Arc::new(
                    crate::storage::DynamoStorageEngine::new(config)
                        .await
                        .with_wait_policy(wait),
                ))
            }
            #[cfg(not(feature = "dynamodb"))]
            EngineKind::Dynamodb => Err(ConfigError::UnsupportedEngine("dynamodb".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub audience: Option<String>,
    pub issuer: Option<String>,
    pub jwks_uri: Option<String>,
}

impl AuthSettings {
    /// The authorizer, or `None` when auth is disabled
    pub fn client(&self) -> Result<Option<AuthClient>, ConfigError> {
        if !self.enabled {
            return Ok(None);
        }
        let audience = self
            .audience
            .clone()
            .ok_or(ConfigError::MissingAuthSetting("auth.audience"))?;
        let issuer = self
            .issuer
            .clone()
            .ok_or(ConfigError::MissingAuthSetting("auth.issuer"))?;
        let jwks_uri = self
            .jwks_uri
            .clone()
            .ok_or(ConfigError::MissingAuthSetting("auth.jwks_uri"))?;

        Ok(Some(AuthClient::new(
            audience,
            issuer,
            Arc::new(JwksKeyEngine::new(jwks_uri)),
        )))
    }
}

impl Settings {
    /// Load settings from all sources
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment_source())
    }

    fn load_with(
        path: Option<&str>,
        environment: ::config::Environment,
    ) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Toml).required(true));
        }

        let settings = builder.add_source(environment).build()?.try_deserialize()?;
        Ok(settings)
    }

    /// A storage client over the configured engine
    pub async fn storage_client(&self) -> Result<StorageClient, ConfigError> {
        let engine = self.storage.open_engine().await?;
        let mut builder = StorageClient::builder(engine);
        if let Some(environment) = &self.environment {
            builder = builder.environment(environment.clone());
        }
        Ok(builder.build())
    }
}

fn environment_source() -> ::config::Environment {
    ::config::Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
