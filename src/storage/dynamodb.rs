//! DynamoDB storage engine
//!
//! Key attributes are declared as strings and tables use on-demand billing.
//! Scalars map to `S`, `N` and `BOOL` attribute values.
//!
//! ## Error mapping
//!
//! ```text
//! ResourceNotFoundException                  -> MissingTable
//! ResourceInUseException (create_table)      -> ExistingTable
//! ValidationException "Missing the key ..."  -> MissingKey
//! anything else                              -> Backend (message kept)
//! ```

use crate::storage::engine::{StorageEngine, TableDescription, TableStatus, WaitPolicy};
use crate::storage::error::{Result, StorageError};
use crate::storage::item::{Item, Scalar};
use async_trait::async_trait;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use tracing::{debug, info};

const MISSING_KEY_MESSAGE: &str = "Missing the key";

/// DynamoDB engine configuration
#[derive(Debug, Clone, Default)]
pub struct DynamoDbConfig {
    /// AWS region (optional, uses SDK default if not specified)
    pub region: Option<String>,
    /// Optional endpoint override (e.g. DynamoDB Local)
    pub endpoint: Option<String>,
    /// Static access key id; SDK credential chain when absent
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
}

/// DynamoDB-backed storage engine
#[derive(Clone)]
pub struct DynamoStorageEngine {
    client: Client,
    wait: WaitPolicy,
}

impl std::fmt::Debug for DynamoStorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStorageEngine")
            .field("wait", &self.wait)
            .finish()
    }
}

impl DynamoStorageEngine {
    /// Create a new engine from SDK defaults plus overrides
    pub async fn new(config: DynamoDbConfig) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(Region::new(region));
        }

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let (Some(id), Some(secret)) = (config.access_key_id, config.secret_access_key) {
            builder = builder.credentials_provider(Credentials::new(id, secret, None, None, "diary"));
        }

        info!("Connected to DynamoDB");
        Self::from_client(Client::from_conf(builder.build()))
    }

    /// Create from a pre-built client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            wait: WaitPolicy::default(),
        }
    }

    /// Override the polling policy
    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl StorageEngine for DynamoStorageEngine {
    async fn add_item(&self, item: Item, table_name: &str) -> Result<Item> {
        let result = self
            .client
            .put_item()
            .table_name(table_name)
            .set_item(Some(to_attributes(&item)))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(table = table_name, "Put item");
                Ok(item)
            }
            Err(e) => Err(map_sdk_error(e, table_name, Operation::Write)),
        }
    }

    async fn create_table(
        &self,
        hash_key: &str,
        sort_key: Option<&str>,
        table_name: &str,
    ) -> Result<()> {
        let mut attributes = vec![string_attribute(hash_key)?];
        let mut keys = vec![key_element(hash_key, KeyType::Hash)?];
        if let Some(sort_key) = sort_key {
            attributes.push(string_attribute(sort_key)?);
            keys.push(key_element(sort_key, KeyType::Range)?);
        }

        let result = self
            .client
            .create_table()
            .table_name(table_name)
            .set_attribute_definitions(Some(attributes))
            .set_key_schema(Some(keys))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await;

        result
            .map(|_| ())
            .map_err(|e| map_sdk_error(e, table_name, Operation::Create))
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableDescription> {
        let response = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, table_name, Operation::Read))?;

        let table = response
            .table()
            .ok_or_else(|| StorageError::missing_table(table_name))?;

        let key_name = |wanted: KeyType| {
            table
                .key_schema()
                .iter()
                .find(|element| *element.key_type() == wanted)
                .map(|element| element.attribute_name().to_string())
        };
        let hash_key = key_name(KeyType::Hash).ok_or_else(|| {
            StorageError::backend(format!("table '{}' has no hash key", table_name))
        })?;

        let status = match table.table_status() {
            Some(aws_sdk_dynamodb::types::TableStatus::Creating) => TableStatus::Creating,
            _ => TableStatus::Active,
        };

        Ok(TableDescription {
            hash_key,
            sort_key: key_name(KeyType::Range),
            status,
        })
    }

    async fn get_items(
        &self,
        hash_key: &str,
        hash_key_value: &Scalar,
        table_name: &str,
    ) -> Result<Vec<Item>> {
        let response = self
            .client
            .query()
            .table_name(table_name)
            .key_condition_expression("#hk = :hkv")
            .expression_attribute_names("#hk", hash_key)
            .expression_attribute_values(":hkv", to_attribute(hash_key_value))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, table_name, Operation::Read))?;

        Ok(response.items().iter().map(from_attributes).collect())
    }

    fn wait_policy(&self) -> WaitPolicy {
        self.wait
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Write,
    Create,
    Read,
}

/// Typed storage error for a service error, `None` when it has no counterpart
fn classify<E: ProvideErrorMetadata>(
    err: &E,
    table_name: &str,
    operation: Operation,
) -> Option<StorageError> {
    match (err.code(), operation) {
        (Some("ResourceNotFoundException"), _) => Some(StorageError::missing_table(table_name)),
        (Some("ResourceInUseException"), Operation::Create) => {
            Some(StorageError::existing_table(table_name))
        }
        (Some("ValidationException"), Operation::Write)
            if err
                .message()
                .map(|m| m.contains(MISSING_KEY_MESSAGE))
                .unwrap_or(false) =>
        {
            Some(StorageError::MissingKey)
        }
        _ => None,
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>, table_name: &str, operation: Operation) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let Some(mapped) = err
        .as_service_error()
        .and_then(|service_err| classify(service_err, table_name, operation))
    {
        return mapped;
    }
    backend_error(err)
}

fn backend_error<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = match err.as_service_error() {
        Some(service_err) => service_err.to_string(),
        None => err.to_string(),
    };
    StorageError::backend(message)
}

fn string_attribute(name: &str) -> Result<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| StorageError::backend(e.to_string()))
}

fn key_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| StorageError::backend(e.to_string()))
}

fn to_attribute(value: &Scalar) -> AttributeValue {
    match value {
        Scalar::Boolean(b) => AttributeValue::Bool(*b),
        Scalar::Number(n) => AttributeValue::N(n.to_string()),
        Scalar::String(s) => AttributeValue::S(s.clone()),
    }
}

fn to_attributes(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

/// Attribute types outside the scalar set are dropped
fn from_attributes(attributes: &HashMap<String, AttributeValue>) -> Item {
    let mut item: Item = attributes
        .iter()
        .filter_map(|(name, value)| {
            let scalar = match value {
                AttributeValue::S(s) => Scalar::String(s.clone()),
                AttributeValue::N(n) => Scalar::Number(n.parse().ok()?),
                AttributeValue::Bool(b) => Scalar::Boolean(*b),
                _ => return None,
            };
            Some((name.clone(), scalar))
        })
        .collect();
    item.sort_keys();
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::error::ErrorMetadata;
    use aws_sdk_dynamodb::operation::put_item::PutItemError;

    #[test]
    fn test_scalar_attribute_mapping() {
        assert_eq!(to_attribute(&Scalar::from("u1")), AttributeValue::S("u1".into()));
        assert_eq!(to_attribute(&Scalar::from(3)), AttributeValue::N("3".into()));
        assert_eq!(to_attribute(&Scalar::from(true)), AttributeValue::Bool(true));
    }

    #[test]
    fn test_from_attributes_keeps_scalars() {
        let mut attributes = HashMap::new();
        attributes.insert("userId".to_string(), AttributeValue::S("u1".into()));
        attributes.insert("ratingOutOfFive".to_string(), AttributeValue::N("4".into()));
        attributes.insert("private".to_string(), AttributeValue::Bool(false));
        attributes.insert("tags".to_string(), AttributeValue::Ss(vec!["a".into()]));

        let item = from_attributes(&attributes);
        assert_eq!(item.len(), 3);
        assert_eq!(item["userId"], Scalar::from("u1"));
        assert_eq!(item["ratingOutOfFive"], Scalar::Number(4.0));
        assert_eq!(item["private"], Scalar::from(false));
    }

    #[test]
    fn test_item_round_trips_through_attributes() {
        let mut item = Item::new();
        item.insert("date".to_string(), Scalar::from("2020-01-01"));
        item.insert("userId".to_string(), Scalar::from("u1"));

        assert_eq!(from_attributes(&to_attributes(&item)), item);
    }

    fn metadata(code: &str, message: &str) -> ErrorMetadata {
        ErrorMetadata::builder().code(code).message(message).build()
    }

    #[test]
    fn test_not_found_is_missing_table() {
        let err = metadata("ResourceNotFoundException", "Requested resource not found");
        for operation in [Operation::Write, Operation::Create, Operation::Read] {
            let mapped = classify(&err, "entries", operation).expect("mapped");
            assert!(mapped.is_missing_table());
            assert_eq!(
                mapped.to_string(),
                "A table with the name 'entries' could not be found."
            );
        }
    }

    #[test]
    fn test_in_use_is_existing_table_on_create() {
        let err = metadata("ResourceInUseException", "Table already exists: entries");
        assert!(matches!(
            classify(&err, "entries", Operation::Create),
            Some(StorageError::ExistingTable { .. })
        ));
        assert!(classify(&err, "entries", Operation::Write).is_none());
    }

    #[test]
    fn test_missing_key_validation() {
        let err = metadata(
            "ValidationException",
            "One or more parameter values were invalid: Missing the key date in the item",
        );
        assert!(matches!(
            classify(&err, "entries", Operation::Write),
            Some(StorageError::MissingKey)
        ));

        let other = metadata("ValidationException", "Item size has exceeded the maximum");
        assert!(classify(&other, "entries", Operation::Write).is_none());

        let throttled = metadata(
            "ProvisionedThroughputExceededException",
            "Missing the key date in the item",
        );
        assert!(classify(&throttled, "entries", Operation::Write).is_none());
    }

    #[test]
    fn test_unclassified_errors_are_backend() {
        let err: SdkError<PutItemError, ()> = SdkError::construction_failure("bad request");
        assert!(matches!(
            map_sdk_error(err, "entries", Operation::Write),
            StorageError::Backend(_)
        ));
    }

    #[test]
    fn test_key_schema_elements_build() {
        let element = key_element("userId", KeyType::Hash).expect("complete element");
        assert_eq!(element.attribute_name(), "userId");
        assert_eq!(element.key_type(), &KeyType::Hash);

        let attribute = string_attribute("date").expect("complete attribute");
        assert_eq!(attribute.attribute_type(), &ScalarAttributeType::S);
    }
}
