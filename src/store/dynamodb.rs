use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue as SdkAttributeValue, BillingMode, DeleteRequest,
    KeySchemaElement, KeyType, ProvisionedThroughput, PutRequest, ReturnConsumedCapacity,
    ScalarAttributeType, WriteRequest,
};
use aws_types::sdk_config::{RetryConfig, TimeoutConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{BatchResponse, BulkStore, TableAdmin, TableDescription};
use crate::codec::{AttributeValue, Item};
use crate::error::{StoreError, StoreErrorKind};
use crate::setup::{KeyAttributeKind, TableDefinition};

/// Connection settings for [`DynamoStore::connect`]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// AWS region; the default provider chain decides when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override, e.g. a LocalStack URL
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// TCP connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Socket read timeout
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Whole-operation timeout, including SDK level retries
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_read_timeout_ms() -> u64 {
    20_000
}

fn default_operation_timeout_ms() -> u64 {
    60_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

/// Build the AWS config for a store
///
/// Adaptive retry mode with 3 max attempts at the SDK level, on top of which
/// the dispatcher retries unprocessed items. `AWS_PROFILE=localstack` points
/// the client at a local LocalStack unless an endpoint is configured.
async fn sdk_config(config: &StoreConfig) -> SdkConfig {
    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .read_timeout(Duration::from_millis(config.read_timeout_ms))
        .operation_timeout(Duration::from_millis(config.operation_timeout_ms))
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(
            RetryConfig::adaptive()
                .with_max_attempts(3)
                .with_initial_backoff(Duration::from_secs(1)),
        )
        .timeout_config(timeout_config);

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint_url) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    } else if std::env::var("AWS_PROFILE").unwrap_or_default() == "localstack" {
        loader = loader.endpoint_url("http://127.0.0.1:4566");
    }

    loader.load().await
}

/// DynamoDB backed bulk store
///
/// Owns its client; nothing is shared globally. Writes and deletes go through
/// `BatchWriteItem`, so callers must keep batches within 25 items.
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from connection settings
    pub async fn connect(config: &StoreConfig) -> Self {
        let sdk_config = sdk_config(config).await;
        Self::new(Client::new(&sdk_config))
    }

    /// Underlying SDK client
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchResponse, StoreError> {
        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        let mut unprocessed = Vec::new();
        if let Some(unprocessed_items) = output.unprocessed_items {
            for requests in unprocessed_items.into_values() {
                for request in requests {
                    if let Some(put_request) = request.put_request {
                        unprocessed.push(from_sdk_item(put_request.item)?);
                    }

                    if let Some(delete_request) = request.delete_request {
                        unprocessed.push(from_sdk_item(delete_request.key)?);
                    }
                }
            }
        }

        let consumed_capacity = output.consumed_capacity.map(|capacities| {
            capacities
                .iter()
                .filter_map(|capacity| capacity.capacity_units)
                .sum::<f64>()
        });

        debug!(
            table,
            unprocessed = unprocessed.len(),
            consumed_capacity,
            "BatchWriteItem completed"
        );

        Ok(BatchResponse {
            unprocessed,
            consumed_capacity,
        })
    }
}

impl BulkStore for DynamoStore {
    async fn write(&self, table: &str, items: &[Item]) -> Result<BatchResponse, StoreError> {
        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            let put_request = PutRequest::builder()
                .set_item(Some(to_sdk_item(item)))
                .build()?;
            requests.push(
                WriteRequest::builder()
                    .set_put_request(Some(put_request))
                    .build(),
            );
        }

        self.batch_write(table, requests).await
    }

    async fn delete(&self, table: &str, keys: &[Item]) -> Result<BatchResponse, StoreError> {
        let mut requests = Vec::with_capacity(keys.len());
        for key in keys {
            let delete_request = DeleteRequest::builder()
                .set_key(Some(to_sdk_item(key)))
                .build()?;
            requests.push(
                WriteRequest::builder()
                    .set_delete_request(Some(delete_request))
                    .build(),
            );
        }

        self.batch_write(table, requests).await
    }

    async fn describe(&self, table: &str) -> Result<TableDescription, StoreError> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        let status = output
            .table
            .and_then(|description| description.table_status)
            .map(|status| status.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        Ok(TableDescription {
            name: table.to_string(),
            status,
        })
    }
}

impl TableAdmin for DynamoStore {
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let mut builder = self
            .client
            .create_table()
            .table_name(&definition.name)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(&definition.hash.name)
                    .key_type(KeyType::Hash)
                    .build()?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(&definition.hash.name)
                    .attribute_type(scalar_type(definition.hash.kind))
                    .build()?,
            );

        if let Some(range) = &definition.range {
            builder = builder
                .key_schema(
                    KeySchemaElement::builder()
                        .attribute_name(&range.name)
                        .key_type(KeyType::Range)
                        .build()?,
                )
                .attribute_definitions(
                    AttributeDefinition::builder()
                        .attribute_name(&range.name)
                        .attribute_type(scalar_type(range.kind))
                        .build()?,
                );
        }

        builder = match definition.throughput {
            Some(throughput) => builder.provisioned_throughput(
                ProvisionedThroughput::builder()
                    .read_capacity_units(throughput.read_capacity_units)
                    .write_capacity_units(throughput.write_capacity_units)
                    .build()?,
            ),
            None => builder.billing_mode(BillingMode::PayPerRequest),
        };

        match builder.send().await {
            Ok(_) => Ok(()),
            // Table already exists
            Err(e) if matches!(e.as_service_error(), Some(CreateTableError::ResourceInUseException(_))) => {
                debug!(table = %definition.name, "table already exists");
                Ok(())
            }
            Err(e) => Err(classify(&definition.name, e)),
        }
    }

    async fn delete_table(&self, table: &str) -> Result<(), StoreError> {
        match self.client.delete_table().table_name(table).send().await {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.as_service_error(), Some(DeleteTableError::ResourceNotFoundException(_))) => {
                debug!(table, "table already gone");
                Ok(())
            }
            Err(e) => Err(classify(table, e)),
        }
    }
}

fn scalar_type(kind: KeyAttributeKind) -> ScalarAttributeType {
    match kind {
        KeyAttributeKind::String => ScalarAttributeType::S,
        KeyAttributeKind::Number => ScalarAttributeType::N,
        KeyAttributeKind::Binary => ScalarAttributeType::B,
    }
}

fn to_sdk_value(value: &AttributeValue) -> SdkAttributeValue {
    match value {
        AttributeValue::N(n) => SdkAttributeValue::N(n.clone()),
        AttributeValue::S(s) => SdkAttributeValue::S(s.clone()),
        AttributeValue::B(bytes) => SdkAttributeValue::B(Blob::new(bytes.clone())),
    }
}

fn to_sdk_item(item: &Item) -> HashMap<String, SdkAttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_sdk_value(value)))
        .collect()
}

fn from_sdk_item(item: HashMap<String, SdkAttributeValue>) -> Result<Item, StoreError> {
    item.into_iter()
        .map(|(name, value)| {
            let value = match value {
                SdkAttributeValue::N(n) => AttributeValue::N(n),
                SdkAttributeValue::S(s) => AttributeValue::S(s),
                SdkAttributeValue::B(blob) => AttributeValue::B(blob.into_inner()),
                other => {
                    return Err(StoreError::other(format!(
                        "unsupported attribute type for '{name}': {other:?}"
                    )));
                }
            };
            Ok((name, value))
        })
        .collect()
}

/// Map a DynamoDB error code onto a store error kind
fn kind_for_code(code: Option<&str>) -> StoreErrorKind {
    match code {
        Some("ResourceNotFoundException") => StoreErrorKind::NotFound,
        Some(
            "ProvisionedThroughputExceededException"
            | "RequestLimitExceeded"
            | "ThrottlingException"
            | "InternalServerError"
            | "ServiceUnavailable",
        ) => StoreErrorKind::Throttled,
        _ => StoreErrorKind::Other,
    }
}

fn classify<E>(table: &str, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::ServiceError(service) => kind_for_code(service.err().code()),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => StoreErrorKind::Throttled,
        _ => StoreErrorKind::Other,
    };

    StoreError::new(kind, format!("table '{table}': {}", DisplayErrorContext(&err)))
}
