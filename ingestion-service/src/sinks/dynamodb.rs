use std::{collections::HashMap, time::Duration};

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    config::Region,
    error::DisplayErrorContext,
    types::{
        AttributeDefinition, AttributeValue, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
        KeyType, Projection, ProjectionType, ProvisionedThroughput, ScalarAttributeType,
        TableStatus,
    },
    Client,
};
use seismic_client::domain::SeismicRecord;

use super::{PutOutcome, RecordStore, StoreError};

const TIMESTAMP_INDEX: &str = "TimestampIndex";
const CAPACITY_UNITS: i64 = 5;
const ACTIVE_POLL_ATTEMPTS: u32 = 30;
const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// DynamoDB table keyed by `id` (S), written with `attribute_not_exists(id)`.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    table: String,
}

impl DynamoDbStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Build a client from the default AWS credential chain.
    ///
    /// `endpoint_url` points at DynamoDB Local or another compatible endpoint.
    pub async fn connect(
        table: impl Into<String>,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        Self::new(Client::new(&shared), table)
    }

    async fn create_table(&self) -> Result<(), StoreError> {
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(CAPACITY_UNITS)
            .write_capacity_units(CAPACITY_UNITS)
            .build()
            .map_err(provisioning_error)?;

        let timestamp_index = GlobalSecondaryIndex::builder()
            .index_name(TIMESTAMP_INDEX)
            .key_schema(hash_key("scraped_at")?)
            .projection(Projection::builder().projection_type(ProjectionType::All).build())
            .provisioned_throughput(throughput.clone())
            .build()
            .map_err(provisioning_error)?;

        let res = self
            .client
            .create_table()
            .table_name(&self.table)
            .key_schema(hash_key("id")?)
            .attribute_definitions(string_attribute("id")?)
            .attribute_definitions(string_attribute("scraped_at")?)
            .global_secondary_indexes(timestamp_index)
            .billing_mode(BillingMode::Provisioned)
            .provisioned_throughput(throughput)
            .send()
            .await;

        match res {
            Ok(_) => {
                tracing::info!(table = %self.table, "table created");
                Ok(())
            }
            // Another invocation created it first.
            Err(e) if e.as_service_error().is_some_and(|se| se.is_resource_in_use_exception()) => Ok(()),
            Err(e) => Err(StoreError::Provisioning(format!(
                "create_table {}: {}",
                self.table,
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn wait_until_active(&self) -> Result<(), StoreError> {
        for _ in 0..ACTIVE_POLL_ATTEMPTS {
            let out = self
                .client
                .describe_table()
                .table_name(&self.table)
                .send()
                .await
                .map_err(|e| {
                    StoreError::Provisioning(format!(
                        "describe_table {}: {}",
                        self.table,
                        DisplayErrorContext(&e)
                    ))
                })?;

            let status = out.table().and_then(|t| t.table_status());
            if status == Some(&TableStatus::Active) {
                return Ok(());
            }
            tracing::debug!(table = %self.table, ?status, "waiting for table to become active");
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }

        Err(StoreError::Provisioning(format!(
            "table {} did not become active",
            self.table
        )))
    }
}

fn provisioning_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Provisioning(e.to_string())
}

fn hash_key(attribute: &str) -> Result<KeySchemaElement, StoreError> {
    KeySchemaElement::builder()
        .attribute_name(attribute)
        .key_type(KeyType::Hash)
        .build()
        .map_err(provisioning_error)
}

fn string_attribute(attribute: &str) -> Result<AttributeDefinition, StoreError> {
    AttributeDefinition::builder()
        .attribute_name(attribute)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(provisioning_error)
}

fn put_s(item: &mut HashMap<String, AttributeValue>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        item.insert(key.to_string(), AttributeValue::S(v.clone()));
    }
}

/// Item layout: strings as `S`, decimals and the epoch as `N` with their exact
/// decimal text. Absent optionals are omitted, never written as NULL.
pub fn record_to_item(record: &SeismicRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert("id".to_string(), AttributeValue::S(record.id.clone()));
    put_s(&mut item, "code", &record.code);
    if let Some(ms) = record.event_time_epoch_ms {
        item.insert("event_time_epoch_ms".to_string(), AttributeValue::N(ms.to_string()));
    }
    put_s(&mut item, "event_time_utc", &record.event_time_utc);
    put_s(&mut item, "event_time_local", &record.event_time_local);
    item.insert("latitude".to_string(), AttributeValue::N(record.latitude.to_string()));
    item.insert("longitude".to_string(), AttributeValue::N(record.longitude.to_string()));
    item.insert("magnitude".to_string(), AttributeValue::N(record.magnitude.to_string()));
    put_s(&mut item, "magnitude_scale", &record.magnitude_scale);
    if let Some(depth) = record.depth_km {
        item.insert("depth_km".to_string(), AttributeValue::N(depth.to_string()));
    }
    put_s(&mut item, "depth_category", &record.depth_category);
    put_s(&mut item, "reference_place", &record.reference_place);
    put_s(&mut item, "region", &record.region);
    put_s(&mut item, "intensity", &record.intensity);
    put_s(&mut item, "felt_report", &record.felt_report);
    put_s(&mut item, "report_date", &record.report_date);
    put_s(&mut item, "report_time", &record.report_time);
    put_s(&mut item, "latest_flag", &record.latest_flag);
    put_s(&mut item, "report_flag", &record.report_flag);
    item.insert("scraped_at".to_string(), AttributeValue::S(record.scraped_at.clone()));
    item.insert("source_label".to_string(), AttributeValue::S(record.source_label.clone()));
    item.insert("source_url".to_string(), AttributeValue::S(record.source_url.clone()));

    item
}

#[async_trait::async_trait]
impl RecordStore for DynamoDbStore {
    fn table(&self) -> &str {
        &self.table
    }

    #[tracing::instrument(level = "debug", skip(self), fields(table = %self.table))]
    async fn ensure_table(&self) -> Result<(), StoreError> {
        match self.client.describe_table().table_name(&self.table).send().await {
            Ok(_) => {
                tracing::info!(table = %self.table, "table exists");
                return Ok(());
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_resource_not_found_exception()) => {
                tracing::info!(table = %self.table, "table not found, creating");
            }
            Err(e) => {
                return Err(StoreError::Provisioning(format!(
                    "describe_table {}: {}",
                    self.table,
                    DisplayErrorContext(&e)
                )));
            }
        }

        self.create_table().await?;
        self.wait_until_active().await
    }

    async fn put_if_absent(&self, record: &SeismicRecord) -> Result<PutOutcome, StoreError> {
        let res = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_to_item(record)))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match res {
            Ok(_) => Ok(PutOutcome::Written),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(PutOutcome::AlreadyExists)
            }
            Err(e) => Err(StoreError::Backend(format!(
                "put_item {}: {}",
                record.id,
                DisplayErrorContext(&e)
            ))),
        }
    }
}
