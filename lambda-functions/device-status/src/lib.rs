use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use common::{current_timestamp, error_response, format_response, handle_error, ApiEvent, ApiResponse};
use serde::{Deserialize, Serialize};
use serde_dynamo::{from_item, to_item};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{info, info_span, Instrument};

pub const REQUIRED_FIELDS: [&str; 2] = ["device_id", "status"];
pub const DEVICE_ID_PREFIX: &str = "dev-";
pub const MIN_DEVICE_ID_LENGTH: usize = 6;

/// An item exactly as it sits in the table, including attributes this
/// handler never writes.
pub type StoredItem = Map<String, Value>;

/// Last known state of a device, stored under `device_id`.
///
/// `device_id` and `status` keep whatever JSON the caller sent. The table
/// schema, not this type, decides whether a key is acceptable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceStatusRecord {
    pub device_id: Value,
    pub status: Value,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_strength: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<Value>,
}

impl DeviceStatusRecord {
    /// Builds the replacement record for an update request body.
    ///
    /// `timestamp` is honored as given (non-string values keep their JSON
    /// text), otherwise the record is stamped with the current time. Optional
    /// fields are copied only when present and non-null.
    pub fn from_update(device_id: &Value, status: &Value, body: &Map<String, Value>) -> Self {
        let last_updated = match body.get("timestamp") {
            Some(Value::String(timestamp)) => timestamp.clone(),
            None | Some(Value::Null) => current_timestamp(),
            Some(other) => other.to_string(),
        };

        let optional = |field: &str| body.get(field).filter(|value| !value.is_null()).cloned();

        Self {
            device_id: device_id.clone(),
            status: status.clone(),
            last_updated,
            battery_level: optional("battery_level"),
            connection_strength: optional("connection_strength"),
            firmware_version: optional("firmware_version"),
        }
    }
}

/// Key-value persistence for device status records.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Replaces whatever is stored under `record.device_id`.
    async fn put(&self, record: &DeviceStatusRecord) -> Result<()>;

    async fn get(&self, device_id: &str) -> Result<Option<StoredItem>>;
}

pub struct DynamoDbStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoDbStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl DeviceStore for DynamoDbStore {
    async fn put(&self, record: &DeviceStatusRecord) -> Result<()> {
        let item: HashMap<String, AttributeValue> = to_item(record)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        Ok(())
    }

    async fn get(&self, device_id: &str) -> Result<Option<StoredItem>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("device_id", AttributeValue::S(device_id.to_string()))
            .send()
            .await?;

        result.item.map(decode_item).transpose()
    }
}

fn decode_item(item: HashMap<String, AttributeValue>) -> Result<StoredItem> {
    Ok(from_item(item)?)
}

pub struct DeviceStatusHandler<S> {
    store: S,
    environment: String,
}

impl<S: DeviceStore> DeviceStatusHandler<S> {
    pub fn new(store: S, environment: impl Into<String>) -> Self {
        Self {
            store,
            environment: environment.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Entry point for one invocation. Never fails: errors become a 500 response.
    pub async fn handle(&self, event: ApiEvent) -> ApiResponse {
        let span = info_span!("device_status", environment = %self.environment);

        handle_error("device_status", self.dispatch(&event))
            .instrument(span)
            .await
    }

    /// POST updates, every other method is a lookup.
    pub async fn dispatch(&self, event: &ApiEvent) -> Result<ApiResponse> {
        info!(
            "Received {} request for {}",
            event.http_method(),
            event.path.as_deref().unwrap_or("-")
        );

        match event.http_method() {
            "POST" => self.update_device_status(event).await,
            _ => self.get_device_status(event).await,
        }
    }

    pub async fn update_device_status(&self, event: &ApiEvent) -> Result<ApiResponse> {
        let body = event.extract_body()?;

        if let Some(field) = REQUIRED_FIELDS.iter().find(|field| !body.contains_key(**field)) {
            return Ok(error_response(400, format!("Missing required field: {}", field)));
        }

        let record = DeviceStatusRecord::from_update(&body["device_id"], &body["status"], &body);

        info!("Updating device status for device_id: {}", record.device_id);
        self.store.put(&record).await?;

        Ok(format_response(
            200,
            json!({
                "message": "Device status updated successfully",
                "device_id": record.device_id,
                "status": record.status,
            }),
            None,
        ))
    }

    pub async fn get_device_status(&self, event: &ApiEvent) -> Result<ApiResponse> {
        let path_params = event.path_parameters();

        let device_id = match path_params.get("device_id").filter(|id| !id.is_empty()) {
            Some(device_id) => device_id,
            None => return Ok(error_response(400, "Missing device_id parameter")),
        };

        info!("Retrieving status for device_id: {}", device_id);

        match self.store.get(device_id).await? {
            Some(item) => Ok(format_response(200, Value::Object(item), None)),
            None => Ok(error_response(404, format!("Device not found: {}", device_id))),
        }
    }
}

/// Checks the `dev-<suffix>` identifier convention.
///
/// Not applied by the handler: any non-empty id is accepted for reads and writes.
pub fn validate_device_id(device_id: &Value) -> bool {
    match device_id.as_str() {
        Some(id) => id.starts_with(DEVICE_ID_PREFIX) && id.chars().count() >= MIN_DEVICE_ID_LENGTH,
        None => false,
    }
}
