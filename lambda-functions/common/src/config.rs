use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoClient;
use bon::Builder;

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_DEVICES_TABLE: &str = "devices";

/// Process-wide settings, read once at cold start.
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Deployment stage used to prefix table names (`dev`, `test`, `prod`).
    #[builder(into, default = DEFAULT_ENVIRONMENT.to_string())]
    pub environment: String,

    /// Logical name of the device status table.
    #[builder(into, default = DEFAULT_DEVICES_TABLE.to_string())]
    pub devices_table: String,

    pub region: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        let devices_table =
            std::env::var("DEVICES_TABLE").unwrap_or_else(|_| DEFAULT_DEVICES_TABLE.to_string());

        Self::builder()
            .environment(environment)
            .devices_table(devices_table)
            .maybe_region(std::env::var("AWS_REGION").ok())
            .build()
    }

    pub fn table_name(&self, logical_name: &str) -> String {
        resolve_table_name(logical_name, &self.environment)
    }

    pub fn devices_table_name(&self) -> String {
        self.table_name(&self.devices_table)
    }
}

/// Maps a logical table name to its physical name for `environment`.
///
/// Names that already start with `"{environment}-"` are returned unchanged,
/// everything else gets the prefix.
pub fn resolve_table_name(logical_name: &str, environment: &str) -> String {
    if logical_name.starts_with(&format!("{}-", environment)) {
        logical_name.to_string()
    } else {
        format!("{}-{}", environment, logical_name)
    }
}

pub async fn dynamodb_client(region: Option<&str>) -> DynamoClient {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }

    DynamoClient::new(&loader.load().await)
}
