use common::{dynamodb_client, init_tracing, ApiEvent, ApiResponse, Settings};
use device_status::{DeviceStatusHandler, DynamoDbStore};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

async fn function_handler(
    handler: &DeviceStatusHandler<DynamoDbStore>,
    event: LambdaEvent<ApiEvent>,
) -> Result<ApiResponse, Error> {
    Ok(handler.handle(event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let settings = Settings::from_env();
    let client = dynamodb_client(settings.region.as_deref()).await;
    let store = DynamoDbStore::new(client, settings.devices_table_name());

    info!(
        "Starting device-status {} in {} against table {}",
        env!("CARGO_PKG_VERSION"),
        settings.environment,
        store.table_name()
    );

    let handler = DeviceStatusHandler::new(store, settings.environment);

    run(service_fn(|event: LambdaEvent<ApiEvent>| {
        function_handler(&handler, event)
    }))
    .await
}
