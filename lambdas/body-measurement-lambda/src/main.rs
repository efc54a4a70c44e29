use aws_sdk_dynamodb::Client as DynamoClient;
use healthmate_shared::config::Config;
use healthmate_shared::AppState;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod event_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(Config::log_filter_from_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        // CloudWatch adds ingestion time
        .with_target(false)
        .without_time()
        .init();

    // After the subscriber, so config fallbacks are logged
    let config = Config::from_env();

    // Initialize AWS clients once at startup
    let aws_config = config.load_aws_config().await;
    let state = AppState::new(config, DynamoClient::new(&aws_config));
    tracing::info!(
        "Body measurement handler ready (table: {})",
        state.measurements.store().table_name()
    );

    run(service_fn(move |event: LambdaEvent<Value>| {
        let state = Arc::clone(&state);
        async move { event_handler::function_handler(event, state).await }
    }))
    .await
}
