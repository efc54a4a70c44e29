pub mod config;
pub mod dispatch;
pub mod error;
pub mod measurements;
pub mod requests;
pub mod store;
pub mod summary;
pub mod types;

use aws_sdk_dynamodb::Client as DynamoClient;
use config::Config;
use measurements::BodyMeasurementService;
use std::sync::Arc;
use store::DynamoMeasurementStore;

/// Shared application state, built once per cold start
pub struct AppState {
    pub config: Config,
    pub measurements: BodyMeasurementService<DynamoMeasurementStore>,
}

impl AppState {
    pub fn new(config: Config, dynamo_client: DynamoClient) -> Arc<Self> {
        let store = DynamoMeasurementStore::new(dynamo_client, config.table_name.clone());
        Arc::new(Self {
            config,
            measurements: BodyMeasurementService::new(store),
        })
    }
}
