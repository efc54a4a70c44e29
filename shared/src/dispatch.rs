use crate::error::{HealthError, Result};
use crate::measurements::BodyMeasurementService;
use crate::requests::{
    required, AddMeasurementRequest, DeleteMeasurementRequest, HistoryRequest,
    UpdateMeasurementRequest, UserRequest,
};
use crate::store::MeasurementStore;
use crate::types::MeasurementView;
use serde_json::{json, Value};

/// Operations exposed to the gateway, by tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddBodyMeasurement,
    UpdateBodyMeasurement,
    DeleteBodyMeasurement,
    GetLatestMeasurements,
    GetOldestMeasurements,
    GetMeasurementHistory,
}

impl Operation {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "AddBodyMeasurement" => Some(Operation::AddBodyMeasurement),
            "UpdateBodyMeasurement" => Some(Operation::UpdateBodyMeasurement),
            "DeleteBodyMeasurement" => Some(Operation::DeleteBodyMeasurement),
            "GetLatestMeasurements" => Some(Operation::GetLatestMeasurements),
            "GetOldestMeasurements" => Some(Operation::GetOldestMeasurements),
            "GetMeasurementHistory" => Some(Operation::GetMeasurementHistory),
            _ => None,
        }
    }
}

/// Run one invocation and always produce a flat result map; failures are
/// classified, logged and turned into `{success: false, ...}`.
pub async fn handle<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    tool_name: Option<&str>,
    parameters: Value,
) -> Value {
    match dispatch(service, tool_name, parameters).await {
        Ok(result) => result,
        Err(e) => {
            match &e {
                HealthError::Validation(_) => tracing::warn!("{}", e),
                HealthError::Storage { code, message } => {
                    tracing::error!("Database error ({}): {}", code, message)
                }
                HealthError::Internal(_) => tracing::error!("{}", e),
            }
            e.to_response()
        }
    }
}

async fn dispatch<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    tool_name: Option<&str>,
    parameters: Value,
) -> Result<Value> {
    if !parameters.is_object() {
        return Err(HealthError::validation("parameters must be a JSON object"));
    }

    let user_id = parameters
        .get("userId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            HealthError::validation("userId is required for all body measurement operations")
        })?;
    tracing::info!("Processing request for userId: {}", user_id);

    let tool_name = tool_name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HealthError::validation("could not determine tool name"))?;
    let operation = Operation::parse(tool_name)
        .ok_or_else(|| HealthError::Validation(format!("Unknown operation: {}", tool_name)))?;

    let result = match operation {
        Operation::AddBodyMeasurement => add(service, parameters).await?,
        Operation::UpdateBodyMeasurement => update(service, parameters).await?,
        Operation::DeleteBodyMeasurement => delete(service, parameters).await?,
        Operation::GetLatestMeasurements => latest(service, parameters).await?,
        Operation::GetOldestMeasurements => oldest(service, parameters).await?,
        Operation::GetMeasurementHistory => history(service, parameters).await?,
    };

    tracing::info!("Operation completed successfully: {}", tool_name);
    Ok(result)
}

async fn add<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    parameters: Value,
) -> Result<Value> {
    let req: AddMeasurementRequest = serde_json::from_value(parameters)?;
    let values = req.metrics.parse()?;

    let record = service
        .add(&req.user_id, values, req.measurement_time)
        .await?;

    Ok(json!({
        "success": true,
        "message": "Measurement recorded successfully",
        "measurementId": record.measurement_id(),
        "measurementTime": record.measurement_time,
        "recordedValues": record.values.to_json(),
    }))
}

async fn update<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    parameters: Value,
) -> Result<Value> {
    let req: UpdateMeasurementRequest = serde_json::from_value(parameters)?;
    let measurement_id = required(&req.measurement_id, "measurement_id")?;
    let values = req.metrics.parse()?;

    service
        .update(&req.user_id, measurement_id, values.clone())
        .await?;

    Ok(json!({
        "success": true,
        "message": "Measurement updated successfully",
        "measurementId": measurement_id,
        "updatedValues": values.to_json(),
    }))
}

async fn delete<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    parameters: Value,
) -> Result<Value> {
    let req: DeleteMeasurementRequest = serde_json::from_value(parameters)?;
    let measurement_id = required(&req.measurement_id, "measurement_id")?;

    service.delete(&req.user_id, measurement_id).await?;

    Ok(json!({
        "success": true,
        "message": "Measurement deleted successfully",
        "deletedMeasurementId": measurement_id,
    }))
}

async fn latest<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    parameters: Value,
) -> Result<Value> {
    let req: UserRequest = serde_json::from_value(parameters)?;
    Ok(match service.latest(&req.user_id).await? {
        Some(summary) => json!({
            "success": true,
            "message": "Latest measurements retrieved",
            "measurements": summary.to_json(),
        }),
        None => {
            tracing::info!("No measurements found for user: {}", req.user_id);
            no_measurements()
        }
    })
}

async fn oldest<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    parameters: Value,
) -> Result<Value> {
    let req: UserRequest = serde_json::from_value(parameters)?;
    Ok(match service.oldest(&req.user_id).await? {
        Some(summary) => json!({
            "success": true,
            "message": "Oldest measurements retrieved",
            "measurements": summary.to_json(),
        }),
        None => {
            tracing::info!("No measurements found for user: {}", req.user_id);
            no_measurements()
        }
    })
}

async fn history<S: MeasurementStore>(
    service: &BodyMeasurementService<S>,
    parameters: Value,
) -> Result<Value> {
    let req: HistoryRequest = serde_json::from_value(parameters)?;
    let (start_date, end_date) = match (&req.start_date, &req.end_date) {
        (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => (start, end),
        _ => {
            return Err(HealthError::validation(
                "start_date and end_date are required",
            ))
        }
    };
    let limit = req.limit()?;

    let records = service
        .history(&req.user_id, start_date, end_date, limit)
        .await?;
    let measurements: Vec<MeasurementView> = records.iter().map(MeasurementView::from).collect();
    tracing::info!(
        "Retrieved {} measurements for user: {}",
        measurements.len(),
        req.user_id
    );

    Ok(json!({
        "success": true,
        "message": format!("Retrieved {} measurement records", measurements.len()),
        "count": measurements.len(),
        "measurements": measurements,
        "period": {
            "start_date": start_date,
            "end_date": end_date,
        },
    }))
}

fn no_measurements() -> Value {
    json!({
        "success": true,
        "message": "No measurement records found",
        "measurements": {},
    })
}
