use healthmate_shared::{dispatch, AppState};
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;

/// Client-context key the gateway uses for the invoked tool
const GATEWAY_TOOL_NAME_KEY: &str = "bedrockAgentCoreToolName";
/// Gateway tool names are "<target>___<tool>"
const GATEWAY_TOOL_SEPARATOR: &str = "___";

/// Lambda entry point: the event is the flat parameter map, the result is
/// always a flat result map (failures included)
pub(crate) async fn function_handler(
    event: LambdaEvent<Value>,
    state: Arc<AppState>,
) -> Result<Value, Error> {
    let LambdaEvent { payload, context } = event;
    tracing::debug!("Received event: {}", payload);

    let gateway_tool = context
        .client_context
        .as_ref()
        .and_then(|client_context| client_context.custom.get(GATEWAY_TOOL_NAME_KEY))
        .map(|s| s.as_str());
    let tool_name = resolve_tool_name(gateway_tool, &payload, &context.env_config.function_name);

    Ok(dispatch::handle(&state.measurements, tool_name.as_deref(), payload).await)
}

/// Gateway client context first, then the event's own `tool_name` /
/// `toolName`, then a default for functions named after this handler
pub(crate) fn resolve_tool_name(
    gateway_tool: Option<&str>,
    payload: &Value,
    function_name: &str,
) -> Option<String> {
    if let Some(name) = gateway_tool {
        let tool = name
            .split_once(GATEWAY_TOOL_SEPARATOR)
            .map(|(_, tool)| tool)
            .unwrap_or(name);
        if !tool.is_empty() {
            tracing::debug!("Tool name from context: {}", tool);
            return Some(tool.to_string());
        }
    }

    let from_event = ["tool_name", "toolName"]
        .iter()
        .filter_map(|key| payload.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty());
    if let Some(tool) = from_event {
        tracing::debug!("Tool name from event: {}", tool);
        return Some(tool.to_string());
    }

    if function_name.to_lowercase().contains("body-measurement") {
        tracing::debug!("Using default tool name for function {}", function_name);
        return Some("AddBodyMeasurement".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gateway_prefix_is_stripped() {
        let tool = resolve_tool_name(
            Some("health-manager-target___GetLatestMeasurements"),
            &json!({"userId": "u1"}),
            "healthmate-fn",
        );
        assert_eq!(tool.as_deref(), Some("GetLatestMeasurements"));
    }

    #[test]
    fn unprefixed_gateway_name_is_used_whole() {
        let tool = resolve_tool_name(Some("GetOldestMeasurements"), &json!({}), "fn");
        assert_eq!(tool.as_deref(), Some("GetOldestMeasurements"));
    }

    #[test]
    fn event_fields_are_fallback() {
        let tool = resolve_tool_name(None, &json!({"toolName": "DeleteBodyMeasurement"}), "fn");
        assert_eq!(tool.as_deref(), Some("DeleteBodyMeasurement"));

        let tool = resolve_tool_name(
            None,
            &json!({"tool_name": "", "toolName": "GetMeasurementHistory"}),
            "fn",
        );
        assert_eq!(tool.as_deref(), Some("GetMeasurementHistory"));
    }

    #[test]
    fn function_name_default_then_none() {
        let tool = resolve_tool_name(None, &json!({}), "Healthmate-Body-Measurement-Lambda");
        assert_eq!(tool.as_deref(), Some("AddBodyMeasurement"));

        assert_eq!(resolve_tool_name(None, &json!({}), "healthmate-goals"), None);
    }
}
