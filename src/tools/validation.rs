//! Validate tool execution requests against their declared parameters.

use super::request::ToolExecutionRequest;
use super::types::ToolSpecification;

/// Validate one request against the tools offered for the call.
///
/// Returns `Err(message)` describing the first violation found.
pub fn validate_request(
    request: &ToolExecutionRequest,
    tools: &[ToolSpecification],
) -> Result<(), String> {
    if request.name.trim().is_empty() {
        return Err("Tool name cannot be empty".to_string());
    }
    let spec = tools
        .iter()
        .find(|t| t.name == request.name)
        .ok_or_else(|| format!("Tool not found: {}", request.name))?;

    let args = request
        .parsed_arguments()
        .map_err(|e| format!("Error parsing arguments json: {e}"))?;

    validate_arguments(&args, &spec.parameters_schema())
        .map_err(|e| format!("{e} in arguments: {}", request.arguments))
}

/// Validate every request, collecting `name: error` lines for the failures.
pub fn validate_requests(
    requests: &[ToolExecutionRequest],
    tools: &[ToolSpecification],
) -> Vec<String> {
    requests
        .iter()
        .filter_map(|r| validate_request(r, tools).err().map(|e| format!("{}: {e}", r.name)))
        .collect()
}

/// Validate arguments against a JSON Schema object.
///
/// Checks the top-level type, required parameter presence, and property
/// types, including the item type of array properties.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    if schema.get("type").and_then(|v| v.as_str()) == Some("object") && !args.is_object() {
        return Err(format!(
            "expected object arguments, got {}",
            json_type_name(args)
        ));
    }
    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for name in required.iter().filter_map(|f| f.as_str()) {
            if obj.get(name).map_or(true, |v| v.is_null()) {
                return Err(format!("Missing required parameter: '{name}'"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };
    for (key, value) in obj {
        let Some(prop) = properties.get(key) else {
            continue;
        };
        // Optional parameters may be sent as explicit nulls.
        if value.is_null() {
            continue;
        }
        let Some(expected) = prop.get("type").and_then(|v| v.as_str()) else {
            continue;
        };
        if !value_matches_type(value, expected) {
            return Err(format!(
                "Parameter '{key}' expected value of type {expected} but got {}",
                json_type_name(value)
            ));
        }
        if let (Some(items), Some(item_type)) = (
            value.as_array(),
            prop.pointer("/items/type").and_then(|v| v.as_str()),
        ) {
            if let Some(bad) = items.iter().find(|i| !value_matches_type(i, item_type)) {
                return Err(format!(
                    "Parameter '{key}' expected elements of type {item_type} but got {}",
                    json_type_name(bad)
                ));
            }
        }
    }

    Ok(())
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
