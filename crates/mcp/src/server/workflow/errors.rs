//! Structured MCP error helpers.

use chrono::Utc;
use rmcp::model::ErrorData;
use serde_json::Value;

fn build_error_data(error_code: &str, category: &str, message: &str, context: Value, retryable: bool, suggested_action: &str) -> Value {
    serde_json::json!({
        "error_code": error_code,
        "category": category,
        "message": message,
        "context": context,
        "retryable": retryable,
        "suggested_action": suggested_action,
        "correlation_id": format!("wfgate-{}", Utc::now().timestamp_millis()),
    })
}

pub fn invalid_params_error(error_code: &str, message: impl Into<String>, context: Value, suggested_action: &str) -> ErrorData {
    let message = message.into();
    ErrorData::invalid_params(
        message.clone(),
        Some(build_error_data(error_code, "validation", &message, context, false, suggested_action)),
    )
}

pub fn not_found_error(error_code: &str, message: impl Into<String>, context: Value, suggested_action: &str) -> ErrorData {
    let message = message.into();
    ErrorData::resource_not_found(
        message.clone(),
        Some(build_error_data(error_code, "not_found", &message, context, false, suggested_action)),
    )
}

pub fn internal_error(error_code: &str, message: impl Into<String>, context: Value, retryable: bool, suggested_action: &str) -> ErrorData {
    let message = message.into();
    ErrorData::internal_error(
        message.clone(),
        Some(build_error_data(error_code, "internal", &message, context, retryable, suggested_action)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_data_carries_structured_fields() {
        let error = invalid_params_error(
            "WORKFLOW_ARGUMENTS_INVALID",
            "params must be a string map",
            serde_json::json!({ "tool": "Greet" }),
            "Pass params as an object of string values.",
        );
        let data = error.data.unwrap();
        assert_eq!(data["error_code"], "WORKFLOW_ARGUMENTS_INVALID");
        assert_eq!(data["category"], "validation");
        assert_eq!(data["retryable"], false);
        assert_eq!(data["context"]["tool"], "Greet");
        assert!(data["correlation_id"].as_str().unwrap().starts_with("wfgate-"));
    }

    #[test]
    fn internal_errors_may_be_retryable() {
        let error = internal_error("CACHE_CLEAR_FAILED", "disk I/O error", Value::Null, true, "Retry the request.");
        assert_eq!(error.data.unwrap()["retryable"], true);
    }
}
