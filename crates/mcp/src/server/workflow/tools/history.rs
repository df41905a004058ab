//! `GetWorkflowHistory` tool.

use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use wfgate_engine::EngineError;

use crate::server::core::GatewayServices;
use crate::server::schemas::GetWorkflowHistoryRequest;

/// Failures rendered as the tool's textual result.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Error: Temporal client is not available for getting workflow histories")]
    EngineUnavailable,
    #[error("Error: Failed to get {index}th history event: {source}")]
    Event {
        index: usize,
        #[source]
        source: EngineError,
    },
}

/// Fetches every event of the requested run and returns them as a JSON array with payloads removed.
pub async fn get_workflow_history(services: &GatewayServices, request: &GetWorkflowHistoryRequest) -> Result<Value, HistoryError> {
    let Some(engine) = services.engine() else {
        warn!("workflow engine is not available for history retrieval");
        return Err(HistoryError::EngineUnavailable);
    };

    let run_id = request.run_id.as_deref().filter(|run_id| !run_id.trim().is_empty());
    let mut events = engine.fetch_history(&request.workflow_id, run_id);
    let mut redacted = Vec::new();
    while let Some(event) = events.next().await {
        match event {
            Ok(mut node) => {
                services.redactor().redact(&mut node);
                redacted.push(node.to_json());
            }
            Err(source) => {
                let error = HistoryError::Event {
                    index: redacted.len(),
                    source,
                };
                warn!(workflow_id = %request.workflow_id, "{error}");
                return Err(error);
            }
        }
    }

    debug!(workflow_id = %request.workflow_id, events = redacted.len(), "fetched workflow history");
    Ok(Value::Array(redacted))
}
