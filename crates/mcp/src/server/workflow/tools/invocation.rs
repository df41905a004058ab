//! Workflow tool invocation: validation, cache, identity, disposition, execution.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wfgate_engine::{EngineError, StartRequest, TemplateError, WorkflowEngine, select_disposition};
use wfgate_types::ArgumentSet;

use crate::server::core::GatewayServices;
use crate::server::schemas::WorkflowToolRequest;
use crate::server::workflow::catalog::WorkflowTool;
use crate::server::workflow::tools::cache::with_cache;

/// Reasons an invocation produced no workflow result. The display text is what the caller sees.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Error: No parameters provided for workflow {0}. Please provide required parameters.")]
    NoParameters(String),

    #[error("Error: Missing required parameters for workflow {workflow}: {}", .missing.join(", "))]
    MissingParameters { workflow: String, missing: Vec<String> },

    #[error("Error computing workflow ID from arguments: {0}")]
    Identity(#[source] TemplateError),

    #[error("Error: Temporal service is currently unavailable. Please try again later.")]
    EngineUnavailable,

    #[error("Error executing workflow: {0}")]
    Start(#[source] EngineError),

    #[error("Workflow failed: {0}")]
    Failed(#[source] EngineError),

    #[error("Workflow wait cancelled: {0}")]
    Cancelled(String),
}

/// Runs one workflow tool call.
///
/// A cached result is returned without consulting the engine, so cache hits are served even when
/// the engine is unreachable. `force_rerun` skips the lookup but the fresh result is still cached.
/// Only a completed execution is written to the cache.
pub async fn invoke_workflow(
    services: &GatewayServices,
    tool: &WorkflowTool,
    request: WorkflowToolRequest,
    cancellation: CancellationToken,
) -> Result<String, InvocationError> {
    let Some(params) = request.params else {
        return Err(InvocationError::NoParameters(tool.name().to_string()));
    };
    let missing = tool.missing_parameters(&params);
    if !missing.is_empty() {
        return Err(InvocationError::MissingParameters {
            workflow: tool.name().to_string(),
            missing,
        });
    }

    if !request.force_rerun {
        let lookup = {
            let tool_name = tool.name().to_string();
            let params = params.clone();
            with_cache(services.cache(), move |cache| cache.get(&tool_name, &params))
        };
        match lookup.await {
            Ok(Some(result)) => {
                info!(workflow = %tool.name(), "serving cached workflow result");
                return Ok(result);
            }
            Ok(None) => {}
            Err(error) => warn!(workflow = %tool.name(), %error, "cache lookup failed; treating as a miss"),
        }
    }

    let identity = tool.identity(&params).map_err(|error| {
        warn!(workflow = %tool.name(), %error, "failed to compute workflow ID");
        InvocationError::Identity(error)
    })?;

    let Some(engine) = services.engine() else {
        warn!(workflow = %tool.name(), "workflow engine is not available");
        return Err(InvocationError::EngineUnavailable);
    };

    let disposition = select_disposition(request.force_rerun);
    info!(
        workflow = %tool.name(),
        task_queue = %tool.task_queue(),
        identity = %identity,
        %disposition,
        "starting workflow"
    );
    let start = StartRequest {
        identity,
        disposition,
        task_queue: tool.task_queue().to_string(),
        workflow_type: tool.name().to_string(),
        arguments: params.clone(),
    };
    let result = run_to_completion(engine.as_ref(), start, services.workflow_timeout(), &cancellation).await?;
    info!(workflow = %tool.name(), "workflow completed successfully");

    store_result(services, tool.name(), params, result.clone()).await;
    Ok(result)
}

async fn run_to_completion(
    engine: &dyn WorkflowEngine,
    request: StartRequest,
    timeout: Option<Duration>,
    cancellation: &CancellationToken,
) -> Result<String, InvocationError> {
    let execution = async {
        let handle = engine.start_or_attach(request).await.map_err(InvocationError::Start)?;
        debug!(workflow_id = %handle.workflow_id, run_id = %handle.run_id, "workflow started");
        engine.await_result(&handle).await.map_err(InvocationError::Failed)
    };
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        outcome = execution => outcome,
        _ = cancellation.cancelled() => {
            warn!("workflow wait cancelled by the caller");
            Err(InvocationError::Cancelled("request cancelled".to_string()))
        }
        _ = deadline => {
            let reason = format!("timed out after {:?}", timeout.unwrap_or_default());
            warn!("workflow wait {reason}");
            Err(InvocationError::Cancelled(reason))
        }
    }
}

async fn store_result(services: &GatewayServices, tool_name: &str, params: ArgumentSet, result: String) {
    let write = {
        let tool_name = tool_name.to_string();
        with_cache(services.cache(), move |cache| cache.set(&tool_name, &params, &result))
    };
    if let Err(error) = write.await {
        warn!(workflow = %tool_name, %error, "failed to cache workflow result");
    }
}
