//! Configuration validation.

use crate::config::{ConfigError, GatewayConfig};
use tracing::debug;
use wfgate_engine::IdentityTemplate;

/// Tools registered by the server itself; workflows may not reuse these names.
pub const RESERVED_TOOL_NAMES: [&str; 2] = ["GetWorkflowHistory", "ClearCache"];

/// Validate the entire configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.temporal.host_port.trim().is_empty() {
        return Err(ConfigError::MissingHostPort);
    }
    config.environment()?;
    config.workflow_timeout()?;
    config.cache_settings()?;
    config.redactor()?;

    for (name, workflow) in &config.workflows {
        validate_workflow_name(name)?;
        if let Some(recipe) = workflow.recipe() {
            IdentityTemplate::parse(recipe).map_err(|source| ConfigError::InvalidRecipe {
                workflow: name.clone(),
                source,
            })?;
        }
        debug!("Validated workflow configuration: {}", name);
    }
    Ok(())
}

/// Validate a workflow name.
pub fn validate_workflow_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::InvalidWorkflowName {
            name: name.to_string(),
            reason: "Workflow name cannot be empty".to_string(),
        });
    }

    if RESERVED_TOOL_NAMES.contains(&name) {
        return Err(ConfigError::InvalidWorkflowName {
            name: name.to_string(),
            reason: "Workflow name collides with a built-in tool".to_string(),
        });
    }

    Ok(())
}
