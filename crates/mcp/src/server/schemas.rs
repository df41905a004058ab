use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wfgate_types::ArgumentSet;

/// Arguments accepted by every workflow tool.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowToolRequest {
    /// Workflow parameters; `None` when the caller sent no `params` object at all.
    #[serde(default)]
    pub params: Option<ArgumentSet>,
    #[serde(default)]
    pub force_rerun: bool,
}

/// Parameters for history retrieval.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetWorkflowHistoryRequest {
    #[schemars(description = "Workflow ID whose history should be fetched.")]
    pub workflow_id: String,
    /// Specific run; the latest run of the workflow when omitted.
    #[schemars(description = "Optional run ID. When omitted, the history of the latest run is returned.")]
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Parameters for cache invalidation.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheRequest {
    #[schemars(description = "Optional workflow name. When omitted, cached results of every workflow are cleared.")]
    #[serde(default)]
    pub workflow_name: Option<String>,
}
