use crate::config::{ConfigError, GatewayConfig};
use crate::server::schemas::{ClearCacheRequest, GetWorkflowHistoryRequest, WorkflowToolRequest};
use crate::server::workflow::{
    catalog::WorkflowCatalog,
    errors::{internal_error, invalid_params_error},
    prompts::{get_prompt as get_system_prompt, list_prompts as list_system_prompts},
    tools::{clear_cache, get_workflow_history, invoke_workflow},
};
use rmcp::handler::server::tool::{ToolCallContext, ToolRouter};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, ErrorData as McpError, GetPromptRequestParams, GetPromptResult,
    Implementation, JsonObject, ListPromptsResult, ListToolsResult, PaginatedRequestParams, ProtocolVersion, ServerCapabilities,
    ServerInfo,
};
use rmcp::{RoleServer, ServerHandler, service::RequestContext, tool, tool_router};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wfgate_cache::ResultCache;
use wfgate_engine::{HistoryRedactor, WorkflowEngine};

const SERVER_INSTRUCTIONS: &str = concat!(
    "Each workflow tool takes {\"params\": {...}, \"force_rerun\": false}. Provide every required parameter. ",
    "Set force_rerun to true only when the user explicitly asks for a fresh run; ",
    "otherwise identical calls reuse the existing execution or a cached result.\n",
    "Use GetWorkflowHistory to inspect an execution and ClearCache to drop cached results. ",
    "Fetch the system_prompt prompt for per-workflow parameter details."
);

/// Shared services for MCP tool handlers.
#[derive(Debug)]
pub struct GatewayServices {
    catalog: WorkflowCatalog,
    engine: Option<Arc<dyn WorkflowEngine>>,
    cache: Arc<dyn ResultCache>,
    redactor: HistoryRedactor,
    workflow_timeout: Option<Duration>,
}

impl GatewayServices {
    /// Create services for `catalog`. Without an engine the server runs degraded: only cached
    /// results can be served.
    pub fn new(catalog: WorkflowCatalog, engine: Option<Arc<dyn WorkflowEngine>>, cache: Arc<dyn ResultCache>) -> Self {
        Self {
            catalog,
            engine,
            cache,
            redactor: HistoryRedactor::default(),
            workflow_timeout: None,
        }
    }

    /// Create services from a validated configuration.
    pub fn from_config(
        config: &GatewayConfig,
        engine: Option<Arc<dyn WorkflowEngine>>,
        cache: Arc<dyn ResultCache>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(WorkflowCatalog::from_config(config), engine, cache)
            .with_workflow_timeout(config.workflow_timeout()?)
            .with_redactor(config.redactor()?))
    }

    pub fn with_workflow_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.workflow_timeout = timeout;
        self
    }

    pub fn with_redactor(mut self, redactor: HistoryRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    pub fn engine(&self) -> Option<&Arc<dyn WorkflowEngine>> {
        self.engine.as_ref()
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    pub fn redactor(&self) -> &HistoryRedactor {
        &self.redactor
    }

    pub fn workflow_timeout(&self) -> Option<Duration> {
        self.workflow_timeout
    }
}

#[derive(Clone)]
pub struct WfgateMcpCore {
    tool_router: ToolRouter<Self>,
    services: Arc<GatewayServices>,
}

#[tool_router]
impl WfgateMcpCore {
    /// Create a new MCP core handler with shared service dependencies.
    pub fn new(services: Arc<GatewayServices>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            services,
        }
    }

    pub fn services(&self) -> &Arc<GatewayServices> {
        &self.services
    }

    #[tool(
        name = "GetWorkflowHistory",
        annotations(read_only_hint = true),
        description = "Gets the history of one workflow run. runId is optional; when omitted, the latest run of workflowId is used."
    )]
    async fn workflow_history(&self, param: Parameters<GetWorkflowHistoryRequest>) -> Result<CallToolResult, ErrorData> {
        if param.0.workflow_id.trim().is_empty() {
            return Err(invalid_params_error(
                "WORKFLOW_ID_REQUIRED",
                "workflowId is required",
                serde_json::json!({ "tool": "GetWorkflowHistory" }),
                "Provide the workflowId of the execution to inspect.",
            ));
        }
        let response = match get_workflow_history(&self.services, &param.0).await {
            Ok(events) => CallToolResult::success(vec![Content::text(events.to_string())]),
            Err(error) => CallToolResult::error(vec![Content::text(error.to_string())]),
        };
        debug!(tool = "GetWorkflowHistory", workflow_id = %param.0.workflow_id, "handled tool call");
        Ok(response)
    }

    #[tool(
        name = "ClearCache",
        annotations(destructive_hint = true, idempotent_hint = true),
        description = "Clears cached results for workflowName, or for all workflows when omitted. Returns the number of entries cleared."
    )]
    async fn clear_cached_results(&self, param: Parameters<ClearCacheRequest>) -> Result<CallToolResult, ErrorData> {
        let cleared = clear_cache(self.services.cache(), &param.0).await.map_err(|error| {
            internal_error(
                "CACHE_CLEAR_FAILED",
                error.to_string(),
                serde_json::json!({ "workflowName": param.0.workflow_name }),
                true,
                "Retry the request; check that the cache database is writable.",
            )
        })?;
        Ok(CallToolResult::structured(serde_json::json!({ "entries_cleared": cleared })))
    }

    async fn call_workflow_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let Some(tool) = self.services.catalog().get(name) else {
            return Err(invalid_params_error(
                "TOOL_NOT_FOUND",
                format!("tool '{name}' was not found"),
                serde_json::json!({ "name": name }),
                "Call tools/list to inspect available tools.",
            ));
        };
        let request: WorkflowToolRequest = match arguments {
            None => WorkflowToolRequest::default(),
            Some(arguments) => serde_json::from_value(Value::Object(arguments)).map_err(|error| {
                invalid_params_error(
                    "WORKFLOW_ARGUMENTS_INVALID",
                    format!("invalid arguments for workflow {name}: {error}"),
                    serde_json::json!({ "tool": name }),
                    "Pass params as an object of string values and force_rerun as a boolean.",
                )
            })?,
        };

        let response = match invoke_workflow(&self.services, tool, request, context.ct.clone()).await {
            Ok(result) => CallToolResult::success(vec![Content::text(result)]),
            Err(error) => CallToolResult::error(vec![Content::text(error.to_string())]),
        };
        debug!(tool = %name, is_error = ?response.is_error, "handled tool call");
        Ok(response)
    }
}

impl ServerHandler for WfgateMcpCore {
    async fn call_tool(&self, request: CallToolRequestParams, context: RequestContext<RoleServer>) -> Result<CallToolResult, McpError> {
        if self.services.catalog().get(&request.name).is_some() {
            return self.call_workflow_tool(&request.name, request.arguments, context).await;
        }
        self.tool_router.call(ToolCallContext::new(self, request, context)).await
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let mut tools = self.services.catalog().tools();
        tools.extend(self.tool_router.list_all());
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(list_system_prompts()))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        std::future::ready(get_system_prompt(&request.name, self.services.catalog()))
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().enable_prompts().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "wfgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Temporal workflow MCP".to_string()),
                ..Default::default()
            },
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }
}
