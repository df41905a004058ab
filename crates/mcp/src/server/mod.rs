mod core;
mod http;
mod schemas;
pub mod workflow;

pub use self::core::{GatewayServices, WfgateMcpCore};
pub use self::http::{MCP_ENDPOINT_PATH, McpHttpServer, RunningMcpHttpServer, resolve_bind_address};
pub use self::schemas::{ClearCacheRequest, GetWorkflowHistoryRequest, WorkflowToolRequest};
