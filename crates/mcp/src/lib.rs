//! Model Context Protocol (MCP) server that exposes Temporal workflows as tools.
//!
//! This crate wires the identity, policy, cache and redaction building blocks into an MCP surface:
//! YAML configuration loading and validation, one tool per configured workflow, the
//! `GetWorkflowHistory` and `ClearCache` built-ins, the `system_prompt` prompt, and a streamable
//! HTTP host.

pub mod config;
pub mod server;

pub use config::{ConfigError, GatewayConfig, WorkflowDef, default_config_path, load_config_from_path};
pub use server::{
    ClearCacheRequest, GatewayServices, GetWorkflowHistoryRequest, McpHttpServer, RunningMcpHttpServer, WfgateMcpCore,
    WorkflowToolRequest, resolve_bind_address,
};
