//! Boundary to the external workflow engine.
//!
//! The engine owns execution state. This crate only hands it an identity plus a disposition and
//! relays results and history back.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;
use wfgate_types::{ArgumentSet, Disposition, ExecutionIdentity, HistoryNode};

pub mod http;

pub use http::{EngineSettings, HttpWorkflowEngine};

/// Failures reported by a [`WorkflowEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be reached or refused service.
    #[error("workflow engine unavailable: {0}")]
    Unavailable(String),
    /// The engine rejected the start request.
    #[error("{0}")]
    StartRejected(String),
    /// The execution closed without completing successfully.
    #[error("{0}")]
    ExecutionFailed(String),
    #[error("workflow execution not found: {0}")]
    NotFound(String),
    #[error("unexpected response from workflow engine: {0}")]
    InvalidResponse(String),
    #[error("invalid workflow engine endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("workflow engine request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Everything the engine needs to start or attach to one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub identity: ExecutionIdentity,
    pub disposition: Disposition,
    pub task_queue: String,
    /// Workflow type; tools are named after the workflow they run.
    pub workflow_type: String,
    pub arguments: ArgumentSet,
}

/// Reference to a started (or attached) execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub workflow_id: String,
    pub run_id: String,
}

/// Paged history events, already decoded into typed trees.
pub type HistoryStream = BoxStream<'static, Result<HistoryNode, EngineError>>;

#[async_trait]
pub trait WorkflowEngine: Send + Sync + fmt::Debug {
    /// Starts a new execution or attaches to an existing one, as the disposition dictates.
    async fn start_or_attach(&self, request: StartRequest) -> Result<ExecutionHandle, EngineError>;

    /// Waits until the execution closes and returns its result.
    async fn await_result(&self, handle: &ExecutionHandle) -> Result<String, EngineError>;

    /// Streams the history of an execution; the latest run when `run_id` is `None`.
    fn fetch_history(&self, workflow_id: &str, run_id: Option<&str>) -> HistoryStream;
}
