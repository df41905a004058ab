//! Workflow engine adapter for the Temporal HTTP API.
//!
//! Starts executions with `POST /api/v1/namespaces/{ns}/workflows/{id}`, waits for results by
//! long-polling the close event of the run's history, and pages full histories with
//! `nextPageToken`. Payloads are exchanged in the API's JSON shorthand form.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use wfgate_types::ArgumentSet;

use super::{EngineError, ExecutionHandle, HistoryStream, StartRequest, WorkflowEngine};
use crate::history::{HISTORY_EVENT_TYPE, TemporalSchema, TypeResolver, decode_node};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for one long-poll; the server answers earlier with an empty page.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(90);
const CLOSE_EVENT_FILTER: &str = "HISTORY_EVENT_FILTER_TYPE_CLOSE_EVENT";

/// Connection settings for [`HttpWorkflowEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// `host:port` of the engine's HTTP frontend, or a full URL.
    pub host_port: String,
    pub namespace: String,
    pub use_tls: bool,
    pub request_timeout: Duration,
}

impl EngineSettings {
    pub fn base_url(&self) -> Result<Url, EngineError> {
        let raw = if self.host_port.contains("://") {
            self.host_port.clone()
        } else {
            let scheme = if self.use_tls { "https" } else { "http" };
            format!("{scheme}://{}", self.host_port)
        };
        let url = Url::parse(&raw).map_err(|error| EngineError::InvalidEndpoint(format!("{raw}: {error}")))?;
        if url.cannot_be_a_base() {
            return Err(EngineError::InvalidEndpoint(raw));
        }
        Ok(url)
    }
}

#[derive(Debug, Clone)]
pub struct HttpWorkflowEngine {
    http: Client,
    base_url: Url,
    namespace: String,
    request_timeout: Duration,
    resolver: Arc<dyn TypeResolver>,
}

impl HttpWorkflowEngine {
    pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(default_headers)
            .user_agent(format!("wfgate/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url()?,
            namespace: settings.namespace.clone(),
            request_timeout: settings.request_timeout,
            resolver: Arc::new(TemporalSchema),
        })
    }

    /// Builds the adapter and verifies the namespace is reachable.
    pub async fn connect(settings: &EngineSettings) -> Result<Self, EngineError> {
        let engine = Self::new(settings)?;
        engine.check_health().await?;
        info!(endpoint = %engine.base_url, namespace = %engine.namespace, "connected to workflow engine");
        Ok(engine)
    }

    pub async fn check_health(&self) -> Result<(), EngineError> {
        let url = self.namespace_url(&[])?;
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|error| EngineError::Unavailable(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Unavailable(format!("HTTP {}: {}", status.as_u16(), error_message(&body))))
    }

    fn namespace_url(&self, suffix: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "namespaces", self.namespace.as_str()])
            .extend(suffix);
        Ok(url)
    }

    fn workflow_url(&self, workflow_id: &str, suffix: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.namespace_url(&["workflows", workflow_id])?;
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidEndpoint(self.base_url.to_string()))?
            .extend(suffix);
        Ok(url)
    }

    async fn history_page(
        &self,
        workflow_id: &str,
        run_id: Option<&str>,
        page_token: &str,
        wait_for_close: bool,
    ) -> Result<HistoryPage, EngineError> {
        let url = self.workflow_url(workflow_id, &["history"])?;
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(run_id) = run_id
            && !run_id.is_empty()
        {
            query.push(("execution.runId", run_id));
        }
        if !page_token.is_empty() {
            query.push(("nextPageToken", page_token));
        }

        let mut builder = self.http.get(url).query(&query);
        builder = if wait_for_close {
            builder
                .query(&[("waitNewEvent", "true"), ("historyEventFilterType", CLOSE_EVENT_FILTER)])
                .timeout(LONG_POLL_TIMEOUT)
        } else {
            builder.timeout(self.request_timeout)
        };

        let response = send(builder).await?;
        let text = read_success(response, EngineError::InvalidResponse).await?;
        let page: HistoryResponse = serde_json::from_str(&text).map_err(|error| EngineError::InvalidResponse(error.to_string()))?;
        Ok(HistoryPage {
            events: page.history.map(|history| history.events).unwrap_or_default(),
            next_page_token: page.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn start_or_attach(&self, request: StartRequest) -> Result<ExecutionHandle, EngineError> {
        let workflow_id = request.identity.as_str();
        let url = self.workflow_url(workflow_id, &[])?;
        let body = StartWorkflowBody {
            workflow_type: NamedRef {
                name: &request.workflow_type,
            },
            task_queue: NamedRef { name: &request.task_queue },
            input: [&request.arguments],
            request_id: Uuid::new_v4().to_string(),
            workflow_id_reuse_policy: request.disposition.reuse_policy().as_engine_str(),
            workflow_id_conflict_policy: request.disposition.conflict_policy().as_engine_str(),
        };

        debug!(
            workflow = %request.workflow_type,
            workflow_id,
            task_queue = %request.task_queue,
            disposition = %request.disposition,
            "starting workflow"
        );
        let response = send(self.http.post(url).json(&body).timeout(self.request_timeout)).await?;
        let text = read_success(response, EngineError::StartRejected).await?;
        let started: StartWorkflowResponse = serde_json::from_str(&text).map_err(|error| EngineError::InvalidResponse(error.to_string()))?;
        if started.run_id.is_empty() {
            return Err(EngineError::InvalidResponse("start response did not include a run id".into()));
        }

        info!(workflow_id, run_id = %started.run_id, started = started.started.unwrap_or(true), "workflow started");
        Ok(ExecutionHandle {
            workflow_id: workflow_id.to_string(),
            run_id: started.run_id,
        })
    }

    async fn await_result(&self, handle: &ExecutionHandle) -> Result<String, EngineError> {
        let mut run_id = handle.run_id.clone();
        let mut page_token = String::new();
        loop {
            let page = self.history_page(&handle.workflow_id, Some(&run_id), &page_token, true).await?;
            let Some(event) = page.events.last() else {
                // Long poll expired without a close event.
                page_token = page.next_page_token.unwrap_or_default();
                continue;
            };
            match interpret_close_event(event)? {
                CloseOutcome::Completed(result) => return Ok(result),
                CloseOutcome::Failed(message) => return Err(EngineError::ExecutionFailed(message)),
                CloseOutcome::ContinuedAsNew(next_run_id) => {
                    debug!(workflow_id = %handle.workflow_id, from = %run_id, to = %next_run_id, "following continued-as-new run");
                    run_id = next_run_id;
                    page_token.clear();
                }
            }
        }
    }

    fn fetch_history(&self, workflow_id: &str, run_id: Option<&str>) -> HistoryStream {
        let engine = self.clone();
        let workflow_id = workflow_id.to_string();
        let run_id = run_id.map(str::to_string);
        let resolver = Arc::clone(&self.resolver);

        let pages = stream::try_unfold(Some(String::new()), move |page_token| {
            let engine = engine.clone();
            let workflow_id = workflow_id.clone();
            let run_id = run_id.clone();
            async move {
                let Some(page_token) = page_token else {
                    return Ok::<_, EngineError>(None);
                };
                let page = engine.history_page(&workflow_id, run_id.as_deref(), &page_token, false).await?;
                Ok(Some((page.events, page.next_page_token)))
            }
        });

        pages
            .map_ok(|events| stream::iter(events.into_iter().map(Ok::<Value, EngineError>)))
            .try_flatten()
            .map_ok(move |event| decode_node(resolver.as_ref(), HISTORY_EVENT_TYPE, &event))
            .boxed()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkflowBody<'a> {
    workflow_type: NamedRef<'a>,
    task_queue: NamedRef<'a>,
    input: [&'a ArgumentSet; 1],
    request_id: String,
    workflow_id_reuse_policy: &'static str,
    workflow_id_conflict_policy: &'static str,
}

#[derive(Serialize)]
struct NamedRef<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkflowResponse {
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    started: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    #[serde(default)]
    history: Option<HistoryEvents>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct HistoryEvents {
    #[serde(default)]
    events: Vec<Value>,
}

struct HistoryPage {
    events: Vec<Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, PartialEq)]
enum CloseOutcome {
    Completed(String),
    Failed(String),
    ContinuedAsNew(String),
}

async fn send(builder: RequestBuilder) -> Result<Response, EngineError> {
    builder.send().await.map_err(|error| {
        if error.is_connect() || error.is_timeout() {
            EngineError::Unavailable(error.to_string())
        } else {
            EngineError::Transport(error)
        }
    })
}

/// Returns the body of a successful response, or maps the status to an [`EngineError`].
async fn read_success(response: Response, rejected: fn(String) -> EngineError) -> Result<String, EngineError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        return Ok(text);
    }
    let message = error_message(&text);
    Err(match status {
        StatusCode::NOT_FOUND => EngineError::NotFound(message),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            EngineError::Unavailable(format!("HTTP {}: {message}", status.as_u16()))
        }
        _ => rejected(format!("HTTP {}: {message}", status.as_u16())),
    })
}

/// Extracts `message` from a status body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn interpret_close_event(event: &Value) -> Result<CloseOutcome, EngineError> {
    if let Some(attributes) = event.get("workflowExecutionCompletedEventAttributes") {
        return Ok(CloseOutcome::Completed(result_text(attributes.get("result"))));
    }
    if let Some(attributes) = event.get("workflowExecutionFailedEventAttributes") {
        return Ok(CloseOutcome::Failed(format!(
            "workflow execution error: {}",
            failure_message(attributes.get("failure"))
        )));
    }
    if event.get("workflowExecutionTimedOutEventAttributes").is_some() {
        return Ok(CloseOutcome::Failed("workflow execution timed out".into()));
    }
    if let Some(attributes) = event.get("workflowExecutionTerminatedEventAttributes") {
        let reason = attributes.get("reason").and_then(Value::as_str).unwrap_or_default();
        return Ok(CloseOutcome::Failed(format!("workflow execution terminated: {reason}")));
    }
    if event.get("workflowExecutionCanceledEventAttributes").is_some() {
        return Ok(CloseOutcome::Failed("workflow execution canceled".into()));
    }
    if let Some(attributes) = event.get("workflowExecutionContinuedAsNewEventAttributes") {
        let next_run_id = attributes.get("newExecutionRunId").and_then(Value::as_str).unwrap_or_default();
        if next_run_id.is_empty() {
            return Err(EngineError::InvalidResponse("continued-as-new event without a new run id".into()));
        }
        return Ok(CloseOutcome::ContinuedAsNew(next_run_id.to_string()));
    }

    let event_type = event.get("eventType").and_then(Value::as_str).unwrap_or("<missing>");
    Err(EngineError::InvalidResponse(format!("unexpected close event {event_type}")))
}

/// Renders a shorthand `result` payload list as the string the workflow returned.
fn result_text(result: Option<&Value>) -> String {
    let first = match result {
        Some(Value::Array(items)) => items.first(),
        Some(Value::Object(object)) => object.get("payloads").and_then(Value::as_array).and_then(|items| items.first()),
        other => other,
    };
    match first {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn failure_message(failure: Option<&Value>) -> String {
    let mut messages = Vec::new();
    let mut current = failure;
    while let Some(node) = current {
        if let Some(message) = node.get("message").and_then(Value::as_str)
            && !message.is_empty()
        {
            messages.push(message.to_string());
        }
        current = node.get("cause");
    }
    if messages.is_empty() { "unknown failure".to_string() } else { messages.join(": ") }
}
