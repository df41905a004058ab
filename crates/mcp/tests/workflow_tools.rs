use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wfgate_cache::{CacheError, DisabledResultCache, ResultCache, SqliteResultCache};
use wfgate_engine::{EngineError, ExecutionHandle, HistoryStream, StartRequest, WorkflowEngine};
use wfgate_mcp::config::parse_config;
use wfgate_mcp::server::workflow::catalog::WorkflowCatalog;
use wfgate_mcp::server::workflow::tools::{HistoryError, InvocationError, clear_cache, get_workflow_history, invoke_workflow};
use wfgate_mcp::{ClearCacheRequest, GatewayServices, GetWorkflowHistoryRequest, WorkflowToolRequest};
use wfgate_types::{ArgumentSet, Disposition, FieldValue, HistoryNode};

const CONFIG: &str = r#"
temporal:
  hostPort: localhost:7233
  defaultTaskQueue: default-queue
workflows:
  LookupOrder:
    purpose: Looks up an order.
    workflowIDRecipe: "order_{{ .order_id }}"
    taskQueue: orders
    input:
      type: LookupRequest
      fields:
        - order_id: The order identifier
        - note: Optional free text
  Summarize:
    purpose: Summarizes a document.
    workflowIDRecipe: "summary_{{ hash . }}"
    input:
      type: SummaryRequest
      fields:
        - document: Document text
  Broken:
    purpose: Has a bad recipe.
    workflowIDRecipe: "broken_{{ nope }}"
"#;

#[derive(Debug, Clone)]
enum Outcome {
    Complete(String),
    RejectStart(String),
    Fail(String),
    Hang,
}

#[derive(Debug, Clone)]
enum HistoryItem {
    Event(HistoryNode),
    Error(String),
}

#[derive(Debug)]
struct FakeEngine {
    outcome: Outcome,
    history: Vec<HistoryItem>,
    starts: Mutex<Vec<StartRequest>>,
}

impl FakeEngine {
    fn completing(result: &str) -> Self {
        Self::with_outcome(Outcome::Complete(result.to_string()))
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            outcome,
            history: Vec::new(),
            starts: Mutex::new(Vec::new()),
        }
    }

    fn with_history(history: Vec<HistoryItem>) -> Self {
        Self {
            history,
            ..Self::completing("")
        }
    }

    fn starts(&self) -> Vec<StartRequest> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowEngine for FakeEngine {
    async fn start_or_attach(&self, request: StartRequest) -> Result<ExecutionHandle, EngineError> {
        let workflow_id = request.identity.to_string();
        self.starts.lock().unwrap().push(request);
        if let Outcome::RejectStart(message) = &self.outcome {
            return Err(EngineError::StartRejected(message.clone()));
        }
        Ok(ExecutionHandle {
            workflow_id,
            run_id: "run-1".to_string(),
        })
    }

    async fn await_result(&self, _handle: &ExecutionHandle) -> Result<String, EngineError> {
        match &self.outcome {
            Outcome::Complete(result) => Ok(result.clone()),
            Outcome::Fail(message) => Err(EngineError::ExecutionFailed(message.clone())),
            Outcome::RejectStart(message) => Err(EngineError::StartRejected(message.clone())),
            Outcome::Hang => std::future::pending().await,
        }
    }

    fn fetch_history(&self, _workflow_id: &str, _run_id: Option<&str>) -> HistoryStream {
        let items: Vec<Result<HistoryNode, EngineError>> = self
            .history
            .iter()
            .map(|item| match item {
                HistoryItem::Event(node) => Ok(node.clone()),
                HistoryItem::Error(message) => Err(EngineError::Unavailable(message.clone())),
            })
            .collect();
        futures_util::stream::iter(items).boxed()
    }
}

/// Cache whose every operation fails.
#[derive(Debug, Default)]
struct FailingCache {
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl ResultCache for FailingCache {
    fn get(&self, _tool_name: &str, _args: &ArgumentSet) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Poisoned)
    }

    fn set(&self, _tool_name: &str, _args: &ArgumentSet, _result: &str) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Poisoned)
    }

    fn clear(&self, _tool_name: &str) -> Result<u64, CacheError> {
        Err(CacheError::Poisoned)
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        Err(CacheError::Poisoned)
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Cache whose lookups hold the calling thread, like a database waiting on its lock.
#[derive(Debug)]
struct SlowCache {
    delay: Duration,
}

impl ResultCache for SlowCache {
    fn get(&self, _tool_name: &str, _args: &ArgumentSet) -> Result<Option<String>, CacheError> {
        std::thread::sleep(self.delay);
        Ok(None)
    }

    fn set(&self, _tool_name: &str, _args: &ArgumentSet, _result: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self, _tool_name: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        Ok(0)
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

fn services_with_cache(engine: Arc<FakeEngine>, cache: Arc<dyn ResultCache>) -> GatewayServices {
    let config = parse_config(CONFIG).unwrap();
    GatewayServices::new(
        WorkflowCatalog::from_config(&config),
        Some(engine as Arc<dyn WorkflowEngine>),
        cache,
    )
}

struct Fixture {
    services: GatewayServices,
    engine: Arc<FakeEngine>,
    cache: Arc<SqliteResultCache>,
    _dir: tempfile::TempDir,
}

fn fixture(engine: FakeEngine) -> Fixture {
    let config = parse_config(CONFIG).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SqliteResultCache::open(&dir.path().join("cache.db"), Duration::from_secs(3600), 0).unwrap());
    let engine = Arc::new(engine);
    let services = GatewayServices::new(
        WorkflowCatalog::from_config(&config),
        Some(engine.clone() as Arc<dyn WorkflowEngine>),
        cache.clone() as Arc<dyn ResultCache>,
    );
    Fixture {
        services,
        engine,
        cache,
        _dir: dir,
    }
}

fn args(pairs: &[(&str, &str)]) -> ArgumentSet {
    pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
}

fn request(pairs: &[(&str, &str)], force_rerun: bool) -> WorkflowToolRequest {
    WorkflowToolRequest {
        params: Some(args(pairs)),
        force_rerun,
    }
}

async fn invoke(fixture: &Fixture, tool: &str, request: WorkflowToolRequest) -> Result<String, InvocationError> {
    let tool = fixture.services.catalog().get(tool).unwrap();
    invoke_workflow(&fixture.services, tool, request, CancellationToken::new()).await
}

#[tokio::test]
async fn first_call_starts_workflow_and_caches_result() {
    let fixture = fixture(FakeEngine::completing("order 7 shipped"));

    let result = invoke(&fixture, "LookupOrder", request(&[("order_id", "7")], false)).await.unwrap();
    assert_eq!(result, "order 7 shipped");

    let starts = fixture.engine.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].identity.as_str(), "order_7");
    assert_eq!(starts[0].disposition, Disposition::AttachOrStart);
    assert_eq!(starts[0].task_queue, "orders");
    assert_eq!(starts[0].workflow_type, "LookupOrder");
    assert_eq!(starts[0].arguments, args(&[("order_id", "7")]));

    assert_eq!(
        fixture.cache.get("LookupOrder", &args(&[("order_id", "7")])).unwrap().as_deref(),
        Some("order 7 shipped")
    );
}

#[tokio::test]
async fn cache_hit_skips_the_engine() {
    let fixture = fixture(FakeEngine::completing("fresh"));
    fixture.cache.set("LookupOrder", &args(&[("order_id", "7")]), "cached").unwrap();

    let result = invoke(&fixture, "LookupOrder", request(&[("order_id", "7")], false)).await.unwrap();
    assert_eq!(result, "cached");
    assert!(fixture.engine.starts().is_empty());
}

#[tokio::test]
async fn cache_hit_is_served_without_an_engine() {
    let config = parse_config(CONFIG).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SqliteResultCache::open(&dir.path().join("cache.db"), Duration::from_secs(3600), 0).unwrap());
    cache.set("LookupOrder", &args(&[("order_id", "7")]), "cached").unwrap();
    let services = GatewayServices::new(WorkflowCatalog::from_config(&config), None, cache);
    let tool = services.catalog().get("LookupOrder").unwrap();

    let hit = invoke_workflow(&services, tool, request(&[("order_id", "7")], false), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hit, "cached");

    let miss = invoke_workflow(&services, tool, request(&[("order_id", "8")], false), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        miss.to_string(),
        "Error: Temporal service is currently unavailable. Please try again later."
    );
}

#[tokio::test]
async fn force_rerun_bypasses_cache_and_refreshes_it() {
    let fixture = fixture(FakeEngine::completing("fresh"));
    fixture.cache.set("LookupOrder", &args(&[("order_id", "7")]), "stale").unwrap();

    let result = invoke(&fixture, "LookupOrder", request(&[("order_id", "7")], true)).await.unwrap();
    assert_eq!(result, "fresh");

    let starts = fixture.engine.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].disposition, Disposition::ForceNew);
    assert_eq!(
        fixture.cache.get("LookupOrder", &args(&[("order_id", "7")])).unwrap().as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn identity_is_stable_across_argument_order() {
    let fixture = fixture(FakeEngine::completing("ok"));

    invoke(&fixture, "Summarize", request(&[("document", "abc")], true)).await.unwrap();
    invoke(&fixture, "Summarize", request(&[("document", "abc")], true)).await.unwrap();

    let starts = fixture.engine.starts();
    assert_eq!(starts.len(), 2);
    assert_eq!(starts[0].identity, starts[1].identity);
    assert!(starts[0].identity.as_str().starts_with("summary_"));
    assert_eq!(starts[0].task_queue, "default-queue");
}

#[tokio::test]
async fn missing_params_object_is_reported() {
    let fixture = fixture(FakeEngine::completing("ok"));
    let error = invoke(&fixture, "LookupOrder", WorkflowToolRequest::default()).await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Error: No parameters provided for workflow LookupOrder. Please provide required parameters."
    );
}

#[tokio::test]
async fn empty_required_params_are_reported() {
    let fixture = fixture(FakeEngine::completing("ok"));
    let error = invoke(&fixture, "LookupOrder", request(&[("order_id", ""), ("note", "hi")], false))
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Error: Missing required parameters for workflow LookupOrder: order_id");
    assert!(fixture.engine.starts().is_empty());
}

#[tokio::test]
async fn broken_recipe_fails_only_that_call() {
    let fixture = fixture(FakeEngine::completing("ok"));
    let error = invoke(&fixture, "Broken", request(&[], false)).await.unwrap_err();
    assert!(error.to_string().starts_with("Error computing workflow ID from arguments: template:"));
    assert!(fixture.engine.starts().is_empty());

    assert!(invoke(&fixture, "LookupOrder", request(&[("order_id", "1")], false)).await.is_ok());
}

#[tokio::test]
async fn start_rejection_is_reported_and_not_cached() {
    let fixture = fixture(FakeEngine::with_outcome(Outcome::RejectStart("task queue is not set".to_string())));
    let error = invoke(&fixture, "LookupOrder", request(&[("order_id", "7")], false)).await.unwrap_err();
    assert_eq!(error.to_string(), "Error executing workflow: task queue is not set");
    assert!(fixture.cache.is_empty().unwrap());
}

#[tokio::test]
async fn execution_failure_is_reported_and_not_cached() {
    let fixture = fixture(FakeEngine::with_outcome(Outcome::Fail("activity timed out".to_string())));
    let error = invoke(&fixture, "LookupOrder", request(&[("order_id", "7")], false)).await.unwrap_err();
    assert_eq!(error.to_string(), "Workflow failed: activity timed out");
    assert!(fixture.cache.is_empty().unwrap());
}

#[tokio::test]
async fn cancelled_wait_writes_nothing() {
    let fixture = fixture(FakeEngine::with_outcome(Outcome::Hang));
    let tool = fixture.services.catalog().get("LookupOrder").unwrap();
    let cancellation = CancellationToken::new();

    let canceller = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancellation.cancel();
        })
    };
    let error = invoke_workflow(&fixture.services, tool, request(&[("order_id", "7")], false), cancellation)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(error.to_string(), "Workflow wait cancelled: request cancelled");
    assert!(fixture.cache.is_empty().unwrap());
}

#[tokio::test]
async fn configured_timeout_bounds_the_wait() {
    let Fixture {
        services,
        cache,
        _dir,
        ..
    } = fixture(FakeEngine::with_outcome(Outcome::Hang));
    let services = services.with_workflow_timeout(Some(Duration::from_millis(30)));
    let tool = services.catalog().get("LookupOrder").unwrap();

    let error = invoke_workflow(&services, tool, request(&[("order_id", "7")], false), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error, InvocationError::Cancelled(ref reason) if reason.starts_with("timed out after")));
    assert!(cache.is_empty().unwrap());
}

#[tokio::test]
async fn disabled_cache_always_executes() {
    let config = parse_config(CONFIG).unwrap();
    let engine = Arc::new(FakeEngine::completing("ok"));
    let services = GatewayServices::new(
        WorkflowCatalog::from_config(&config),
        Some(engine.clone() as Arc<dyn WorkflowEngine>),
        Arc::new(DisabledResultCache),
    );
    let tool = services.catalog().get("LookupOrder").unwrap();

    for _ in 0..2 {
        invoke_workflow(&services, tool, request(&[("order_id", "7")], false), CancellationToken::new())
            .await
            .unwrap();
    }
    assert_eq!(engine.starts().len(), 2);
}

#[tokio::test]
async fn clear_cache_without_name_removes_every_workflow() {
    let fixture = fixture(FakeEngine::completing("ok"));
    invoke(&fixture, "LookupOrder", request(&[("order_id", "1")], false)).await.unwrap();
    invoke(&fixture, "LookupOrder", request(&[("order_id", "2")], false)).await.unwrap();
    invoke(&fixture, "Summarize", request(&[("document", "abc")], false)).await.unwrap();

    let cleared = clear_cache(fixture.services.cache(), &ClearCacheRequest::default()).await.unwrap();
    assert_eq!(cleared, 3);
    assert!(fixture.cache.is_empty().unwrap());
}

fn scheduled_event(event_id: i64) -> HistoryNode {
    let payloads = FieldValue::List {
        element_type: "temporal.api.common.v1.Payload".to_string(),
        items: vec![HistoryNode::verbatim("temporal.api.common.v1.Payload", json!({ "data": "aGVsbG8=" }))],
    };
    let attributes = HistoryNode::new("temporal.api.history.v1.ActivityTaskScheduledEventAttributes")
        .with_field("activityId", FieldValue::Scalar(json!("1")))
        .with_field(
            "input",
            FieldValue::Node(HistoryNode::new("temporal.api.common.v1.Payloads").with_field("payloads", payloads)),
        );
    HistoryNode::new("temporal.api.history.v1.HistoryEvent")
        .with_field("eventId", FieldValue::Scalar(json!(event_id.to_string())))
        .with_field("activityTaskScheduledEventAttributes", FieldValue::Node(attributes))
}

#[tokio::test]
async fn history_is_returned_redacted() {
    let fixture = fixture(FakeEngine::with_history(vec![
        HistoryItem::Event(scheduled_event(1)),
        HistoryItem::Event(scheduled_event(2)),
    ]));
    let request = GetWorkflowHistoryRequest {
        workflow_id: "order_7".to_string(),
        run_id: None,
    };

    let events = get_workflow_history(&fixture.services, &request).await.unwrap();
    assert_eq!(
        events,
        json!([
            { "eventId": "1", "activityTaskScheduledEventAttributes": { "activityId": "1" } },
            { "eventId": "2", "activityTaskScheduledEventAttributes": { "activityId": "1" } },
        ])
    );
}

#[tokio::test]
async fn history_failure_names_the_event_index() {
    let fixture = fixture(FakeEngine::with_history(vec![
        HistoryItem::Event(scheduled_event(1)),
        HistoryItem::Error("connection reset".to_string()),
    ]));
    let request = GetWorkflowHistoryRequest {
        workflow_id: "order_7".to_string(),
        run_id: Some("run-1".to_string()),
    };

    let error = get_workflow_history(&fixture.services, &request).await.unwrap_err();
    assert!(matches!(error, HistoryError::Event { index: 1, .. }));
    assert_eq!(
        error.to_string(),
        "Error: Failed to get 1th history event: workflow engine unavailable: connection reset"
    );
}

#[tokio::test]
async fn history_without_engine_is_reported() {
    let config = parse_config(CONFIG).unwrap();
    let services = GatewayServices::new(WorkflowCatalog::from_config(&config), None, Arc::new(DisabledResultCache));
    let request = GetWorkflowHistoryRequest {
        workflow_id: "order_7".to_string(),
        run_id: None,
    };
    let error = get_workflow_history(&services, &request).await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Error: Temporal client is not available for getting workflow histories"
    );
}

#[tokio::test]
async fn cache_errors_count_as_misses_and_do_not_block_completion() {
    let engine = Arc::new(FakeEngine::completing("ok"));
    let cache = Arc::new(FailingCache::default());
    let services = services_with_cache(engine.clone(), cache.clone());
    let tool = services.catalog().get("LookupOrder").unwrap();

    let result = invoke_workflow(&services, tool, request(&[("order_id", "7")], false), CancellationToken::new()).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(engine.starts().len(), 1);
    assert_eq!(cache.gets.load(Ordering::SeqCst), 1);
    assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_cache_lookups_leave_the_runtime_free() {
    let engine = Arc::new(FakeEngine::completing("ok"));
    let services = services_with_cache(engine, Arc::new(SlowCache { delay: Duration::from_millis(300) }));
    let tool = services.catalog().get("LookupOrder").unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = Arc::clone(&ticks);
        async move {
            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                interval.tick().await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    });
    tokio::task::yield_now().await;

    let before = ticks.load(Ordering::SeqCst);
    let started = Instant::now();
    let result = invoke_workflow(&services, tool, request(&[("order_id", "7")], false), CancellationToken::new()).await;
    let elapsed = started.elapsed();
    let during = ticks.load(Ordering::SeqCst) - before;
    ticker.abort();

    assert_eq!(result.unwrap(), "ok");
    assert!(elapsed >= Duration::from_millis(300));
    assert!(during >= 5, "runtime stalled during the cache lookup: {during} ticks in {elapsed:?}");
}

#[tokio::test]
async fn configured_payload_suffixes_drive_history_redaction() {
    let yaml = format!("{CONFIG}history:\n  payloadTypeSuffixes: [\".Blob\"]\n");
    let config = parse_config(&yaml).unwrap();
    let event = HistoryNode::new("temporal.api.history.v1.HistoryEvent")
        .with_field("eventId", FieldValue::Scalar(json!("1")))
        .with_field("attachment", FieldValue::Node(HistoryNode::new("acme.v1.Blob")))
        .with_field(
            "input",
            FieldValue::Node(HistoryNode::verbatim("temporal.api.common.v1.Payloads", json!(["kept"]))),
        );
    let engine = Arc::new(FakeEngine::with_history(vec![HistoryItem::Event(event)]));
    let services = GatewayServices::from_config(&config, Some(engine as Arc<dyn WorkflowEngine>), Arc::new(DisabledResultCache)).unwrap();
    let request = GetWorkflowHistoryRequest {
        workflow_id: "order_7".to_string(),
        run_id: None,
    };

    let events = get_workflow_history(&services, &request).await.unwrap();
    assert_eq!(events, json!([{ "eventId": "1", "input": ["kept"] }]));
}
