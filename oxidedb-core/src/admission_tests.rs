//! End-to-end admission scenarios for the aggregate command.
//!
//! Drives the full dispatch chain (lookup, authorization, parsing,
//! collation gate, execution) with a recording executor so tests can
//! assert the executor is observably never reached on a rejection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::auth::{AllowAllAuthorizer, AuthorizationSession};
use crate::commands::{dispatch, dispatch_explain, Command, CommandRegistry, ReadWriteType};
use crate::compatibility::CompatibilityVersion;
use crate::context::OperationContext;
use crate::error::{OxideError, Result};
use crate::executor::AggregationExecutor;
use crate::namespace::NamespaceString;
use crate::pipeline_command::{PipelineCommand, COLLATION_COMPATIBILITY_MSG};
use crate::request::{AggregationRequest, Verbosity};

/// Executor double that records every invocation.
struct RecordingExecutor {
    calls: AtomicUsize,
    last_request: Mutex<Option<AggregationRequest>>,
}

impl RecordingExecutor {
    fn new() -> Arc<Self> {
        Arc::new(RecordingExecutor {
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<AggregationRequest> {
        self.last_request.lock().clone()
    }
}

impl AggregationExecutor for RecordingExecutor {
    fn execute(
        &self,
        _opctx: &OperationContext,
        nss: &NamespaceString,
        request: &AggregationRequest,
        _raw_cmd: &Value,
        out: &mut Map<String, Value>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        if request.explain().is_some() {
            out.insert("stages".to_string(), json!(request.pipeline()));
        } else {
            out.insert(
                "cursor".to_string(),
                json!({"id": 0, "ns": nss.full_name(), "firstBatch": []}),
            );
        }
        Ok(())
    }
}

/// Executor double that always fails.
struct FailingExecutor;

impl AggregationExecutor for FailingExecutor {
    fn execute(
        &self,
        _opctx: &OperationContext,
        _nss: &NamespaceString,
        _request: &AggregationRequest,
        _raw_cmd: &Value,
        _out: &mut Map<String, Value>,
    ) -> Result<()> {
        Err(OxideError::ExecutionFailed(
            "PlanExecutor killed during yield".to_string(),
        ))
    }
}

/// Session that denies every aggregate.
struct DenyAllAuthorizer;

impl AuthorizationSession for DenyAllAuthorizer {
    fn check_auth_for_aggregate(&self, nss: &NamespaceString, _cmd: &Value) -> Result<()> {
        Err(OxideError::Unauthorized(nss.full_name()))
    }
}

fn registry_with(
    executor: Arc<dyn AggregationExecutor>,
    version: CompatibilityVersion,
) -> CommandRegistry {
    let registry = CommandRegistry::new();
    registry.register(Arc::new(PipelineCommand::with_version_source(
        executor,
        move || version,
    )));
    registry
}

fn run_cmd(
    registry: &CommandRegistry,
    session: &dyn AuthorizationSession,
    cmd: Value,
) -> Map<String, Value> {
    dispatch(&OperationContext::new(), session, registry, "test", &cmd)
}

#[test]
fn test_run_reaches_executor_and_reports_ok() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V2);

    let result = run_cmd(
        &registry,
        &AllowAllAuthorizer,
        json!({
            "aggregate": "orders",
            "pipeline": [{"$match": {"status": "open"}}, {"$limit": 5}],
            "cursor": {"batchSize": 2}
        }),
    );

    assert_eq!(result.get("ok"), Some(&json!(1.0)));
    assert!(result.get("cursor").is_some());
    assert_eq!(executor.calls(), 1);

    let request = executor.last_request().unwrap();
    assert_eq!(request.nss().full_name(), "test.orders");
    assert_eq!(request.pipeline().len(), 2);
    assert!(request.pipeline()[0].get("$match").is_some());
    assert_eq!(request.batch_size(), Some(2));
    assert_eq!(request.explain(), None);
}

#[test]
fn test_unauthorized_run_never_reaches_executor() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V2);

    let result = run_cmd(
        &registry,
        &DenyAllAuthorizer,
        json!({"aggregate": "orders", "pipeline": []}),
    );

    assert_eq!(result.get("ok"), Some(&json!(0.0)));
    assert_eq!(result.get("code"), Some(&json!(13)));
    assert_eq!(executor.calls(), 0);
}

#[test]
fn test_unauthorized_explain_never_reaches_executor() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V2);

    let mut out = Map::new();
    let err = dispatch_explain(
        &OperationContext::new(),
        &DenyAllAuthorizer,
        &registry,
        "test",
        &json!({"aggregate": "orders", "pipeline": []}),
        Verbosity::QueryPlanner,
        &mut out,
    )
    .unwrap_err();

    assert!(matches!(err, OxideError::Unauthorized(_)));
    assert_eq!(executor.calls(), 0);
}

#[test]
fn test_legacy_version_rejects_collation_before_execution() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V1);

    let result = run_cmd(
        &registry,
        &AllowAllAuthorizer,
        json!({
            "aggregate": "coll",
            "pipeline": [{"$match": {"a": 1}}],
            "collation": {"locale": "en"}
        }),
    );

    assert_eq!(result.get("ok"), Some(&json!(0.0)));
    assert_eq!(result.get("code"), Some(&json!(72)));
    assert_eq!(
        result.get("errmsg"),
        Some(&json!(COLLATION_COMPATIBILITY_MSG))
    );
    assert_eq!(executor.calls(), 0);
}

#[test]
fn test_legacy_version_admits_merge_pipeline_with_collation() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V1);

    let result = run_cmd(
        &registry,
        &AllowAllAuthorizer,
        json!({
            "aggregate": "coll",
            "pipeline": [
                {"$mergeCursors": {"cursors": [{"host": "shard1:27017", "id": 12}]}},
                {"$match": {"a": 1}}
            ],
            "collation": {"locale": "en"}
        }),
    );

    assert_eq!(result.get("ok"), Some(&json!(1.0)));
    assert_eq!(executor.calls(), 1);
    let request = executor.last_request().unwrap();
    assert_eq!(request.collation().get("locale"), Some(&json!("en")));
}

#[test]
fn test_legacy_version_without_collation_passes() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V1);

    let result = run_cmd(
        &registry,
        &AllowAllAuthorizer,
        json!({"aggregate": "orders", "pipeline": [{"$match": {"a": 1}}]}),
    );

    assert_eq!(result.get("ok"), Some(&json!(1.0)));
    assert_eq!(executor.calls(), 1);
}

#[test]
fn test_parse_failure_short_circuits() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V2);

    // Unknown top-level option
    let result = run_cmd(
        &registry,
        &AllowAllAuthorizer,
        json!({"aggregate": "orders", "pipeline": [], "shuffle": true}),
    );
    assert_eq!(result.get("ok"), Some(&json!(0.0)));
    assert_eq!(result.get("code"), Some(&json!(9)));

    // Missing collection identifier
    let result = run_cmd(&registry, &AllowAllAuthorizer, json!({"aggregate": 1.5}));
    assert_eq!(result.get("code"), Some(&json!(14)));

    assert_eq!(executor.calls(), 0);
}

#[test]
fn test_explain_carries_verbosity_to_executor() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V2);

    let mut out = Map::new();
    dispatch_explain(
        &OperationContext::new(),
        &AllowAllAuthorizer,
        &registry,
        "test",
        &json!({"aggregate": "orders", "pipeline": [{"$match": {"a": 1}}]}),
        Verbosity::ExecutionStats,
        &mut out,
    )
    .unwrap();

    assert_eq!(executor.calls(), 1);
    assert!(out.get("stages").is_some());
    let request = executor.last_request().unwrap();
    assert_eq!(request.explain(), Some(Verbosity::ExecutionStats));
}

#[test]
fn test_executor_failure_propagates_unchanged() {
    let registry = registry_with(Arc::new(FailingExecutor), CompatibilityVersion::V2);

    let result = run_cmd(
        &registry,
        &AllowAllAuthorizer,
        json!({"aggregate": "orders", "pipeline": []}),
    );

    assert_eq!(result.get("ok"), Some(&json!(0.0)));
    assert_eq!(result.get("code"), Some(&json!(96)));
    assert!(result
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap()
        .contains("PlanExecutor"));
}

#[test]
fn test_killed_operation_never_reaches_executor() {
    let executor = RecordingExecutor::new();
    let registry = registry_with(executor.clone(), CompatibilityVersion::V2);

    let opctx = OperationContext::new();
    opctx.kill();
    let result = dispatch(
        &opctx,
        &AllowAllAuthorizer,
        &registry,
        "test",
        &json!({"aggregate": "orders", "pipeline": []}),
    );

    assert_eq!(result.get("ok"), Some(&json!(0.0)));
    assert_eq!(executor.calls(), 0);
}

#[test]
fn test_command_descriptor_flags() {
    let command = PipelineCommand::new(RecordingExecutor::new());
    assert_eq!(command.name(), "aggregate");
    assert!(!command.allowed_on_secondary());
    assert!(command.secondary_override_ok());
    assert!(command.supports_read_concern());
    assert_eq!(command.read_write_type(), ReadWriteType::Read);
    assert!(!command.help().is_empty());
}
