// oxidedb-core/src/pipeline_command.rs
// The `aggregate` command: admission, validation, routing to execution

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth::AuthorizationSession;
use crate::commands::{Command, ReadWriteType};
use crate::compatibility::{compatibility_version, CompatibilityVersion};
use crate::context::OperationContext;
use crate::error::{OxideError, Result};
use crate::executor::AggregationExecutor;
use crate::namespace::NamespaceString;
use crate::request::{AggregationRequest, Verbosity};

/// True iff the pipeline's first stage carries the router's
/// `$mergeCursors` marker.
///
/// A merge pipeline is issued by the routing tier to a backend to
/// combine already-computed per-shard results. Only the first stage is
/// inspected; only the router is trusted to have applied user-facing
/// restrictions upstream.
pub fn is_merge_pipeline(pipeline: &[Value]) -> bool {
    match pipeline.first() {
        Some(Value::Object(stage)) => stage.contains_key("$mergeCursors"),
        _ => false,
    }
}

/// Whether an aggregate invocation honors a write concern: only when
/// the pipeline ends in a writing stage (`$out`).
pub fn agg_supports_write_concern(cmd: &Value) -> bool {
    cmd.get("pipeline")
        .and_then(Value::as_array)
        .and_then(|stages| stages.last())
        .and_then(Value::as_object)
        .map(|stage| stage.contains_key("$out"))
        .unwrap_or(false)
}

pub const COLLATION_COMPATIBILITY_MSG: &str =
    "The compatibility version must be 2 to use a collation; \
     upgrade all cluster members and retry";

/// Version gate on per-request collations.
///
/// At compatibility version 1, not every cluster member understands
/// collation, so end users may not supply one. The router attaches the
/// collection default collation to merge pipelines on the user's
/// behalf (it may not hold the collection metadata), so merge requests
/// stay exempt; backends honor or reject those per their own rules.
pub fn check_collation_compatibility(
    request: &AggregationRequest,
    version: CompatibilityVersion,
) -> Result<()> {
    if request.collation().is_empty()
        || version != CompatibilityVersion::V1
        || is_merge_pipeline(request.pipeline())
    {
        return Ok(());
    }
    Err(OxideError::InvalidOptions(
        COLLATION_COMPATIBILITY_MSG.to_string(),
    ))
}

type VersionSource = Box<dyn Fn() -> CompatibilityVersion + Send + Sync>;

/// The `aggregate` command implementation.
///
/// Orchestrates the admission chain: derive namespace, parse the
/// request, apply the collation gate, delegate to the executor. `run`
/// and `explain` share that chain and differ only in the verbosity
/// handed to the parser and in where output lands. Any failure
/// short-circuits; nothing here mutates persistent state.
pub struct PipelineCommand {
    executor: Arc<dyn AggregationExecutor>,
    version_source: VersionSource,
}

impl PipelineCommand {
    /// Command reading the compatibility version from the process-wide
    /// snapshot.
    pub fn new(executor: Arc<dyn AggregationExecutor>) -> Self {
        PipelineCommand {
            executor,
            version_source: Box::new(compatibility_version),
        }
    }

    /// Command with a pinned compatibility snapshot source. Lets tests
    /// exercise version-dependent behavior without touching the global.
    pub fn with_version_source<F>(executor: Arc<dyn AggregationExecutor>, source: F) -> Self
    where
        F: Fn() -> CompatibilityVersion + Send + Sync + 'static,
    {
        PipelineCommand {
            executor,
            version_source: Box::new(source),
        }
    }

    // Shared run/explain chain. Linear, no retries: namespace ->
    // parse -> collation gate -> executor, early return on failure.
    fn run_agg_command(
        &self,
        opctx: &OperationContext,
        dbname: &str,
        cmd: &Value,
        verbosity: Option<Verbosity>,
        result: &mut Map<String, Value>,
    ) -> Result<()> {
        let nss = NamespaceString::from_command(dbname, cmd)?;
        let request = AggregationRequest::parse(nss.clone(), cmd, verbosity)?;
        check_collation_compatibility(&request, (self.version_source)())?;
        crate::log_debug!(
            "admitted aggregate on {} ({} stages{})",
            nss,
            request.pipeline().len(),
            if request.explain().is_some() {
                ", explain"
            } else {
                ""
            }
        );
        self.executor.execute(opctx, &nss, &request, cmd, result)
    }
}

impl Command for PipelineCommand {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn help(&self) -> &'static str {
        "Runs the aggregate command: executes pipeline stages in order against the target collection"
    }

    fn allowed_on_secondary(&self) -> bool {
        false
    }

    fn secondary_override_ok(&self) -> bool {
        true
    }

    fn supports_write_concern(&self, cmd: &Value) -> bool {
        agg_supports_write_concern(cmd)
    }

    fn supports_read_concern(&self) -> bool {
        true
    }

    fn read_write_type(&self) -> ReadWriteType {
        ReadWriteType::Read
    }

    fn check_auth(
        &self,
        session: &dyn AuthorizationSession,
        dbname: &str,
        cmd: &Value,
    ) -> Result<()> {
        let nss = NamespaceString::from_command(dbname, cmd)?;
        session.check_auth_for_aggregate(&nss, cmd).map_err(|err| {
            crate::log_warn!("aggregate on {} denied: {}", nss, err);
            err
        })
    }

    fn run(
        &self,
        opctx: &OperationContext,
        dbname: &str,
        cmd: &Value,
        result: &mut Map<String, Value>,
    ) -> Result<()> {
        self.run_agg_command(opctx, dbname, cmd, None, result)
    }

    fn explain(
        &self,
        opctx: &OperationContext,
        dbname: &str,
        cmd: &Value,
        verbosity: Verbosity,
        out: &mut Map<String, Value>,
    ) -> Result<()> {
        self.run_agg_command(opctx, dbname, cmd, Some(verbosity), out)
    }
}
