// oxidedb-core/src/executor.rs
// Execution seam: the engine that actually runs a validated pipeline

use serde_json::{Map, Value};

use crate::context::OperationContext;
use crate::error::Result;
use crate::namespace::NamespaceString;
use crate::request::AggregationRequest;

/// The aggregation engine behind the admission layer.
///
/// Stage evaluation, cursor production and cross-shard merging all live
/// behind this trait; the admission layer only hands over a validated
/// request. When the request carries an explain verbosity the engine
/// writes an explain document instead of executing the pipeline.
///
/// The raw command rides along because some host options are not
/// duplicated into the structured request.
pub trait AggregationExecutor: Send + Sync {
    fn execute(
        &self,
        opctx: &OperationContext,
        nss: &NamespaceString,
        request: &AggregationRequest,
        raw_cmd: &Value,
        out: &mut Map<String, Value>,
    ) -> Result<()>;
}
