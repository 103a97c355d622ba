// oxidedb-core/src/request.rs
// Structured aggregate request parsed from a raw command document

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{OxideError, Result};
use crate::namespace::NamespaceString;

/// Requested level of detail for explain output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verbosity {
    /// Plan selection only
    QueryPlanner,
    /// Plan plus execution statistics
    ExecutionStats,
    /// Statistics for every candidate plan
    AllPlansExecution,
}

impl Verbosity {
    pub fn parse(s: &str) -> Option<Verbosity> {
        match s {
            "queryPlanner" => Some(Verbosity::QueryPlanner),
            "executionStats" => Some(Verbosity::ExecutionStats),
            "allPlansExecution" => Some(Verbosity::AllPlansExecution),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::QueryPlanner => "queryPlanner",
            Verbosity::ExecutionStats => "executionStats",
            Verbosity::AllPlansExecution => "allPlansExecution",
        }
    }
}

// Generic command fields handled by the surrounding host, not by this
// request. They are accepted and skipped here.
fn is_generic_field(name: &str) -> bool {
    name.starts_with('$')
        || matches!(
            name,
            "maxTimeMS" | "readConcern" | "writeConcern" | "comment"
        )
}

/// One parsed `aggregate` invocation.
///
/// Built fresh per incoming command, validated, handed to the executor,
/// then discarded; never persisted or cached. Stage order is preserved
/// end-to-end. Options this layer does not model stay visible to the
/// executor through the raw command it also receives.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    nss: NamespaceString,
    pipeline: Vec<Value>,
    collation: Map<String, Value>,
    explain: Option<Verbosity>,
    allow_disk_use: bool,
    bypass_document_validation: bool,
    from_router: bool,
    batch_size: Option<i64>,
}

impl AggregationRequest {
    /// Parse a raw command document into a request targeting `nss`.
    ///
    /// `verbosity` is the host-supplied explain level (from an explain
    /// wrapper command); an in-command `explain: true` field selects
    /// query-planner verbosity when the host supplied none, and is
    /// rejected when it did.
    pub fn parse(
        nss: NamespaceString,
        cmd: &Value,
        verbosity: Option<Verbosity>,
    ) -> Result<AggregationRequest> {
        let obj = cmd.as_object().ok_or_else(|| {
            OxideError::FailedToParse("command must be a document".to_string())
        })?;

        let mut pipeline: Option<Vec<Value>> = None;
        let mut collation = Map::new();
        let mut explain = verbosity;
        let mut allow_disk_use = false;
        let mut bypass_document_validation = false;
        let mut from_router = false;
        let mut batch_size = None;

        for (name, value) in obj {
            match name.as_str() {
                // Consumed by namespace resolution before parsing
                "aggregate" => {}
                "pipeline" => {
                    let stages = value.as_array().ok_or(OxideError::TypeMismatch {
                        field: "pipeline".to_string(),
                        expected: "array",
                    })?;
                    for stage in stages {
                        if !stage.is_object() {
                            return Err(OxideError::TypeMismatch {
                                field: "pipeline".to_string(),
                                expected: "array of documents",
                            });
                        }
                    }
                    pipeline = Some(stages.clone());
                }
                "collation" => {
                    let spec = value.as_object().ok_or(OxideError::TypeMismatch {
                        field: "collation".to_string(),
                        expected: "document",
                    })?;
                    collation = spec.clone();
                }
                "explain" => {
                    if verbosity.is_some() {
                        return Err(OxideError::FailedToParse(
                            "the 'explain' option is illegal when a verbosity is also provided"
                                .to_string(),
                        ));
                    }
                    let wants_explain = value.as_bool().ok_or(OxideError::TypeMismatch {
                        field: "explain".to_string(),
                        expected: "boolean",
                    })?;
                    if wants_explain {
                        explain = Some(Verbosity::QueryPlanner);
                    }
                }
                "allowDiskUse" => {
                    allow_disk_use = value.as_bool().ok_or(OxideError::TypeMismatch {
                        field: "allowDiskUse".to_string(),
                        expected: "boolean",
                    })?;
                }
                "bypassDocumentValidation" => {
                    bypass_document_validation =
                        value.as_bool().ok_or(OxideError::TypeMismatch {
                            field: "bypassDocumentValidation".to_string(),
                            expected: "boolean",
                        })?;
                }
                "fromRouter" => {
                    from_router = value.as_bool().ok_or(OxideError::TypeMismatch {
                        field: "fromRouter".to_string(),
                        expected: "boolean",
                    })?;
                }
                "cursor" => {
                    batch_size = parse_cursor_options(value)?;
                }
                _ if is_generic_field(name) => {}
                _ => {
                    return Err(OxideError::FailedToParse(format!(
                        "unrecognized field '{}'",
                        name
                    )));
                }
            }
        }

        let pipeline = pipeline.ok_or_else(|| {
            OxideError::FailedToParse("the 'pipeline' field is required".to_string())
        })?;

        Ok(AggregationRequest {
            nss,
            pipeline,
            collation,
            explain,
            allow_disk_use,
            bypass_document_validation,
            from_router,
            batch_size,
        })
    }

    pub fn nss(&self) -> &NamespaceString {
        &self.nss
    }

    /// Pipeline stages in submission order
    pub fn pipeline(&self) -> &[Value] {
        &self.pipeline
    }

    /// Collation specification; empty means "use the collection default"
    pub fn collation(&self) -> &Map<String, Value> {
        &self.collation
    }

    pub fn explain(&self) -> Option<Verbosity> {
        self.explain
    }

    pub fn allow_disk_use(&self) -> bool {
        self.allow_disk_use
    }

    pub fn bypass_document_validation(&self) -> bool {
        self.bypass_document_validation
    }

    /// True when a routing tier generated this request
    pub fn from_router(&self) -> bool {
        self.from_router
    }

    pub fn batch_size(&self) -> Option<i64> {
        self.batch_size
    }
}

fn parse_cursor_options(value: &Value) -> Result<Option<i64>> {
    let cursor = value.as_object().ok_or(OxideError::TypeMismatch {
        field: "cursor".to_string(),
        expected: "document",
    })?;
    let mut batch_size = None;
    for (name, value) in cursor {
        match name.as_str() {
            "batchSize" => {
                let size = value.as_i64().filter(|n| *n >= 0).ok_or_else(|| {
                    OxideError::FailedToParse(
                        "cursor.batchSize must be a non-negative integer".to_string(),
                    )
                })?;
                batch_size = Some(size);
            }
            _ => {
                return Err(OxideError::FailedToParse(format!(
                    "unrecognized field 'cursor.{}'",
                    name
                )));
            }
        }
    }
    Ok(batch_size)
}
