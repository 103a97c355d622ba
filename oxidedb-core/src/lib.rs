// oxidedb-core/src/lib.rs
// Request admission and validation core for the aggregate command

pub mod auth;
pub mod commands;
pub mod compatibility;
pub mod context;
pub mod error;
pub mod executor;
pub mod logging;
pub mod namespace;
pub mod pipeline_command;
pub mod request;

#[cfg(test)]
mod admission_tests;

// Public exports
pub use auth::{AllowAllAuthorizer, AuthorizationSession};
pub use commands::{
    append_command_status, dispatch, dispatch_explain, find_command, register_command, Command,
    CommandRegistry, ReadWriteType,
};
pub use compatibility::{compatibility_version, set_compatibility_version, CompatibilityVersion};
pub use context::OperationContext;
pub use error::{OxideError, Result};
pub use executor::AggregationExecutor;
pub use logging::{log_level, set_log_level, LogLevel};
pub use namespace::NamespaceString;
pub use pipeline_command::{
    agg_supports_write_concern, check_collation_compatibility, is_merge_pipeline, PipelineCommand,
};
pub use request::{AggregationRequest, Verbosity};
