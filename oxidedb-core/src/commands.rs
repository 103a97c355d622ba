// oxidedb-core/src/commands.rs
// Command surface: descriptor trait, static registry, host dispatch

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use crate::auth::AuthorizationSession;
use crate::context::OperationContext;
use crate::error::{OxideError, Result};
use crate::request::Verbosity;

/// Classification of a command for host accounting and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWriteType {
    Read,
    Write,
    Command,
}

/// One named database command: static capability metadata plus the
/// run/explain entry points.
///
/// Implementations are registered once in the static operation table
/// and invoked by [`dispatch`] for every matching client command.
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description for the host's help surface
    fn help(&self) -> &'static str;

    /// Eligible to run on a non-primary member without an override
    fn allowed_on_secondary(&self) -> bool {
        false
    }

    /// May a client read preference override the secondary restriction
    fn secondary_override_ok(&self) -> bool {
        false
    }

    /// Whether this invocation honors a write concern. Takes the raw
    /// command because the answer can depend on its contents.
    fn supports_write_concern(&self, _cmd: &Value) -> bool {
        false
    }

    fn supports_read_concern(&self) -> bool {
        false
    }

    fn read_write_type(&self) -> ReadWriteType;

    /// Authorize the invocation. Runs before `run`/`explain`; a failure
    /// here means no parsing or execution takes place afterwards.
    fn check_auth(
        &self,
        session: &dyn AuthorizationSession,
        dbname: &str,
        cmd: &Value,
    ) -> Result<()>;

    /// Execute the command, writing response fields into `result`.
    fn run(
        &self,
        opctx: &OperationContext,
        dbname: &str,
        cmd: &Value,
        result: &mut Map<String, Value>,
    ) -> Result<()>;

    /// Produce an explain document at `verbosity` instead of executing.
    fn explain(
        &self,
        _opctx: &OperationContext,
        _dbname: &str,
        _cmd: &Value,
        _verbosity: Verbosity,
        _out: &mut Map<String, Value>,
    ) -> Result<()> {
        Err(OxideError::InvalidOptions(format!(
            "command '{}' does not support explain",
            self.name()
        )))
    }
}

/// Table of registered commands, keyed by command name.
pub struct CommandRegistry {
    table: RwLock<HashMap<&'static str, Arc<dyn Command>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry hosts normally dispatch through.
    pub fn global() -> &'static CommandRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register a command under its own name. Re-registering a name
    /// replaces the previous entry.
    pub fn register(&self, command: Arc<dyn Command>) {
        self.table.write().insert(command.name(), command);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.table.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.read().keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: CommandRegistry = CommandRegistry::new();
}

/// Register a command in the global table.
pub fn register_command(command: Arc<dyn Command>) {
    CommandRegistry::global().register(command);
}

/// Look up a command in the global table.
pub fn find_command(name: &str) -> Option<Arc<dyn Command>> {
    CommandRegistry::global().find(name)
}

// The command name is the first non-generic field of the document.
fn command_name(cmd: &Value) -> Result<&str> {
    let obj = cmd
        .as_object()
        .ok_or_else(|| OxideError::FailedToParse("command must be a document".to_string()))?;
    obj.keys()
        .map(|k| k.as_str())
        .find(|k| !k.starts_with('$'))
        .ok_or_else(|| OxideError::FailedToParse("empty command document".to_string()))
}

/// Render a chain status into the response document.
///
/// Success appends `ok: 1`; failure appends `ok: 0` plus the error
/// message and its stable code.
pub fn append_command_status(result: &mut Map<String, Value>, status: Result<()>) {
    match status {
        Ok(()) => {
            result.insert("ok".to_string(), json!(1.0));
        }
        Err(err) => {
            result.insert("ok".to_string(), json!(0.0));
            result.insert("errmsg".to_string(), json!(err.to_string()));
            result.insert("code".to_string(), json!(err.code()));
            result.insert("codeName".to_string(), json!(err.code_name()));
        }
    }
}

/// Host entry point for one client command: look the command up,
/// authorize it, run it, and render the final status document.
///
/// Authorization runs before anything else the command does; a denied
/// principal never reaches parsing or execution.
pub fn dispatch(
    opctx: &OperationContext,
    session: &dyn AuthorizationSession,
    registry: &CommandRegistry,
    dbname: &str,
    cmd: &Value,
) -> Map<String, Value> {
    let mut result = Map::new();
    let status = dispatch_inner(opctx, session, registry, dbname, cmd, &mut result);
    if let Err(ref err) = status {
        crate::log_debug!("command on '{}' failed: {}", dbname, err);
    }
    append_command_status(&mut result, status);
    result
}

fn dispatch_inner(
    opctx: &OperationContext,
    session: &dyn AuthorizationSession,
    registry: &CommandRegistry,
    dbname: &str,
    cmd: &Value,
    result: &mut Map<String, Value>,
) -> Result<()> {
    let name = command_name(cmd)?;
    let command = registry
        .find(name)
        .ok_or_else(|| OxideError::CommandNotFound(name.to_string()))?;
    opctx.check_for_interrupt()?;
    command.check_auth(session, dbname, cmd)?;
    command.run(opctx, dbname, cmd, result)
}

/// Host entry point for an explain request: same lookup and
/// authorization chain, but the command writes an explain document at
/// `verbosity` into `out` instead of executing.
pub fn dispatch_explain(
    opctx: &OperationContext,
    session: &dyn AuthorizationSession,
    registry: &CommandRegistry,
    dbname: &str,
    cmd: &Value,
    verbosity: Verbosity,
    out: &mut Map<String, Value>,
) -> Result<()> {
    let name = command_name(cmd)?;
    let command = registry
        .find(name)
        .ok_or_else(|| OxideError::CommandNotFound(name.to_string()))?;
    opctx.check_for_interrupt()?;
    command.check_auth(session, dbname, cmd)?;
    command.explain(opctx, dbname, cmd, verbosity, out)
}
