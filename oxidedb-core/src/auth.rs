// oxidedb-core/src/auth.rs
// Authorization boundary: policy decisions live outside this crate

use serde_json::Value;

use crate::error::Result;
use crate::namespace::NamespaceString;

/// Per-client authorization session consulted before a command runs.
///
/// The admission layer performs no policy logic of its own; it hands
/// the namespace and the raw command to the session and aborts on a
/// denial. The raw command is included because some policies inspect
/// stage contents (for example `$out` targets).
pub trait AuthorizationSession: Send + Sync {
    /// Decide whether the session's principal may run `aggregate`
    /// against `nss`. Err([`Unauthorized`](crate::OxideError::Unauthorized))
    /// aborts the operation before parsing or execution proceeds.
    fn check_auth_for_aggregate(&self, nss: &NamespaceString, cmd: &Value) -> Result<()>;
}

/// Session that permits everything. For embedded hosts that vet
/// callers themselves, and as the default in single-user deployments.
pub struct AllowAllAuthorizer;

impl AuthorizationSession for AllowAllAuthorizer {
    fn check_auth_for_aggregate(&self, _nss: &NamespaceString, _cmd: &Value) -> Result<()> {
        Ok(())
    }
}
