// oxidedb-core/src/namespace.rs
// Target namespace (database.collection) and extraction from raw commands

use std::fmt;

use serde_json::Value;

use crate::error::{OxideError, Result};

/// Fully qualified target of a command: database plus collection.
///
/// Must be resolvable from the raw command before any other admission
/// step runs; every later stage (parsing, authorization, execution) is
/// keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceString {
    db: String,
    coll: String,
}

impl NamespaceString {
    pub fn new(db: &str, coll: &str) -> Result<Self> {
        if db.is_empty() || db.contains('.') || db.contains('\0') {
            return Err(OxideError::InvalidNamespace(format!(
                "invalid database name '{}'",
                db
            )));
        }
        if coll.is_empty() || coll.starts_with('.') || coll.contains('\0') {
            return Err(OxideError::InvalidNamespace(format!(
                "invalid collection name '{}.{}'",
                db, coll
            )));
        }
        Ok(NamespaceString {
            db: db.to_string(),
            coll: coll.to_string(),
        })
    }

    /// Derive the namespace from the mandatory collection-identifying
    /// field of an `aggregate` command document.
    pub fn from_command(db: &str, cmd: &Value) -> Result<Self> {
        let obj = cmd.as_object().ok_or_else(|| {
            OxideError::FailedToParse("command must be a document".to_string())
        })?;
        match obj.get("aggregate") {
            Some(Value::String(coll)) => NamespaceString::new(db, coll),
            Some(_) => Err(OxideError::TypeMismatch {
                field: "aggregate".to_string(),
                expected: "string",
            }),
            None => Err(OxideError::InvalidNamespace(format!(
                "missing required collection field 'aggregate' in command for database '{}'",
                db
            ))),
        }
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn coll(&self) -> &str {
        &self.coll
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.db, self.coll)
    }
}

impl fmt::Display for NamespaceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}
