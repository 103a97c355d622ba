// oxidedb-core/src/compatibility.rs
// Process-wide compatibility version: init at startup, atomic read at use

use std::sync::atomic::{AtomicU8, Ordering};

/// Cluster-wide negotiated feature level.
///
/// Gates which request shapes this member accepts. `V1` members predate
/// collation support, so while any member of the cluster may still be
/// at `V1`, user-supplied collations must be rejected at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompatibilityVersion {
    /// Legacy feature level: collation is not understood cluster-wide
    V1 = 1,
    /// Current feature level
    V2 = 2,
}

impl CompatibilityVersion {
    pub fn parse(s: &str) -> Option<CompatibilityVersion> {
        match s {
            "1" | "v1" => Some(CompatibilityVersion::V1),
            "2" | "v2" => Some(CompatibilityVersion::V2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityVersion::V1 => "1",
            CompatibilityVersion::V2 => "2",
        }
    }
}

// New processes start at the current level; clusters still containing
// V1 members downgrade this at startup before serving traffic.
static COMPATIBILITY_VERSION: AtomicU8 = AtomicU8::new(CompatibilityVersion::V2 as u8);

/// Set the process-wide compatibility version. Called once at startup
/// (or on a replicated setParameter); never called by the admission path.
pub fn set_compatibility_version(version: CompatibilityVersion) {
    COMPATIBILITY_VERSION.store(version as u8, Ordering::Relaxed);
}

/// Immutable snapshot of the compatibility version.
///
/// Validation reads this once per request and must not cache it across
/// requests; the value can change between invocations.
pub fn compatibility_version() -> CompatibilityVersion {
    match COMPATIBILITY_VERSION.load(Ordering::Relaxed) {
        1 => CompatibilityVersion::V1,
        _ => CompatibilityVersion::V2,
    }
}
