// oxidedb-core/src/context.rs
// Per-operation context: deadline and kill flag, passed through unchanged

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{OxideError, Result};

/// Carries cancellation and deadline signals for one command invocation.
///
/// The admission layer only threads this through to the executor; the
/// executor (and any blocking work it does) is responsible for polling
/// [`check_for_interrupt`](OperationContext::check_for_interrupt).
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    killed: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        OperationContext {
            killed: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Mark the operation as killed. Visible through every clone.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Relaxed);
    }

    /// Err if the operation was killed or ran past its deadline.
    pub fn check_for_interrupt(&self) -> Result<()> {
        if self.killed.load(Ordering::Relaxed) {
            return Err(OxideError::Interrupted);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(OxideError::ExceededTimeLimit);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_not_interrupted() {
        let opctx = OperationContext::new();
        assert!(opctx.check_for_interrupt().is_ok());
    }

    #[test]
    fn test_kill_visible_through_clones() {
        let opctx = OperationContext::new();
        let handle = opctx.clone();
        handle.kill();
        assert!(matches!(
            opctx.check_for_interrupt(),
            Err(OxideError::Interrupted)
        ));
    }

    #[test]
    fn test_expired_deadline() {
        let opctx = OperationContext::with_timeout(Duration::from_secs(0));
        assert!(matches!(
            opctx.check_for_interrupt(),
            Err(OxideError::ExceededTimeLimit)
        ));
    }
}
