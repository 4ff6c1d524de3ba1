use crate::{EngineError, Result};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::warn;

tokio::task_local! {
    /// Name of the mutating call the current task is running, if any.
    static ACTIVE_CALL: &'static str;
}

/// Serializes mutating calls over the engine's ledger.
///
/// Top-level calls queue on the lock and run one at a time, outgoing payouts
/// included. A call entered from inside another one on the same task, which is
/// how a payout recipient calling back into the engine shows up, is turned away
/// instead of deadlocking on the lock or observing half-finished bookkeeping.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    lock: Mutex<()>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Ok(outer) = ACTIVE_CALL.try_with(|active| *active) {
            warn!(operation, outer, "Reentrant call rejected");
            return Err(EngineError::Reentrancy(operation));
        }
        let _serial = self.lock.lock().await;
        ACTIVE_CALL.scope(operation, call).await
    }

    /// Whether some call currently holds the ledger.
    pub fn is_engaged(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
