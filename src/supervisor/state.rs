use std::fmt;
use std::sync::Arc;

use crate::worker::WorkerSession;

/// The seven lifecycle states of a supervised worker.
///
/// Values are immutable and published wholesale through the state cell; a
/// transition builds a new value and swaps it in. A session is carried only
/// by `FreshRunning` and `Running` and is valid exactly while its variant
/// is current.
pub enum Lifecycle {
    /// No worker exists; never started or fully stopped.
    Fresh,
    /// Spawn requested; worker not yet connected.
    Starting { failures: u32 },
    /// Worker connected, never yet used for real work.
    FreshRunning { session: Arc<dyn WorkerSession> },
    /// Worker connected and used at least once.
    Running { session: Arc<dyn WorkerSession> },
    /// Stop requested with intent to immediately start a new worker.
    Restarting,
    /// Stop requested, no restart intended.
    Stopping,
    /// Terminal; the supervisor is permanently inert.
    Disposed,
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Fresh => "fresh",
            Lifecycle::Starting { .. } => "starting",
            Lifecycle::FreshRunning { .. } => "fresh-running",
            Lifecycle::Running { .. } => "running",
            Lifecycle::Restarting => "restarting",
            Lifecycle::Stopping => "stopping",
            Lifecycle::Disposed => "disposed",
        }
    }

}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Starting { failures } => write!(f, "starting(failures: {failures})"),
            other => f.write_str(other.name()),
        }
    }
}
