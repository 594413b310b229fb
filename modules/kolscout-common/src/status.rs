use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::KolScoutError;
use crate::flag;

const RUNNING: &str = "running";
const STOPPED: &str = "stopped";

/// Durable two-state run flag readable by any process.
///
/// The initiating context and the running context may be different
/// processes, so run state never travels through shared memory; only one
/// discovery run should be active at a time per platform-repository pair,
/// enforced by the caller using this flag.
pub trait RunStatusStore: Send + Sync {
    fn set_running(&self, running: bool) -> Result<(), KolScoutError>;
    fn is_running(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryRunStatus {
    running: AtomicBool,
}

impl MemoryRunStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStatusStore for MemoryRunStatus {
    fn set_running(&self, running: bool) -> Result<(), KolScoutError> {
        self.running.store(running, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// File-backed status record with write-then-verify semantics.
#[derive(Debug, Clone)]
pub struct FileRunStatus {
    path: PathBuf,
}

impl FileRunStatus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RunStatusStore for FileRunStatus {
    fn set_running(&self, running: bool) -> Result<(), KolScoutError> {
        flag::write_verified(&self.path, if running { RUNNING } else { STOPPED })
            .map_err(KolScoutError::Status)
    }

    fn is_running(&self) -> bool {
        matches!(flag::read(&self.path).as_deref(), Some(RUNNING))
    }
}
