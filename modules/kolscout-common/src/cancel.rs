use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::error::KolScoutError;
use crate::flag;

const STOP: &str = "stop";
const RUN: &str = "run";

/// Cooperative stop flag for a discovery run.
///
/// The engine polls `should_stop` at every candidate boundary and before
/// every profile fetch or expansion, so a stop request takes effect within
/// one candidate's processing. Polling is infallible by design: a store
/// that cannot be read is treated as "keep going" and logged.
pub trait CancellationStore: Send + Sync {
    fn request_stop(&self) -> Result<(), KolScoutError>;
    fn clear(&self) -> Result<(), KolScoutError>;
    fn should_stop(&self) -> bool;
}

/// In-memory flag for single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryCancellation {
    stop: AtomicBool,
}

impl MemoryCancellation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CancellationStore for MemoryCancellation {
    fn request_stop(&self) -> Result<(), KolScoutError> {
        self.stop.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), KolScoutError> {
        self.stop.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Durable flag file so an operator or a separate process can request
/// cancellation of a running engine. Writes are verified by read-back.
#[derive(Debug, Clone)]
pub struct FileCancellation {
    path: PathBuf,
}

impl FileCancellation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CancellationStore for FileCancellation {
    fn request_stop(&self) -> Result<(), KolScoutError> {
        flag::write_verified(&self.path, STOP).map_err(KolScoutError::Cancellation)
    }

    fn clear(&self) -> Result<(), KolScoutError> {
        flag::write_verified(&self.path, RUN).map_err(KolScoutError::Cancellation)
    }

    fn should_stop(&self) -> bool {
        match flag::read(&self.path) {
            Some(value) => value == STOP,
            None => {
                // Missing file means no stop was ever requested.
                if self.path.exists() {
                    warn!(path = %self.path.display(), "unreadable cancellation flag, continuing");
                }
                false
            }
        }
    }
}
