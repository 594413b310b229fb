pub mod cancel;
pub mod config;
pub mod error;
pub mod status;
pub mod telemetry;
pub mod types;

mod flag;

pub use cancel::{CancellationStore, FileCancellation, MemoryCancellation};
pub use config::DiscoveryConfig;
pub use error::KolScoutError;
pub use status::{FileRunStatus, MemoryRunStatus, RunStatusStore};
pub use types::*;
