pub mod diagnostics;
pub mod error;

// Re-exported so the diagnostic macros resolve `tracing` from any caller.
pub use tracing;

pub use error::{ProbeError, ProbeResult};
