//! Native versus translated execution of the current process.

use hwprobe_core::{probe_debug, ProbeResult};
use hwprobe_platform::namespaces::SysctlProc;
use hwprobe_platform::{Fetch, SystemRegistry};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Native,
    /// Running under a binary translation layer such as Rosetta.
    Emulated,
}

static CURRENT: OnceCell<ExecutionMode> = OnceCell::new();

impl ExecutionMode {
    /// Execution mode of this process, detected once.
    pub fn current() -> ProbeResult<Self> {
        CURRENT
            .get_or_try_init(|| Self::detect(SystemRegistry::current().system()))
            .copied()
    }

    /// Detect from `sysctl.proc_translated`, falling back to the inverse of
    /// `sysctl.proc_native`. A kernel that has neither entry predates
    /// translation and every process on it is native. Any failure other
    /// than a missing entry is returned as is.
    pub fn detect<F: Fetch>(fetcher: &F) -> ProbeResult<Self> {
        let sysctl = SysctlProc::new(fetcher);

        let mode = match sysctl.proc_translated() {
            Ok(translated) => Self::from_translated(translated),
            Err(e) if e.is_not_found() => match sysctl.proc_native() {
                Ok(native) => Self::from_translated(!native),
                Err(e) if e.is_not_found() => {
                    probe_debug!("No translation entries, assuming native execution");
                    ExecutionMode::Native
                }
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        };

        probe_debug!(mode = %mode, "Detected execution mode");
        Ok(mode)
    }

    fn from_translated(translated: bool) -> Self {
        if translated {
            ExecutionMode::Emulated
        } else {
            ExecutionMode::Native
        }
    }

    pub fn is_emulated(&self) -> bool {
        matches!(self, ExecutionMode::Emulated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Native => "native",
            ExecutionMode::Emulated => "emulated",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
