//! System value sources for hwprobe.
//!
//! Everything the detectors know about the machine is read through the
//! [`Fetch`] contract: a dotted property name answered as text, a
//! fixed-width integer, or a boolean. This crate provides the backends
//! (sysctl on BSD-derived kernels, the `/proc` and `/sys` trees on Linux,
//! an in-memory map for tests and replay), the namespace table that turns
//! property groups into name prefixes, and the configuration that wires
//! them together in [`SystemRegistry`].

pub mod config;
pub mod cpuinfo;
pub mod namespaces;
pub mod providers;
pub mod registry;
pub mod traits;
pub mod value;

pub use config::ProbeConfig;
pub use cpuinfo::{parse_cpuinfo, CpuInfoRecord};
pub use namespaces::{CacheSizes, CpuInfo};
pub use providers::{MemoryFetcher, ProcFsFetcher, QueryStorage, Recording, StoredRecord};
pub use registry::{Namespace, Scope, SystemFetcher, SystemRegistry};
pub use traits::{Fetch, Integer};
pub use value::EntryValue;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub use providers::SysctlFetcher;

/// The registry of the running process.
pub fn current() -> &'static SystemRegistry {
    SystemRegistry::current()
}
