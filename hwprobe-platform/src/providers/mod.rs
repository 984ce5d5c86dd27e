//! Value source implementations.

pub mod memory;
pub mod procfs;
pub mod storage;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub mod sysctl;

pub use memory::MemoryFetcher;
pub use procfs::ProcFsFetcher;
pub use storage::{global_storage, QueryStorage, Recording, SharedStorage, StoredRecord};

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub use sysctl::SysctlFetcher;
