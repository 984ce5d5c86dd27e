//! Processor and platform identification on top of `hwprobe-platform`.
//!
//! Everything here reads through the process-wide
//! [`SystemRegistry`](hwprobe_platform::SystemRegistry) or through any
//! [`Fetch`](hwprobe_platform::Fetch) implementation handed in, so the same
//! logic runs against a live kernel, a fixture tree or a replayed record.

pub mod arch;
pub mod binary;
pub mod cpuid;
pub mod execution;
pub mod hwinfo;
pub mod uname;

pub use arch::{Architecture, HardwareIdentity};
pub use binary::{executable_architectures, parse_macho_architectures};
pub use cpuid::{CpuIdCache, Registers, Signature};
pub use execution::ExecutionMode;
pub use hwinfo::{HardwareSummary, PerflevelSummary};
pub use uname::{uname_map, uname_string, UnameField, UnameRecord};
