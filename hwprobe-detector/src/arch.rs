//! CPU architecture of the process, the machine and the executable.

use crate::execution::ExecutionMode;
use hwprobe_core::{probe_debug, probe_error, probe_warn, ProbeError, ProbeResult};
use hwprobe_platform::namespaces::Hardware;
use hwprobe_platform::Fetch;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mach-O `cpu_type_t` and `cpu_subtype_t` values.
pub mod mach {
    pub const CPU_ARCH_ABI64: i32 = 0x0100_0000;
    pub const CPU_TYPE_X86: i32 = 7;
    pub const CPU_TYPE_I386: i32 = CPU_TYPE_X86;
    pub const CPU_TYPE_X86_64: i32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
    pub const CPU_TYPE_ARM: i32 = 12;
    pub const CPU_TYPE_ARM64: i32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
    pub const CPU_TYPE_POWERPC: i32 = 18;
    pub const CPU_TYPE_POWERPC64: i32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

    /// Capability bits carried in the top byte of a subtype.
    pub const CPU_SUBTYPE_MASK: i32 = 0xff00_0000_u32 as i32;
    pub const CPU_SUBTYPE_X86_64_ALL: i32 = 3;
    pub const CPU_SUBTYPE_X86_64_H: i32 = 8;
    pub const CPU_SUBTYPE_ARM_V8: i32 = 13;
    pub const CPU_SUBTYPE_POWERPC_750: i32 = 9;
    pub const CPU_SUBTYPE_POWERPC_7400: i32 = 10;
    pub const CPU_SUBTYPE_POWERPC_7450: i32 = 11;
    pub const CPU_SUBTYPE_POWERPC_970: i32 = 100;

    pub const CPUFAMILY_POWERPC_G3: u32 = 0xcee4_1549;
    pub const CPUFAMILY_POWERPC_G4: u32 = 0x77c1_84ae;
    pub const CPUFAMILY_POWERPC_G5: u32 = 0xed76_d8aa;
}

use mach::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "ppc")]
    Ppc,
    /// PowerPC G3.
    #[serde(rename = "ppc750")]
    Ppc750,
    /// PowerPC G4.
    #[serde(rename = "ppc7450")]
    Ppc7450,
    /// PowerPC G5.
    #[serde(rename = "ppc970")]
    Ppc970,
    #[serde(rename = "ppc64")]
    Ppc64,
    #[serde(rename = "ppc64le")]
    Ppc64le,
    #[serde(rename = "i386")]
    I386,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm")]
    Arm,
    #[serde(rename = "arm64")]
    Arm64,
}

static CURRENT: OnceCell<Architecture> = OnceCell::new();
static MACHINE: OnceCell<Architecture> = OnceCell::new();

impl Architecture {
    pub const ALL: [Architecture; 10] = [
        Architecture::Ppc,
        Architecture::Ppc750,
        Architecture::Ppc7450,
        Architecture::Ppc970,
        Architecture::Ppc64,
        Architecture::Ppc64le,
        Architecture::I386,
        Architecture::X86_64,
        Architecture::Arm,
        Architecture::Arm64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Ppc => "ppc",
            Architecture::Ppc750 => "ppc750",
            Architecture::Ppc7450 => "ppc7450",
            Architecture::Ppc970 => "ppc970",
            Architecture::Ppc64 => "ppc64",
            Architecture::Ppc64le => "ppc64le",
            Architecture::I386 => "i386",
            Architecture::X86_64 => "x86_64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
        }
    }

    pub fn is_ppc(&self) -> bool {
        self.as_str().starts_with("ppc")
    }

    pub fn is_ppc64(&self) -> bool {
        matches!(
            self,
            Architecture::Ppc64 | Architecture::Ppc970 | Architecture::Ppc64le
        )
    }

    pub fn is_ppc32(&self) -> bool {
        self.is_ppc() && !self.is_ppc64()
    }

    pub fn is_apple_silicon(&self) -> bool {
        *self == Architecture::Arm64
    }

    pub fn is_arm(&self) -> bool {
        self.as_str().starts_with("arm")
    }

    pub fn is_intel(&self) -> bool {
        matches!(self, Architecture::I386 | Architecture::X86_64)
    }

    /// Whether the variant names a 64-bit ABI.
    ///
    /// `ppc970` is excluded: it also names 32-bit processes on a G5.
    pub fn is_64bit(&self) -> bool {
        matches!(
            self,
            Architecture::Ppc64 | Architecture::Ppc64le | Architecture::X86_64 | Architecture::Arm64
        )
    }

    /// The family name `uname -p` reports: `ppc`, `i386` or `arm`.
    pub fn generic_processor_type(&self) -> Architecture {
        if self.is_ppc() {
            Architecture::Ppc
        } else if self.is_intel() {
            Architecture::I386
        } else if self.is_arm() {
            Architecture::Arm
        } else {
            *self
        }
    }

    /// Map a Mach CPU identity onto an architecture.
    ///
    /// Types are compared for equality; subtypes are compared after masking
    /// off the capability byte. Returns `None` for CPU types outside the
    /// table.
    pub fn classify(identity: &HardwareIdentity) -> Option<Architecture> {
        let subtype = identity.cpusubtype & !CPU_SUBTYPE_MASK;
        let family = identity.cpufamily;

        let arch = match identity.cputype {
            CPU_TYPE_X86_64 => Architecture::X86_64,
            CPU_TYPE_X86 => {
                if subtype == CPU_SUBTYPE_X86_64_H || identity.cpu64bit_capable == Some(true) {
                    Architecture::X86_64
                } else {
                    Architecture::I386
                }
            }
            CPU_TYPE_ARM64 => Architecture::Arm64,
            CPU_TYPE_ARM => {
                if subtype == CPU_SUBTYPE_ARM_V8 {
                    Architecture::Arm64
                } else {
                    Architecture::Arm
                }
            }
            CPU_TYPE_POWERPC64 => {
                if subtype == CPU_SUBTYPE_POWERPC_970 || family == CPUFAMILY_POWERPC_G5 {
                    Architecture::Ppc970
                } else if identity.little_endian {
                    Architecture::Ppc64le
                } else {
                    Architecture::Ppc64
                }
            }
            CPU_TYPE_POWERPC => {
                if subtype == CPU_SUBTYPE_POWERPC_750 || family == CPUFAMILY_POWERPC_G3 {
                    Architecture::Ppc750
                } else if subtype == CPU_SUBTYPE_POWERPC_7450
                    || subtype == CPU_SUBTYPE_POWERPC_7400
                    || family == CPUFAMILY_POWERPC_G4
                {
                    Architecture::Ppc7450
                } else if subtype == CPU_SUBTYPE_POWERPC_970 || family == CPUFAMILY_POWERPC_G5 {
                    Architecture::Ppc970
                } else {
                    Architecture::Ppc
                }
            }
            _ => return None,
        };
        Some(arch)
    }

    /// Architecture of the compiled binary.
    pub fn binary() -> Option<Architecture> {
        if cfg!(target_arch = "x86_64") {
            Some(Architecture::X86_64)
        } else if cfg!(target_arch = "x86") {
            Some(Architecture::I386)
        } else if cfg!(target_arch = "aarch64") {
            Some(Architecture::Arm64)
        } else if cfg!(target_arch = "arm") {
            Some(Architecture::Arm)
        } else if cfg!(all(target_arch = "powerpc64", target_endian = "little")) {
            Some(Architecture::Ppc64le)
        } else if cfg!(target_arch = "powerpc64") {
            Some(Architecture::Ppc64)
        } else if cfg!(target_arch = "powerpc") {
            Some(Architecture::Ppc)
        } else {
            None
        }
    }

    /// Read the hardware identity from `fetcher` and classify it.
    pub fn detect<F: Fetch>(fetcher: &F) -> ProbeResult<Architecture> {
        let identity = HardwareIdentity::read(fetcher)?;
        let arch = Self::classify(&identity).ok_or_else(|| {
            probe_error!(cputype = identity.cputype, "Unrecognised CPU type");
            ProbeError::Unsupported("CPU type outside the Mach architecture table")
        })?;
        probe_debug!(arch = %arch, "Detected process architecture");
        Ok(arch)
    }

    /// Architecture of the current process, detected once.
    ///
    /// Apple kernels are queried for their Mach identity; elsewhere the
    /// compiled architecture is the answer.
    pub fn current() -> ProbeResult<Architecture> {
        CURRENT
            .get_or_try_init(|| Self::resolve(hwprobe_platform::current().system()))
            .copied()
    }

    /// Resolve the process architecture from `fetcher` on Apple kernels.
    ///
    /// Only Darwin publishes `hw.cputype` and friends, so other kernels
    /// (the remaining BSDs included) report the compiled architecture.
    #[cfg(target_vendor = "apple")]
    pub fn resolve<F: Fetch>(fetcher: &F) -> ProbeResult<Architecture> {
        Self::detect(fetcher)
    }

    /// Resolve the process architecture from `fetcher` on Apple kernels.
    ///
    /// Only Darwin publishes `hw.cputype` and friends, so other kernels
    /// (the remaining BSDs included) report the compiled architecture.
    #[cfg(not(target_vendor = "apple"))]
    pub fn resolve<F: Fetch>(_fetcher: &F) -> ProbeResult<Architecture> {
        Self::binary().ok_or(ProbeError::Unsupported("target architecture"))
    }

    /// Architecture of the physical machine, detected once.
    ///
    /// Equal to [`Architecture::current`] unless the process is translated.
    /// When the execution mode cannot be read the process architecture is
    /// returned.
    pub fn machine() -> ProbeResult<Architecture> {
        MACHINE
            .get_or_try_init(|| {
                let arch = Self::current()?;
                let machine = match ExecutionMode::current() {
                    Ok(mode) => arch.correct_for_emulation(mode).0,
                    Err(e) => {
                        probe_warn!(error = %e, "Can't get the execution mode, using the process architecture");
                        arch
                    }
                };
                probe_debug!(machine = %machine, "Detected machine architecture");
                Ok(machine)
            })
            .copied()
    }

    /// Infer the host architecture of a process running as `self` in `mode`.
    ///
    /// The returned mode is always `Native`, describing the host, so feeding
    /// the result back in leaves it unchanged. The 32-bit PowerPC rule is a
    /// best guess: such a process can only be translated on an early Intel
    /// Mac.
    pub fn correct_for_emulation(self, mode: ExecutionMode) -> (Architecture, ExecutionMode) {
        if !mode.is_emulated() {
            return (self, ExecutionMode::Native);
        }

        let host = if self == Architecture::X86_64 {
            Architecture::Arm64
        } else if self.is_ppc64() {
            Architecture::X86_64
        } else if self.is_ppc32() {
            Architecture::I386
        } else {
            self
        };
        (host, ExecutionMode::Native)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Architecture::ALL
            .iter()
            .copied()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| ProbeError::Parse(format!("Unknown architecture '{}'", s)))
    }
}

/// The CPU identity a BSD-derived kernel publishes under `hw.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareIdentity {
    pub cputype: i32,
    pub cpusubtype: i32,
    pub cpufamily: u32,
    pub cpu64bit_capable: Option<bool>,
    pub little_endian: bool,
}

impl HardwareIdentity {
    /// Type, subtype and family are required; 64-bit capability is not
    /// published by every kernel. Byte order is the compiled one.
    pub fn read<F: Fetch>(fetcher: &F) -> ProbeResult<Self> {
        let hw = Hardware::new(fetcher);
        Ok(Self {
            cputype: hw.cputype()?,
            cpusubtype: hw.cpusubtype()?,
            cpufamily: hw.cpufamily()?,
            cpu64bit_capable: hw.cpu64bit_capable().ok(),
            little_endian: cfg!(target_endian = "little"),
        })
    }
}
