//! Namespace table and the process-wide system registry.
//!
//! Property groups are identified by a [`Namespace`] and resolved to a
//! dotted prefix. A [`Scope`] binds such a prefix to a value source so that
//! `Scope::new(&fetcher, Namespace::Hardware).get_string("machine")` reads
//! `hw.machine`.

use crate::config::ProbeConfig;
use crate::namespaces::{Hardware, Kernel, MachdepCpu, Perflevel, Proc, SysCpu, SysctlProc};
use crate::providers::{global_storage, ProcFsFetcher, QueryStorage, Recording, SharedStorage};
use crate::traits::{Fetch, Integer};
use hwprobe_core::{diagnostics, probe_debug, probe_warn, ProbeResult};
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
use crate::providers::SysctlFetcher;

/// Prefix of the kernel identity group.
#[cfg(target_os = "linux")]
pub const KERNEL_PREFIX: &str = "kernel.";
#[cfg(not(target_os = "linux"))]
pub const KERNEL_PREFIX: &str = "kern.";

/// Logical property groups and their dotted prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Root,
    Kernel,
    Hardware,
    HardwareOptional,
    HardwareOptionalArm,
    /// A performance-level core cluster, `0` being the fastest.
    Perflevel(u8),
    Machdep,
    MachdepCpu,
    MachdepCpuAddressBits,
    Sysctl,
    Vfs,
    User,
    Vm,
    Debug,
    Net,
}

impl Namespace {
    pub fn prefix(&self) -> String {
        match self {
            Namespace::Root => String::new(),
            Namespace::Kernel => KERNEL_PREFIX.to_string(),
            Namespace::Hardware => "hw.".to_string(),
            Namespace::HardwareOptional => "hw.optional.".to_string(),
            Namespace::HardwareOptionalArm => "hw.optional.arm.".to_string(),
            Namespace::Perflevel(index) => format!("hw.perflevel{}.", index),
            Namespace::Machdep => "machdep.".to_string(),
            Namespace::MachdepCpu => "machdep.cpu.".to_string(),
            Namespace::MachdepCpuAddressBits => "machdep.cpu.address_bits.".to_string(),
            Namespace::Sysctl => "sysctl.".to_string(),
            Namespace::Vfs => "vfs.".to_string(),
            Namespace::User => "user.".to_string(),
            Namespace::Vm => "vm.".to_string(),
            Namespace::Debug => "debug.".to_string(),
            Namespace::Net => "net.".to_string(),
        }
    }
}

/// A value source seen through a name prefix.
#[derive(Debug, Clone)]
pub struct Scope<'f, F> {
    fetcher: &'f F,
    prefix: String,
}

impl<'f, F: Fetch> Scope<'f, F> {
    pub fn new(fetcher: &'f F, namespace: Namespace) -> Self {
        Self::with_prefix(fetcher, namespace.prefix())
    }

    pub fn with_prefix(fetcher: &'f F, prefix: impl Into<String>) -> Self {
        Self {
            fetcher,
            prefix: prefix.into(),
        }
    }

    pub fn fetcher(&self) -> &'f F {
        self.fetcher
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn full_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl<F: Fetch> Fetch for Scope<'_, F> {
    const FIXED_WIDTH: bool = F::FIXED_WIDTH;

    fn get_string(&self, name: &str) -> ProbeResult<String> {
        self.fetcher.get_string(&self.full_name(name))
    }

    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
        self.fetcher.get_integer(&self.full_name(name))
    }

    fn get_bool(&self, name: &str) -> ProbeResult<bool> {
        self.fetcher.get_bool(&self.full_name(name))
    }
}

/// The dotted-name source of this platform.
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub type SystemFetcher = SysctlFetcher;

/// The dotted-name source of this platform.
#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
pub type SystemFetcher = ProcFsFetcher;

/// Every value source of the running system, wired from one configuration.
#[derive(Debug)]
pub struct SystemRegistry {
    config: ProbeConfig,
    system: Recording<SystemFetcher>,
    proc: ProcFsFetcher,
    sys_cpu: ProcFsFetcher,
}

static CURRENT: Lazy<SystemRegistry> = Lazy::new(|| {
    let config = ProbeConfig::load().unwrap_or_else(|e| {
        probe_warn!(error = %e, "Invalid probe configuration, using defaults");
        ProbeConfig::default()
    });
    diagnostics::set_enabled(config.diagnostics);
    SystemRegistry::build(config, global_storage())
});

impl SystemRegistry {
    /// The registry of this process, configured on first use.
    pub fn current() -> &'static SystemRegistry {
        &CURRENT
    }

    /// An independent registry with its own query storage.
    pub fn with_config(config: ProbeConfig) -> Self {
        let storage = Arc::new(RwLock::new(QueryStorage::default()));
        Self::build(config, storage)
    }

    fn build(config: ProbeConfig, storage: SharedStorage) -> Self {
        {
            let mut storage = storage.write().unwrap_or_else(PoisonError::into_inner);
            storage.enabled = config.query_storage.enabled;
            storage.recover_every_query = config.query_storage.recover_every_query;
        }

        let system = Recording::new(Self::system_fetcher(&config), storage);
        let proc = ProcFsFetcher::new(&config.proc_root);
        let sys_cpu = ProcFsFetcher::new(config.sys_cpu_root());
        probe_debug!(backend = Self::backend_name(), "System registry ready");

        Self {
            config,
            system,
            proc,
            sys_cpu,
        }
    }

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    fn system_fetcher(_config: &ProbeConfig) -> SystemFetcher {
        SysctlFetcher::new()
    }

    #[cfg(not(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )))]
    fn system_fetcher(config: &ProbeConfig) -> SystemFetcher {
        ProcFsFetcher::new(&config.proc_sys_root)
    }

    /// Name of the dotted-name backend compiled for this platform.
    pub fn backend_name() -> &'static str {
        if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "dragonfly"
        )) {
            "sysctl"
        } else {
            "procfs"
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// The recording dotted-name source.
    pub fn system(&self) -> &Recording<SystemFetcher> {
        &self.system
    }

    pub fn storage(&self) -> &SharedStorage {
        self.system.storage()
    }

    pub fn scope(&self, namespace: Namespace) -> Scope<'_, Recording<SystemFetcher>> {
        Scope::new(&self.system, namespace)
    }

    pub fn kernel(&self) -> Kernel<'_, Recording<SystemFetcher>> {
        Kernel::new(&self.system)
    }

    pub fn hardware(&self) -> Hardware<'_, Recording<SystemFetcher>> {
        Hardware::new(&self.system)
    }

    pub fn perflevel(&self, index: u8) -> Perflevel<'_, Recording<SystemFetcher>> {
        Perflevel::new(&self.system, index)
    }

    pub fn machdep_cpu(&self) -> MachdepCpu<'_, Recording<SystemFetcher>> {
        MachdepCpu::new(&self.system)
    }

    pub fn sysctl_proc(&self) -> SysctlProc<'_, Recording<SystemFetcher>> {
        SysctlProc::new(&self.system)
    }

    /// The `/proc` tree.
    pub fn proc(&self) -> Proc<'_> {
        Proc::new(&self.proc)
    }

    /// The `/sys/devices/system/cpu` tree.
    pub fn sys_cpu(&self) -> SysCpu<'_> {
        SysCpu::new(&self.sys_cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryFetcher;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_prefixes() {
        assert_eq!(Namespace::Root.prefix(), "");
        assert_eq!(Namespace::Hardware.prefix(), "hw.");
        assert_eq!(Namespace::HardwareOptionalArm.prefix(), "hw.optional.arm.");
        assert_eq!(Namespace::Perflevel(1).prefix(), "hw.perflevel1.");
        assert_eq!(
            Namespace::MachdepCpuAddressBits.prefix(),
            "machdep.cpu.address_bits."
        );
        assert_eq!(Namespace::Sysctl.prefix(), "sysctl.");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_kernel_prefix_on_linux() {
        assert_eq!(Namespace::Kernel.prefix(), "kernel.");
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_kernel_prefix_on_bsd() {
        assert_eq!(Namespace::Kernel.prefix(), "kern.");
    }

    #[test]
    fn test_scope_concatenates_prefix() {
        let fetcher = MemoryFetcher::new()
            .with_string("hw.machine", "arm64")
            .with_integer("hw.perflevel0.physicalcpu", 8i32)
            .with_bool("hw.optional.arm.FEAT_SHA3", true);

        assert_eq!(
            Scope::new(&fetcher, Namespace::Hardware)
                .get_string("machine")
                .unwrap(),
            "arm64"
        );
        assert_eq!(
            Scope::new(&fetcher, Namespace::Perflevel(0))
                .get_integer::<i32>("physicalcpu")
                .unwrap(),
            8
        );
        assert!(Scope::new(&fetcher, Namespace::HardwareOptionalArm)
            .get_bool("FEAT_SHA3")
            .unwrap());
        assert!(Scope::new(&fetcher, Namespace::Vm)
            .get_string("machine")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_registry_with_fixture_roots() {
        let temp = TempDir::new().unwrap();
        let proc_root = temp.path().join("proc");
        let sys_root = temp.path().join("sys");
        fs::create_dir_all(&proc_root).unwrap();
        fs::create_dir_all(sys_root.join("devices/system/cpu")).unwrap();
        fs::write(proc_root.join("version"), "Linux version 6.8.0\n").unwrap();
        fs::write(sys_root.join("devices/system/cpu/online"), "0-7\n").unwrap();

        let config = ProbeConfig {
            proc_root,
            sys_root,
            ..ProbeConfig::default()
        };
        let registry = SystemRegistry::with_config(config);

        assert_eq!(registry.proc().version().unwrap(), "Linux version 6.8.0");
        assert_eq!(registry.sys_cpu().online().unwrap(), "0-7");
        assert!(registry.storage().read().unwrap().enabled);
    }

    #[test]
    fn test_registry_applies_storage_flags() {
        let mut config = ProbeConfig::default();
        config.query_storage.enabled = false;
        config.query_storage.recover_every_query = true;
        let registry = SystemRegistry::with_config(config);

        let storage = registry.storage().read().unwrap();
        assert!(!storage.enabled);
        assert!(storage.recover_every_query);
    }

    #[test]
    fn test_backend_name() {
        let name = SystemRegistry::backend_name();
        assert!(name == "sysctl" || name == "procfs");
    }
}
