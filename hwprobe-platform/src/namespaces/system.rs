//! Kernel, hardware and CPU groups of the dotted-name store.

use crate::registry::{Namespace, Scope};
use crate::traits::Fetch;
use hwprobe_core::{ProbeError, ProbeResult};
use serde::Serialize;

/// Read a size entry, accepting both the 64-bit and the 32-bit encoding.
///
/// Kernels disagree on the width of cache-size entries, so a width
/// mismatch on the 64-bit read is retried as 32-bit.
pub fn read_size<F: Fetch + ?Sized>(fetcher: &F, name: &str) -> ProbeResult<u64> {
    match fetcher.get_integer::<i64>(name) {
        Ok(value) => u64::try_from(value)
            .map_err(|_| ProbeError::type_mismatch(name, "size", format!("negative value {}", value))),
        Err(ProbeError::TypeMismatch { .. }) => {
            let value = fetcher.get_integer::<i32>(name)?;
            u64::try_from(value)
                .map_err(|_| ProbeError::type_mismatch(name, "size", format!("negative value {}", value)))
        }
        Err(e) => Err(e),
    }
}

/// Sizes in bytes of each cache level present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSizes {
    pub l1i: Option<u64>,
    pub l1d: Option<u64>,
    pub l2: Option<u64>,
    pub l3: Option<u64>,
}

impl CacheSizes {
    pub fn is_empty(&self) -> bool {
        self.l1i.is_none() && self.l1d.is_none() && self.l2.is_none() && self.l3.is_none()
    }
}

/// Core, thread and cache entries shared by the hardware group and each
/// performance level.
pub trait CpuInfo: Fetch {
    fn physicalcpu(&self) -> ProbeResult<i32> {
        self.get_integer("physicalcpu")
    }

    fn physicalcpu_max(&self) -> ProbeResult<i32> {
        self.get_integer("physicalcpu_max")
    }

    fn logicalcpu(&self) -> ProbeResult<i32> {
        self.get_integer("logicalcpu")
    }

    fn logicalcpu_max(&self) -> ProbeResult<i32> {
        self.get_integer("logicalcpu_max")
    }

    fn l1icachesize(&self) -> ProbeResult<u64> {
        read_size(self, "l1icachesize")
    }

    fn l1dcachesize(&self) -> ProbeResult<u64> {
        read_size(self, "l1dcachesize")
    }

    fn l2cachesize(&self) -> ProbeResult<u64> {
        read_size(self, "l2cachesize")
    }

    fn l3cachesize(&self) -> ProbeResult<u64> {
        read_size(self, "l3cachesize")
    }

    /// Cores available, falling back to the maximum when the current
    /// count is not published.
    fn core_count(&self) -> ProbeResult<i32> {
        match self.physicalcpu() {
            Err(e) if e.is_not_found() => self.physicalcpu_max(),
            other => other,
        }
    }

    /// Hardware threads available, with the same fallback as `core_count`.
    fn thread_count(&self) -> ProbeResult<i32> {
        match self.logicalcpu() {
            Err(e) if e.is_not_found() => self.logicalcpu_max(),
            other => other,
        }
    }

    fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            l1i: self.l1icachesize().ok(),
            l1d: self.l1dcachesize().ok(),
            l2: self.l2cachesize().ok(),
            l3: self.l3cachesize().ok(),
        }
    }
}

scoped_group!(
    /// `kern.*` on BSD kernels, `kernel.*` on Linux.
    Kernel
);

impl<'f, F: Fetch> Kernel<'f, F> {
    pub fn new(fetcher: &'f F) -> Self {
        Self::from_scope(Scope::new(fetcher, Namespace::Kernel))
    }

    properties! {
        /// Full kernel version banner.
        version: String = "version";
        hostname: String = "hostname";
        ostype: String = "ostype";
        osrelease: String = "osrelease";
        /// Kernel revision number as text.
        osrevision: String = "osrevision";
        /// Marketing OS version, e.g. `14.4.1`.
        osproductversion: String = "osproductversion";
        osproductversioncompat: String = "osproductversioncompat";
        osreleasetype: String = "osreleasetype";
        iossupportversion: String = "iossupportversion";
        bootargs: String = "bootargs";
        /// Linux only: the `uname -m` name of the kernel.
        arch: String = "arch";
    }
}

scoped_group!(
    /// `hw.*`
    Hardware
);

impl<'f, F: Fetch> Hardware<'f, F> {
    pub fn new(fetcher: &'f F) -> Self {
        Self::from_scope(Scope::new(fetcher, Namespace::Hardware))
    }

    properties! {
        activecpu: i32 = "activecpu";
        ncpu: i32 = "ncpu";
        pagesize: i64 = "pagesize";
        machine: String = "machine";
        /// Mach `cpu_type_t`.
        cputype: i32 = "cputype";
        /// Mach `cpu_subtype_t`.
        cpusubtype: i32 = "cpusubtype";
        cpufamily: u32 = "cpufamily";
        cpu64bit_capable: bool = "cpu64bit_capable";
        memsize: u64 = "memsize";
        /// Machine model identifier, e.g. `MacBookPro18,3`.
        model: String = "model";
        packages: i32 = "packages";
        /// Intel Macs only.
        cpufrequency: i64 = "cpufrequency";
        busfrequency: i64 = "busfrequency";
        nperflevels: i32 = "nperflevels";
    }

    pub fn perflevel(&self, index: u8) -> Perflevel<'f, F> {
        Perflevel::new(self.scope.fetcher(), index)
    }

    /// One group per performance level the kernel reports.
    pub fn perflevels(&self) -> ProbeResult<Vec<Perflevel<'f, F>>> {
        let count = self.nperflevels()?;
        let count = u8::try_from(count.max(0)).unwrap_or(u8::MAX);
        Ok((0..count).map(|index| self.perflevel(index)).collect())
    }
}

impl<F: Fetch> CpuInfo for Hardware<'_, F> {}

/// `hw.perflevel{N}.*`, one cluster of identical cores.
#[derive(Debug, Clone)]
pub struct Perflevel<'f, F> {
    index: u8,
    scope: Scope<'f, F>,
}

impl<'f, F: Fetch> Perflevel<'f, F> {
    pub fn new(fetcher: &'f F, index: u8) -> Self {
        Self {
            index,
            scope: Scope::new(fetcher, Namespace::Perflevel(index)),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn scope(&self) -> &Scope<'f, F> {
        &self.scope
    }

    properties! {
        /// `Performance` or `Efficiency` on Apple silicon.
        name: String = "name";
        cpusperl2: i32 = "cpusperl2";
        cpusperl3: i32 = "cpusperl3";
    }
}

impl<F: Fetch> Fetch for Perflevel<'_, F> {
    const FIXED_WIDTH: bool = F::FIXED_WIDTH;

    fn get_string(&self, name: &str) -> ProbeResult<String> {
        self.scope.get_string(name)
    }

    fn get_integer<T: crate::traits::Integer>(&self, name: &str) -> ProbeResult<T> {
        self.scope.get_integer(name)
    }
}

impl<F: Fetch> CpuInfo for Perflevel<'_, F> {}

scoped_group!(
    /// `machdep.cpu.*`, published by Intel kernels.
    MachdepCpu
);

impl<'f, F: Fetch> MachdepCpu<'f, F> {
    pub fn new(fetcher: &'f F) -> Self {
        Self::from_scope(Scope::new(fetcher, Namespace::MachdepCpu))
    }

    properties! {
        thread_count: i32 = "thread_count";
        core_count: i32 = "core_count";
        brand_string: String = "brand_string";
        cores_per_package: i32 = "cores_per_package";
        logical_per_package: i32 = "logical_per_package";
        family: i32 = "family";
        model: i32 = "model";
        stepping: i32 = "stepping";
        extfamily: i32 = "extfamily";
        extmodel: i32 = "extmodel";
        /// Space separated CPUID feature names.
        features: String = "features";
        leaf7_features: String = "leaf7_features";
    }

    pub fn features_list(&self) -> ProbeResult<Vec<String>> {
        Ok(self
            .features()?
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }
}

scoped_group!(
    /// `sysctl.proc_*`, the translation state of this process.
    SysctlProc
);

impl<'f, F: Fetch> SysctlProc<'f, F> {
    pub fn new(fetcher: &'f F) -> Self {
        Self::from_scope(Scope::new(fetcher, Namespace::Sysctl))
    }

    properties! {
        proc_native: bool = "proc_native";
        proc_translated: bool = "proc_translated";
    }
}
