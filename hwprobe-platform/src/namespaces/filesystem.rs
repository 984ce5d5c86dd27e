//! Linux `/proc` and `/sys/devices/system/cpu` groups.

use crate::cpuinfo::{parse_cpuinfo, CpuInfoRecord};
use crate::providers::ProcFsFetcher;
use crate::traits::{Fetch, Integer};
use hwprobe_core::{probe_error, ProbeResult};

/// Implement `Fetch` for a wrapper by delegating to its fetcher field.
macro_rules! delegate_fetch {
    ($name:ident $(<$lt:lifetime>)?) => {
        impl$(<$lt>)? Fetch for $name$(<$lt>)? {
            const FIXED_WIDTH: bool = false;

            fn get_string(&self, name: &str) -> ProbeResult<String> {
                self.fetcher.get_string(name)
            }

            fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
                self.fetcher.get_integer(name)
            }
        }
    };
}

/// The `/proc` tree.
#[derive(Debug, Clone, Copy)]
pub struct Proc<'a> {
    fetcher: &'a ProcFsFetcher,
}

impl<'a> Proc<'a> {
    pub fn new(fetcher: &'a ProcFsFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &'a ProcFsFetcher {
        self.fetcher
    }

    properties! {
        /// Kernel banner line.
        version: String = "version";
        cpuinfo: String = "cpuinfo";
    }

    /// `/proc/cpuinfo` split into one record per logical processor.
    pub fn cpuinfo_items(&self) -> ProbeResult<Vec<CpuInfoRecord>> {
        let text = self.cpuinfo().map_err(|e| {
            probe_error!(error = %e, "Can't read cpuinfo");
            e
        })?;
        Ok(parse_cpuinfo(&text))
    }
}

delegate_fetch!(Proc<'a>);

/// The `/sys/devices/system/cpu` tree.
#[derive(Debug, Clone, Copy)]
pub struct SysCpu<'a> {
    fetcher: &'a ProcFsFetcher,
}

impl<'a> SysCpu<'a> {
    pub fn new(fetcher: &'a ProcFsFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &'a ProcFsFetcher {
        self.fetcher
    }

    properties! {
        /// CPU list such as `0-7`.
        online: String = "online";
        offline: String = "offline";
        possible: String = "possible";
        present: String = "present";
        modalias: String = "modalias";
        /// PMU model, x86 only.
        pmu_name: String = "caps.pmu_name";
    }

    pub fn cpu(&self, number: u32) -> CpuEntry {
        CpuEntry::new(self.fetcher, number)
    }

    /// Numbers of every `cpuN` directory, ascending.
    pub fn cpu_numbers(&self) -> ProbeResult<Vec<u32>> {
        let mut numbers: Vec<u32> = self
            .fetcher
            .list_directory_entries("")?
            .iter()
            .filter_map(|name| name.strip_prefix("cpu")?.parse().ok())
            .collect();
        numbers.sort_unstable();
        Ok(numbers)
    }
}

delegate_fetch!(SysCpu<'a>);

/// One `cpuN` directory.
#[derive(Debug, Clone)]
pub struct CpuEntry {
    number: u32,
    fetcher: ProcFsFetcher,
}

impl CpuEntry {
    pub fn new(sys_cpu: &ProcFsFetcher, number: u32) -> Self {
        Self {
            number,
            fetcher: sys_cpu.child(&format!("cpu{}", number)),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Absent for CPUs that cannot be taken offline, typically `cpu0`.
    pub fn online(&self) -> ProbeResult<bool> {
        self.get_bool("online")
    }

    pub fn topology(&self) -> Topology {
        Topology {
            fetcher: self.fetcher.child("topology"),
        }
    }
}

delegate_fetch!(CpuEntry);

/// `cpuN/topology`.
///
/// Ids are integers (`-1` when unknown); `*_list` entries are CPU lists and
/// the bare entries are hexadecimal masks, both returned as text.
#[derive(Debug, Clone)]
pub struct Topology {
    fetcher: ProcFsFetcher,
}

impl Topology {
    properties! {
        core_id: i32 = "core_id";
        die_id: i32 = "die_id";
        physical_package_id: i32 = "physical_package_id";
        core_cpus: String = "core_cpus";
        core_cpus_list: String = "core_cpus_list";
        core_siblings: String = "core_siblings";
        core_siblings_list: String = "core_siblings_list";
        die_cpus: String = "die_cpus";
        die_cpus_list: String = "die_cpus_list";
        package_cpus: String = "package_cpus";
        package_cpus_list: String = "package_cpus_list";
        thread_siblings: String = "thread_siblings";
        thread_siblings_list: String = "thread_siblings_list";
    }
}

delegate_fetch!(Topology);
