//! One-shot summary of the processor and memory of this machine.
//!
//! Every field is optional: each is filled from the first source that
//! answers and left empty otherwise. On BSD kernels the `hw.*` and
//! `machdep.cpu.*` groups answer most of it, on Linux `/proc/cpuinfo` and
//! `/proc/meminfo` do, and on x86 CPUID supplies brand and vendor when
//! nothing else did.

use crate::arch::Architecture;
use crate::cpuid;
use crate::execution::ExecutionMode;
use hwprobe_core::{probe_debug, ProbeResult};
use hwprobe_platform::namespaces::{CacheSizes, CpuInfo, Hardware, MachdepCpu, Perflevel};
use hwprobe_platform::{CpuInfoRecord, Fetch, SystemRegistry};
use serde::Serialize;
use std::collections::BTreeSet;

/// Cores and threads of one performance level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerflevelSummary {
    pub index: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
}

impl PerflevelSummary {
    fn read<F: Fetch>(level: &Perflevel<'_, F>) -> Self {
        Self {
            index: level.index(),
            name: level.name().ok(),
            cores: count(level.core_count()),
            threads: count(level.thread_count()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HardwareSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<u32>,
    /// Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_frequency: Option<u64>,
    /// Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_frequency: Option<u64>,
    /// Bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu64bit_capable: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "CacheSizes::is_empty")]
    pub caches: CacheSizes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub perflevels: Vec<PerflevelSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_architecture: Option<Architecture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_architecture: Option<Architecture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
}

impl HardwareSummary {
    /// Summary of the running system.
    pub fn collect() -> Self {
        let registry = SystemRegistry::current();
        let mut summary = Self::from_fetcher(registry.system());

        if cfg!(any(target_os = "linux", target_os = "android")) {
            let proc = registry.proc();
            match proc.cpuinfo_items() {
                Ok(records) => summary.merge_cpuinfo(&records),
                Err(e) => probe_debug!(error = %e, "No cpuinfo for summary"),
            }
            match proc.get_string("meminfo") {
                Ok(text) => summary.merge_meminfo(&text),
                Err(e) => probe_debug!(error = %e, "No meminfo for summary"),
            }
            if summary.threads.is_none() {
                summary.threads = registry
                    .sys_cpu()
                    .cpu_numbers()
                    .ok()
                    .and_then(|cpus| u32::try_from(cpus.len()).ok())
                    .filter(|&n| n > 0);
            }
        }

        if summary.brand.is_none() {
            summary.brand = optional(cpuid::brand(), "brand");
        }
        if summary.vendor.is_none() {
            summary.vendor = optional(cpuid::vendor(), "vendor");
        }

        summary.process_architecture = optional(Architecture::current(), "process architecture");
        summary.machine_architecture = optional(Architecture::machine(), "machine architecture");
        summary.execution_mode = optional(ExecutionMode::current(), "execution mode");
        summary
    }

    /// The part of the summary that the dotted-name groups answer.
    pub fn from_fetcher<F: Fetch>(fetcher: &F) -> Self {
        let hardware = Hardware::new(fetcher);
        let machdep = MachdepCpu::new(fetcher);

        Self {
            brand: machdep.brand_string().ok().or_else(|| hardware.model().ok()),
            vendor: machdep.get_string("vendor").ok(),
            cores: count(hardware.core_count()).or_else(|| count(machdep.core_count())),
            threads: count(hardware.thread_count()).or_else(|| count(machdep.thread_count())),
            packages: count(hardware.packages()),
            cpu_frequency: hardware.cpufrequency().ok().and_then(|hz| u64::try_from(hz).ok()),
            bus_frequency: hardware.busfrequency().ok().and_then(|hz| u64::try_from(hz).ok()),
            memory_size: hardware.memsize().ok(),
            cpu64bit_capable: hardware.cpu64bit_capable().ok(),
            features: machdep.features_list().unwrap_or_default(),
            caches: hardware.cache_sizes(),
            perflevels: hardware
                .perflevels()
                .map(|levels| levels.iter().map(PerflevelSummary::read).collect())
                .unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Fill fields still empty from parsed `/proc/cpuinfo` records.
    pub fn merge_cpuinfo(&mut self, records: &[CpuInfoRecord]) {
        let Some(first) = records.first() else {
            return;
        };
        let text = |key: &str| first.get(key).map(|value| value.to_string());

        if self.brand.is_none() {
            self.brand = text("model_name");
        }
        if self.vendor.is_none() {
            self.vendor = text("vendor_id");
        }
        if self.threads.is_none() {
            self.threads = u32::try_from(records.len()).ok();
        }

        let packages: BTreeSet<i64> = records
            .iter()
            .filter_map(|record| record.get("physical_id")?.as_i64())
            .collect();
        if self.packages.is_none() && !packages.is_empty() {
            self.packages = u32::try_from(packages.len()).ok();
        }
        if self.cores.is_none() {
            let per_package = first.get("cpu_cores").and_then(|v| v.as_i64());
            let package_count = packages.len().max(1) as i64;
            self.cores = per_package
                .and_then(|n| n.checked_mul(package_count))
                .and_then(|n| u32::try_from(n).ok());
        }

        if self.cpu_frequency.is_none() {
            self.cpu_frequency = first
                .get("cpu_MHz")
                .and_then(|v| v.as_f64())
                .map(|mhz| (mhz * 1_000_000.0).round() as u64);
        }
        if self.features.is_empty() {
            // x86 calls the list "flags", arm64 "Features".
            if let Some(list) = text("flags").or_else(|| text("Features")) {
                self.features = list.split_whitespace().map(str::to_string).collect();
            }
        }
    }

    /// Fill the memory size from `/proc/meminfo` text.
    pub fn merge_meminfo(&mut self, text: &str) {
        if self.memory_size.is_some() {
            return;
        }
        self.memory_size = text.lines().find_map(|line| {
            let kib = line.strip_prefix("MemTotal:")?.trim().strip_suffix("kB")?;
            kib.trim().parse::<u64>().ok()?.checked_mul(1024)
        });
    }
}

fn count(value: ProbeResult<i32>) -> Option<u32> {
    value.ok().and_then(|n| u32::try_from(n).ok())
}

fn optional<T>(value: ProbeResult<T>, what: &str) -> Option<T> {
    match value {
        Ok(value) => Some(value),
        Err(e) => {
            probe_debug!(error = %e, field = what, "Summary field unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwprobe_platform::{parse_cpuinfo, MemoryFetcher};

    fn apple_silicon() -> MemoryFetcher {
        MemoryFetcher::new()
            .with_string("machdep.cpu.brand_string", "Apple M2 Pro")
            .with_integer("hw.physicalcpu", 10i32)
            .with_integer("hw.logicalcpu", 10i32)
            .with_integer("hw.packages", 1i32)
            .with_integer("hw.memsize", 34_359_738_368u64)
            .with_bool("hw.cpu64bit_capable", true)
            .with_integer("hw.l1icachesize", 131_072i64)
            .with_integer("hw.l2cachesize", 4_194_304i64)
            .with_integer("hw.nperflevels", 2i32)
            .with_string("hw.perflevel0.name", "Performance")
            .with_integer("hw.perflevel0.physicalcpu", 6i32)
            .with_integer("hw.perflevel0.logicalcpu", 6i32)
            .with_string("hw.perflevel1.name", "Efficiency")
            .with_integer("hw.perflevel1.physicalcpu_max", 4i32)
    }

    #[test]
    fn test_from_fetcher_reads_hardware_groups() {
        let summary = HardwareSummary::from_fetcher(&apple_silicon());

        assert_eq!(summary.brand.as_deref(), Some("Apple M2 Pro"));
        assert_eq!(summary.cores, Some(10));
        assert_eq!(summary.threads, Some(10));
        assert_eq!(summary.packages, Some(1));
        assert_eq!(summary.memory_size, Some(34_359_738_368));
        assert_eq!(summary.cpu64bit_capable, Some(true));
        assert_eq!(summary.caches.l1i, Some(131_072));
        assert_eq!(summary.caches.l3, None);
        assert_eq!(summary.cpu_frequency, None);

        assert_eq!(summary.perflevels.len(), 2);
        assert_eq!(summary.perflevels[0].name.as_deref(), Some("Performance"));
        assert_eq!(summary.perflevels[0].cores, Some(6));
        assert_eq!(summary.perflevels[1].cores, Some(4));
        assert_eq!(summary.perflevels[1].threads, None);
    }

    #[test]
    fn test_machdep_counts_and_features() {
        let fetcher = MemoryFetcher::new()
            .with_integer("machdep.cpu.core_count", 4i32)
            .with_integer("machdep.cpu.thread_count", 8i32)
            .with_string("machdep.cpu.vendor", "GenuineIntel")
            .with_string("machdep.cpu.features", "FPU VME  SSE3\tAVX1.0")
            .with_integer("hw.cpufrequency", 2_800_000_000i64);
        let summary = HardwareSummary::from_fetcher(&fetcher);

        assert_eq!(summary.cores, Some(4));
        assert_eq!(summary.threads, Some(8));
        assert_eq!(summary.vendor.as_deref(), Some("GenuineIntel"));
        assert_eq!(summary.features, vec!["FPU", "VME", "SSE3", "AVX1.0"]);
        assert_eq!(summary.cpu_frequency, Some(2_800_000_000));
    }

    #[test]
    fn test_empty_source_gives_empty_summary() {
        let summary = HardwareSummary::from_fetcher(&MemoryFetcher::new());
        assert_eq!(summary, HardwareSummary::default());
        assert_eq!(serde_json::to_string(&summary).unwrap(), "{}");
    }

    #[test]
    fn test_merge_cpuinfo() {
        let text = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU\n\
                    physical id\t: 0\ncpu cores\t: 2\ncpu MHz\t\t: 2199.998\nflags\t\t: fpu vme sse\n\n\
                    processor\t: 1\nphysical id\t: 1\ncpu cores\t: 2\n\n\
                    processor\t: 2\nphysical id\t: 0\n\n\
                    processor\t: 3\nphysical id\t: 1\n";
        let mut summary = HardwareSummary::default();
        summary.merge_cpuinfo(&parse_cpuinfo(text));

        assert_eq!(summary.brand.as_deref(), Some("Intel(R) Xeon(R) CPU"));
        assert_eq!(summary.vendor.as_deref(), Some("GenuineIntel"));
        assert_eq!(summary.threads, Some(4));
        assert_eq!(summary.packages, Some(2));
        assert_eq!(summary.cores, Some(4));
        assert_eq!(summary.cpu_frequency, Some(2_199_998_000));
        assert_eq!(summary.features, vec!["fpu", "vme", "sse"]);
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let mut summary = HardwareSummary {
            brand: Some("Apple M1".to_string()),
            threads: Some(8),
            memory_size: Some(1),
            ..HardwareSummary::default()
        };
        summary.merge_cpuinfo(&parse_cpuinfo("model name\t: Other\n"));
        summary.merge_meminfo("MemTotal:       16318412 kB\n");

        assert_eq!(summary.brand.as_deref(), Some("Apple M1"));
        assert_eq!(summary.threads, Some(8));
        assert_eq!(summary.memory_size, Some(1));
    }

    #[test]
    fn test_merge_meminfo() {
        let mut summary = HardwareSummary::default();
        summary.merge_meminfo("MemTotal:       16318412 kB\nMemFree:         1000 kB\n");
        assert_eq!(summary.memory_size, Some(16_318_412 * 1024));

        let mut summary = HardwareSummary::default();
        summary.merge_meminfo("MemFree: 10 kB\n");
        assert_eq!(summary.memory_size, None);
    }

    #[test]
    fn test_oversized_counts_are_dropped() {
        let mut summary = HardwareSummary::default();
        summary.merge_meminfo("MemTotal: 18446744073709551615 kB\n");
        assert_eq!(summary.memory_size, None);

        let text = "processor\t: 0\nphysical id\t: 0\ncpu cores\t: 9223372036854775807\n\n\
                    processor\t: 1\nphysical id\t: 1\ncpu cores\t: 9223372036854775807\n";
        let mut summary = HardwareSummary::default();
        summary.merge_cpuinfo(&parse_cpuinfo(text));
        assert_eq!(summary.cores, None);
        assert_eq!(summary.packages, Some(2));
        assert_eq!(summary.threads, Some(2));
    }

    #[test]
    fn test_arm_features_key() {
        let mut summary = HardwareSummary::default();
        summary.merge_cpuinfo(&parse_cpuinfo("processor\t: 0\nFeatures\t: fp asimd evtstrm\n"));
        assert_eq!(summary.features, vec!["fp", "asimd", "evtstrm"]);
        assert_eq!(summary.cores, None);
    }
}
