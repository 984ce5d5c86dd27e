//! Detection against a captured `/proc` and `/sys` tree.

use anyhow::Result;
use hwprobe_detector::HardwareSummary;
use hwprobe_platform::config::QueryStorageConfig;
use hwprobe_platform::{Fetch, ProbeConfig, SystemRegistry};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CPUINFO: &str = "processor\t: 0\n\
vendor_id\t: GenuineIntel\n\
model name\t: Intel(R) Core(TM) i7-7700HQ CPU @ 2.80GHz\n\
physical id\t: 0\n\
cpu cores\t: 2\n\
cache size\t: 6144 KB\n\
flags\t\t: fpu vme de pse\n\
\n\
processor\t: 1\n\
vendor_id\t: GenuineIntel\n\
physical id\t: 0\n\
cpu cores\t: 2\n\
cache size\t: 6144 KB\n";

struct Fixture {
    _temp_dir: TempDir,
    config: ProbeConfig,
}

impl Fixture {
    fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        write(root, "proc/cpuinfo", CPUINFO)?;
        write(root, "proc/meminfo", "MemTotal:        8000000 kB\n")?;
        write(root, "proc/sys/kernel/ostype", "Linux\n")?;
        write(root, "proc/sys/kernel/hostname", "fixture\n")?;
        write(root, "proc/sys/kernel/osrelease", "6.8.0-40-generic\n")?;
        write(root, "proc/sys/kernel/version", "#40-Ubuntu SMP PREEMPT_DYNAMIC\n")?;
        write(root, "proc/sys/kernel/arch", "x86_64\n")?;
        write(root, "proc/sys/kernel/pid_max", "4194304\n")?;
        write(root, "sys/devices/system/cpu/online", "0-1\n")?;
        write(root, "sys/devices/system/cpu/cpu0/topology/core_id", "0\n")?;
        write(root, "sys/devices/system/cpu/cpu1/online", "1\n")?;
        write(root, "sys/devices/system/cpu/cpu1/topology/core_id", "1\n")?;

        let config = ProbeConfig {
            proc_root: root.join("proc"),
            sys_root: root.join("sys"),
            proc_sys_root: root.join("proc/sys"),
            query_storage: QueryStorageConfig::default(),
            diagnostics: true,
        };
        Ok(Self {
            _temp_dir: temp_dir,
            config,
        })
    }

    fn registry(&self) -> SystemRegistry {
        SystemRegistry::with_config(self.config.clone())
    }
}

fn write(root: &Path, relative: &str, contents: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[test]
fn test_cpuinfo_records_from_fixture() -> Result<()> {
    let fixture = Fixture::new()?;
    let registry = fixture.registry();

    let records = registry.proc().cpuinfo_items()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["cache_size"].as_i64(), Some(6144));
    assert_eq!(
        records[0]["model_name"].as_str(),
        Some("Intel(R) Core(TM) i7-7700HQ CPU @ 2.80GHz")
    );
    Ok(())
}

#[test]
fn test_sys_cpu_from_fixture() -> Result<()> {
    let fixture = Fixture::new()?;
    let registry = fixture.registry();
    let sys_cpu = registry.sys_cpu();

    assert_eq!(sys_cpu.online()?, "0-1");
    assert_eq!(sys_cpu.cpu_numbers()?, vec![0, 1]);
    assert!(sys_cpu.cpu(1).online()?);
    assert!(sys_cpu.cpu(0).online().unwrap_err().is_not_found());
    assert_eq!(sys_cpu.cpu(1).topology().core_id()?, 1);
    Ok(())
}

#[test]
fn test_summary_from_fixture_records() -> Result<()> {
    let fixture = Fixture::new()?;
    let registry = fixture.registry();

    let mut summary = HardwareSummary::default();
    summary.merge_cpuinfo(&registry.proc().cpuinfo_items()?);
    summary.merge_meminfo(&registry.proc().get_string("meminfo")?);

    assert_eq!(summary.vendor.as_deref(), Some("GenuineIntel"));
    assert_eq!(summary.threads, Some(2));
    assert_eq!(summary.cores, Some(2));
    assert_eq!(summary.packages, Some(1));
    assert_eq!(summary.memory_size, Some(8_000_000 * 1024));
    assert_eq!(summary.features, vec!["fpu", "vme", "de", "pse"]);
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_uname_from_fixture() -> Result<()> {
    use hwprobe_detector::{UnameField, UnameRecord};

    let fixture = Fixture::new()?;
    let registry = fixture.registry();

    let record = UnameRecord::read(registry.system())?;
    assert_eq!(record.format(&[UnameField::All]).split(' ').next(), Some("Linux"));
    assert_eq!(
        record.format(&[UnameField::Hostname, UnameField::Machine]),
        "fixture x86_64"
    );
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_registry_records_reads() -> Result<()> {
    let fixture = Fixture::new()?;
    let registry = fixture.registry();

    assert_eq!(registry.kernel().hostname()?, "fixture");
    assert_eq!(registry.system().get_integer::<u32>("kernel.pid_max")?, 4_194_304);

    let storage = registry.storage().read().unwrap();
    assert_eq!(storage.records()["kernel.hostname"].text(), "fixture");
    assert_eq!(storage.records()["kernel.pid_max"].text(), "4194304");
    assert_eq!(storage.records()["kernel.pid_max"].width(), None);
    Ok(())
}

#[test]
fn test_replay_overrides_the_tree() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut config = fixture.config.clone();
    config.query_storage.recover_every_query = true;
    let registry = SystemRegistry::with_config(config);

    registry
        .storage()
        .write()
        .unwrap()
        .load([("kern.ostype".to_string(), "Replayed".to_string())]);

    assert_eq!(registry.system().get_string("kern.ostype")?, "Replayed");
    Ok(())
}
