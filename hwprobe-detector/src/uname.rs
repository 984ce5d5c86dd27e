//! `uname(1)` emulation on top of the kernel and hardware groups.

use crate::arch::Architecture;
use hwprobe_core::{probe_debug, ProbeResult};
use hwprobe_platform::namespaces::Kernel;
use hwprobe_platform::Fetch;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// The five strings `uname(3)` fills in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnameRecord {
    pub sysname: String,
    pub nodename: String,
    pub release: String,
    pub version: String,
    pub machine: String,
}

static CACHED: Lazy<RwLock<Option<UnameRecord>>> = Lazy::new(|| RwLock::new(None));

impl UnameRecord {
    /// The record of the running system, read on first use or when
    /// `force_refresh` is set.
    pub fn fetch(force_refresh: bool) -> ProbeResult<Self> {
        if !force_refresh {
            let cached = CACHED.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(record) = cached.as_ref() {
                return Ok(record.clone());
            }
        }

        let record = Self::read(hwprobe_platform::current().system())?;
        *CACHED.write().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(record)
    }

    pub fn read<F: Fetch>(fetcher: &F) -> ProbeResult<Self> {
        let kernel = Kernel::new(fetcher);
        let record = Self {
            sysname: kernel.ostype()?,
            nodename: kernel.hostname()?,
            release: kernel.osrelease()?,
            version: kernel.version()?,
            machine: read_machine(fetcher)?,
        };
        probe_debug!(sysname = %record.sysname, machine = %record.machine, "Read uname record");
        Ok(record)
    }

    pub fn value(&self, field: UnameField) -> String {
        match field {
            UnameField::KernelName => self.sysname.clone(),
            UnameField::Hostname => self.nodename.clone(),
            UnameField::KernelRelease => self.release.clone(),
            UnameField::KernelVersion => self.version.clone(),
            UnameField::Machine => self.machine.clone(),
            UnameField::ProcessorType => match Architecture::current() {
                Ok(arch) => arch.generic_processor_type().to_string(),
                Err(_) => self.machine.clone(),
            },
            UnameField::All => expand_fields(&[UnameField::All])
                .into_iter()
                .map(|f| self.value(f))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Values of the requested fields in output order.
    pub fn select(&self, fields: &[UnameField]) -> IndexMap<UnameField, String> {
        expand_fields(fields)
            .into_iter()
            .map(|field| (field, self.value(field)))
            .collect()
    }

    /// The requested fields joined by single spaces.
    pub fn format(&self, fields: &[UnameField]) -> String {
        self.select(fields)
            .into_values()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(target_os = "linux")]
fn read_machine<F: Fetch>(fetcher: &F) -> ProbeResult<String> {
    match Kernel::new(fetcher).arch() {
        Err(e) if e.is_not_found() => Ok(std::env::consts::ARCH.to_string()),
        other => other,
    }
}

#[cfg(not(target_os = "linux"))]
fn read_machine<F: Fetch>(fetcher: &F) -> ProbeResult<String> {
    hwprobe_platform::namespaces::Hardware::new(fetcher).machine()
}

/// A field selector, named after the `uname` flag that requests it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnameField {
    All,
    Machine,
    Hostname,
    ProcessorType,
    KernelName,
    KernelRelease,
    KernelVersion,
}

impl UnameField {
    pub fn flag(&self) -> char {
        match self {
            UnameField::All => 'a',
            UnameField::Machine => 'm',
            UnameField::Hostname => 'n',
            UnameField::ProcessorType => 'p',
            UnameField::KernelName => 's',
            UnameField::KernelRelease => 'r',
            UnameField::KernelVersion => 'v',
        }
    }

    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'a' => Some(UnameField::All),
            'm' => Some(UnameField::Machine),
            'n' => Some(UnameField::Hostname),
            'p' => Some(UnameField::ProcessorType),
            's' => Some(UnameField::KernelName),
            'r' => Some(UnameField::KernelRelease),
            'v' => Some(UnameField::KernelVersion),
            _ => None,
        }
    }
}

impl fmt::Display for UnameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.flag())
    }
}

/// What `All` stands for. The processor type is not part of it.
const ALL_FIELDS: [UnameField; 5] = [
    UnameField::KernelName,
    UnameField::Hostname,
    UnameField::KernelRelease,
    UnameField::KernelVersion,
    UnameField::Machine,
];

/// Resolve a request into concrete fields: no fields means the kernel
/// name, `All` expands in place, and repeats are dropped keeping the first.
pub fn expand_fields(fields: &[UnameField]) -> Vec<UnameField> {
    if fields.is_empty() {
        return vec![UnameField::KernelName];
    }

    let mut expanded: Vec<UnameField> = Vec::new();
    for &field in fields {
        let items: &[UnameField] = if field == UnameField::All {
            &ALL_FIELDS
        } else {
            std::slice::from_ref(&field)
        };
        for &item in items {
            if !expanded.contains(&item) {
                expanded.push(item);
            }
        }
    }
    expanded
}

pub fn uname_map(
    fields: &[UnameField],
    force_refresh: bool,
) -> ProbeResult<IndexMap<UnameField, String>> {
    Ok(UnameRecord::fetch(force_refresh)?.select(fields))
}

pub fn uname_string(fields: &[UnameField], force_refresh: bool) -> ProbeResult<String> {
    Ok(UnameRecord::fetch(force_refresh)?.format(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwprobe_platform::{MemoryFetcher, Namespace};

    fn darwin() -> MemoryFetcher {
        let kernel = Namespace::Kernel.prefix();
        MemoryFetcher::new()
            .with_string(format!("{}ostype", kernel), "Darwin")
            .with_string(format!("{}hostname", kernel), "studio.local")
            .with_string(format!("{}osrelease", kernel), "23.4.0")
            .with_string(
                format!("{}version", kernel),
                "Darwin Kernel Version 23.4.0: Fri Mar 15 00:10:42 PDT 2024",
            )
            .with_string(format!("{}arch", kernel), "arm64")
            .with_string("hw.machine", "arm64")
    }

    #[test]
    fn test_all_expands_without_processor_type() {
        assert_eq!(expand_fields(&[UnameField::All]), ALL_FIELDS.to_vec());
        assert!(!expand_fields(&[UnameField::All]).contains(&UnameField::ProcessorType));
    }

    #[test]
    fn test_expansion_deduplicates_in_first_seen_order() {
        assert_eq!(
            expand_fields(&[
                UnameField::Machine,
                UnameField::All,
                UnameField::KernelName,
                UnameField::Machine,
            ]),
            vec![
                UnameField::Machine,
                UnameField::KernelName,
                UnameField::Hostname,
                UnameField::KernelRelease,
                UnameField::KernelVersion,
            ]
        );
        assert_eq!(
            expand_fields(&[UnameField::ProcessorType, UnameField::All]).len(),
            6
        );
    }

    #[test]
    fn test_empty_request_is_kernel_name() {
        assert_eq!(expand_fields(&[]), vec![UnameField::KernelName]);
    }

    #[test]
    fn test_read_and_format() {
        let record = UnameRecord::read(&darwin()).unwrap();
        assert_eq!(record.sysname, "Darwin");
        assert_eq!(record.machine, "arm64");

        assert_eq!(record.format(&[]), "Darwin");
        assert_eq!(
            record.format(&[UnameField::KernelName, UnameField::KernelRelease]),
            "Darwin 23.4.0"
        );
        assert_eq!(
            record.format(&[UnameField::All]),
            "Darwin studio.local 23.4.0 Darwin Kernel Version 23.4.0: Fri Mar 15 00:10:42 PDT 2024 arm64"
        );
        assert!(!record.format(&[UnameField::All]).ends_with(' '));
    }

    #[test]
    fn test_select_keeps_request_order() {
        let record = UnameRecord::read(&darwin()).unwrap();
        let map = record.select(&[UnameField::Machine, UnameField::Hostname]);
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, vec![UnameField::Machine, UnameField::Hostname]);
        assert_eq!(map[&UnameField::Hostname], "studio.local");
    }

    #[test]
    fn test_processor_type_is_generic() {
        let record = UnameRecord::read(&darwin()).unwrap();
        let processor = record.value(UnameField::ProcessorType);
        match Architecture::current() {
            Ok(arch) => assert_eq!(processor, arch.generic_processor_type().to_string()),
            Err(_) => assert_eq!(processor, "arm64"),
        }
    }

    #[test]
    fn test_missing_kernel_entry_fails() {
        let kernel = Namespace::Kernel.prefix();
        let fetcher = MemoryFetcher::new().with_string(format!("{}ostype", kernel), "Linux");
        assert!(UnameRecord::read(&fetcher).unwrap_err().is_not_found());
    }

    #[test]
    fn test_flags() {
        for field in [
            UnameField::All,
            UnameField::Machine,
            UnameField::Hostname,
            UnameField::ProcessorType,
            UnameField::KernelName,
            UnameField::KernelRelease,
            UnameField::KernelVersion,
        ] {
            assert_eq!(UnameField::from_flag(field.flag()), Some(field));
        }
        assert_eq!(UnameField::from_flag('x'), None);
        assert_eq!(UnameField::All.to_string(), "-a");
    }
}
