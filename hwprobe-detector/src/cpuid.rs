//! CPUID register queries and decoding.
//!
//! Queries go through a process-wide list cache. With storing enabled (the
//! default) every hardware result is appended; with recovery enabled, a
//! query is answered by the most recently appended entry for the same
//! `(leaf, sub_leaf)` pair before the instruction is executed. Seeding the
//! cache and turning recovery on lets the decoders run against any CPU,
//! including on targets without the instruction.
//!
//! The decoders themselves are plain functions over register values and
//! compile everywhere.

use hwprobe_core::{probe_debug, probe_trace, ProbeError, ProbeResult};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::{PoisonError, RwLock};

pub const LEAF_VENDOR: u32 = 0x0000_0000;
pub const LEAF_SIGNATURE: u32 = 0x0000_0001;
pub const LEAF_EXTENDED_MAX: u32 = 0x8000_0000;
pub const LEAF_BRAND: [u32; 3] = [0x8000_0002, 0x8000_0003, 0x8000_0004];

/// Register contents after one CPUID query, with the inputs that produced
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Registers {
    /// EAX input.
    pub leaf: u32,
    /// ECX input, when the two-input form was used.
    pub sub_leaf: Option<u32>,
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

struct CacheState {
    store: bool,
    recover: bool,
    entries: Vec<Registers>,
}

static CACHE: Lazy<RwLock<CacheState>> = Lazy::new(|| {
    RwLock::new(CacheState {
        store: true,
        recover: false,
        entries: Vec::new(),
    })
});

/// Controls for the process-wide query cache.
pub struct CpuIdCache;

impl CpuIdCache {
    pub fn set_store_in_cache(store: bool) {
        CACHE.write().unwrap_or_else(PoisonError::into_inner).store = store;
    }

    pub fn store_in_cache() -> bool {
        CACHE.read().unwrap_or_else(PoisonError::into_inner).store
    }

    pub fn set_recover_from_cache(recover: bool) {
        CACHE.write().unwrap_or_else(PoisonError::into_inner).recover = recover;
    }

    pub fn recover_from_cache() -> bool {
        CACHE.read().unwrap_or_else(PoisonError::into_inner).recover
    }

    /// Append an entry; it shadows earlier entries for the same query.
    pub fn insert(registers: Registers) {
        CACHE
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .push(registers);
    }

    pub fn clear() {
        CACHE
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }

    /// Every cached entry, oldest first.
    pub fn snapshot() -> Vec<Registers> {
        CACHE
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    fn lookup(leaf: u32, sub_leaf: Option<u32>) -> Option<Registers> {
        let cache = CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if !cache.recover {
            return None;
        }
        cache
            .entries
            .iter()
            .rev()
            .find(|r| r.leaf == leaf && r.sub_leaf == sub_leaf)
            .copied()
    }

    /// Store a hardware result, replacing any entry for the same query.
    fn remember(registers: Registers) {
        let mut cache = CACHE.write().unwrap_or_else(PoisonError::into_inner);
        if !cache.store {
            return;
        }
        cache
            .entries
            .retain(|r| (r.leaf, r.sub_leaf) != (registers.leaf, registers.sub_leaf));
        cache.entries.push(registers);
    }
}

impl Registers {
    pub fn new(leaf: u32, sub_leaf: Option<u32>, eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        Self {
            leaf,
            sub_leaf,
            eax,
            ebx,
            ecx,
            edx,
        }
    }

    /// Query `leaf` (and `sub_leaf`), consulting the cache first when
    /// recovery is enabled.
    pub fn from(leaf: u32, sub_leaf: Option<u32>) -> ProbeResult<Self> {
        if let Some(cached) = CpuIdCache::lookup(leaf, sub_leaf) {
            probe_trace!(leaf = %format!("{:#x}", leaf), "CPUID answered from cache");
            return Ok(cached);
        }
        Self::from_hardware(leaf, sub_leaf)
    }

    /// Execute the instruction regardless of the recovery setting. The
    /// result is still stored when storing is enabled.
    pub fn from_hardware(leaf: u32, sub_leaf: Option<u32>) -> ProbeResult<Self> {
        let registers = execute(leaf, sub_leaf)?;
        probe_debug!(
            leaf = %format!("{:#x}", leaf),
            eax = %format!("{:#x}", registers.eax),
            ebx = %format!("{:#x}", registers.ebx),
            ecx = %format!("{:#x}", registers.ecx),
            edx = %format!("{:#x}", registers.edx),
            "CPUID executed"
        );
        CpuIdCache::remember(registers);
        Ok(registers)
    }

    pub fn as_array(&self) -> [u32; 4] {
        [self.eax, self.ebx, self.ecx, self.edx]
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn execute(leaf: u32, sub_leaf: Option<u32>) -> ProbeResult<Registers> {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::{__cpuid_count, __get_cpuid_max};
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::{__cpuid_count, __get_cpuid_max};

    // SAFETY: CPUID is present on every CPU this target runs on.
    let (max_leaf, _) = unsafe { __get_cpuid_max(leaf & LEAF_EXTENDED_MAX) };
    if leaf > max_leaf {
        return Err(ProbeError::Unsupported("CPUID leaf above the supported maximum"));
    }

    // SAFETY: as above, and `leaf` is within the reported range.
    let result = unsafe { __cpuid_count(leaf, sub_leaf.unwrap_or(0)) };
    Ok(Registers::new(
        leaf,
        sub_leaf,
        result.eax,
        result.ebx,
        result.ecx,
        result.edx,
    ))
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn execute(_leaf: u32, _sub_leaf: Option<u32>) -> ProbeResult<Registers> {
    Err(ProbeError::Unsupported("CPUID on a non-x86 target"))
}

/// Bits `[first, last]` of `value`, shifted down.
fn bits(value: u32, first: u32, last: u32) -> u32 {
    let width = last - first + 1;
    let mask = if width >= 32 { u32::MAX } else { (1 << width) - 1 };
    (value >> first) & mask
}

/// Processor signature fields of leaf 1 EAX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub stepping: u32,
    pub base_model: u32,
    pub base_family: u32,
    pub processor_type: u32,
    pub ext_model: u32,
    pub ext_family: u32,
}

impl Signature {
    pub fn from_eax(eax: u32) -> Self {
        Self {
            stepping: bits(eax, 0, 3),
            base_model: bits(eax, 4, 7),
            base_family: bits(eax, 8, 11),
            processor_type: bits(eax, 12, 13),
            ext_model: bits(eax, 16, 19),
            ext_family: bits(eax, 20, 27),
        }
    }

    /// Model with the extended bits folded in for families 6 and 15.
    pub fn model(&self) -> u32 {
        if self.base_family == 6 || self.base_family == 15 {
            (self.ext_model << 4) + self.base_model
        } else {
            self.base_model
        }
    }

    /// Family with the extended family added for family 15.
    pub fn family(&self) -> u32 {
        if self.base_family == 15 {
            self.base_family + self.ext_family
        } else {
            self.base_family
        }
    }
}

/// Assemble the brand string from the three brand leaves.
pub fn brand_string(part1: &Registers, part2: &Registers, part3: &Registers) -> String {
    let mut bytes: Vec<u8> = [part1, part2, part3]
        .iter()
        .flat_map(|r| r.as_array())
        .flat_map(u32::to_le_bytes)
        .collect();
    if let Some(last) = bytes.last_mut() {
        *last = 0;
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// The 12-character vendor id of leaf 0 (EBX, EDX, ECX).
pub fn vendor_string(leaf0: &Registers) -> String {
    let bytes: Vec<u8> = [leaf0.ebx, leaf0.edx, leaf0.ecx]
        .into_iter()
        .flat_map(u32::to_le_bytes)
        .collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

pub fn signature() -> ProbeResult<Signature> {
    Ok(Signature::from_eax(Registers::from(LEAF_SIGNATURE, None)?.eax))
}

pub fn stepping() -> ProbeResult<u32> {
    Ok(signature()?.stepping)
}

pub fn model() -> ProbeResult<u32> {
    Ok(signature()?.model())
}

pub fn family() -> ProbeResult<u32> {
    Ok(signature()?.family())
}

pub fn processor_type() -> ProbeResult<u32> {
    Ok(signature()?.processor_type)
}

pub fn ext_family() -> ProbeResult<u32> {
    Ok(signature()?.ext_family)
}

pub fn ext_model() -> ProbeResult<u32> {
    Ok(signature()?.ext_model)
}

pub fn brand() -> ProbeResult<String> {
    let [a, b, c] = LEAF_BRAND;
    Ok(brand_string(
        &Registers::from(a, None)?,
        &Registers::from(b, None)?,
        &Registers::from(c, None)?,
    ))
}

pub fn vendor() -> ProbeResult<String> {
    Ok(vendor_string(&Registers::from(LEAF_VENDOR, None)?))
}
