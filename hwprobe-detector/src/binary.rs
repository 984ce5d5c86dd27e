//! Architectures the running executable was built for.
//!
//! On Apple platforms the executable's Mach-O header is read: a universal
//! binary lists one slice per architecture, a thin one has a single header.
//! Elsewhere the executable can only contain the compiled architecture.

use crate::arch::{Architecture, HardwareIdentity};
use hwprobe_core::{ProbeError, ProbeResult};
use once_cell::sync::OnceCell;

const FAT_MAGIC: u32 = 0xcafe_babe;
const FAT_MAGIC_64: u32 = 0xcafe_babf;
const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;

const FAT_HEADER_LEN: usize = 8;
const FAT_ARCH_LEN: usize = 20;
const FAT_ARCH_64_LEN: usize = 32;

static EXECUTABLE: OnceCell<Vec<Architecture>> = OnceCell::new();

/// Architectures of the current executable, de-duplicated in the order the
/// file lists them. Computed once.
pub fn executable_architectures() -> ProbeResult<Vec<Architecture>> {
    EXECUTABLE
        .get_or_try_init(read_executable_architectures)
        .cloned()
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn read_executable_architectures() -> ProbeResult<Vec<Architecture>> {
    use hwprobe_core::probe_debug;
    use std::io::Read;

    // Every header fits in the first 64 KiB.
    const HEADER_READ_LIMIT: u64 = 64 * 1024;

    let path = std::env::current_exe()?;
    let mut header = Vec::new();
    std::fs::File::open(&path)?
        .take(HEADER_READ_LIMIT)
        .read_to_end(&mut header)?;

    let archs = parse_macho_architectures(&header)?;
    probe_debug!(path = %path.display(), count = archs.len(), "Read executable architectures");
    Ok(archs)
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
fn read_executable_architectures() -> ProbeResult<Vec<Architecture>> {
    Ok(Architecture::binary().into_iter().collect())
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
}

fn truncated() -> ProbeError {
    ProbeError::Parse("Truncated Mach-O header".to_string())
}

/// Architectures named by a Mach-O or universal header.
pub fn parse_macho_architectures(bytes: &[u8]) -> ProbeResult<Vec<Architecture>> {
    let magic = be_u32(bytes, 0).ok_or_else(truncated)?;

    let slices: Vec<(i32, i32, bool)> = match magic {
        FAT_MAGIC | FAT_MAGIC_64 => {
            let entry_len = if magic == FAT_MAGIC {
                FAT_ARCH_LEN
            } else {
                FAT_ARCH_64_LEN
            };
            let count = be_u32(bytes, 4).ok_or_else(truncated)? as usize;
            (0..count)
                .map(|i| {
                    let at = FAT_HEADER_LEN + i * entry_len;
                    let cputype = be_u32(bytes, at).ok_or_else(truncated)? as i32;
                    let cpusubtype = be_u32(bytes, at + 4).ok_or_else(truncated)? as i32;
                    Ok((cputype, cpusubtype, false))
                })
                .collect::<ProbeResult<_>>()?
        }
        _ => vec![thin_header(bytes)?],
    };

    let mut archs = Vec::new();
    for (cputype, cpusubtype, little_endian) in slices {
        let identity = HardwareIdentity {
            cputype,
            cpusubtype,
            cpufamily: 0,
            cpu64bit_capable: None,
            little_endian,
        };
        match Architecture::classify(&identity) {
            Some(arch) if !archs.contains(&arch) => archs.push(arch),
            Some(_) => {}
            None => hwprobe_core::probe_debug!(cputype, "Skipping unknown executable slice"),
        }
    }
    Ok(archs)
}

/// Type and subtype of a single-architecture header in either byte order.
fn thin_header(bytes: &[u8]) -> ProbeResult<(i32, i32, bool)> {
    let raw: [u8; 12] = bytes
        .get(..12)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(truncated)?;
    let word = |i: usize, little: bool| {
        let b = [raw[i], raw[i + 1], raw[i + 2], raw[i + 3]];
        if little {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        }
    };

    let little = match (word(0, true), word(0, false)) {
        (MH_MAGIC | MH_MAGIC_64, _) => true,
        (_, MH_MAGIC | MH_MAGIC_64) => false,
        _ => return Err(ProbeError::Parse("Not a Mach-O executable".to_string())),
    };
    Ok((word(4, little) as i32, word(8, little) as i32, little))
}
