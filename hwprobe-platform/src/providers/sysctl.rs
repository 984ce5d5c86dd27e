//! `sysctlbyname(3)` value source for BSD-derived kernels.

use crate::traits::{Fetch, Integer};
use hwprobe_core::{probe_debug, probe_error, ProbeError, ProbeResult};
use std::ffi::CString;
use std::io;
use std::ptr;

/// Reads values straight from the kernel by dotted name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SysctlFetcher;

impl SysctlFetcher {
    pub fn new() -> Self {
        Self
    }

    /// Copy the raw value of `name` into `buf`, returning the byte count
    /// the kernel reported.
    fn read_raw(name: &str, c_name: &CString, buf: &mut [u8]) -> ProbeResult<usize> {
        let mut len: libc::size_t = buf.len();
        // SAFETY: `c_name` is NUL-terminated, `buf` is valid for `len` bytes
        // and `len` outlives the call. No new value is written.
        let rc = unsafe {
            libc::sysctlbyname(
                c_name.as_ptr(),
                buf.as_mut_ptr().cast(),
                &mut len,
                ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(os_error(name));
        }
        Ok(len)
    }

    /// Ask the kernel how many bytes the value of `name` occupies.
    fn value_size(name: &str, c_name: &CString) -> ProbeResult<usize> {
        let mut len: libc::size_t = 0;
        // SAFETY: a null output buffer only queries the size into `len`.
        let rc = unsafe {
            libc::sysctlbyname(
                c_name.as_ptr(),
                ptr::null_mut(),
                &mut len,
                ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(os_error(name));
        }
        Ok(len)
    }
}

fn c_name(name: &str) -> ProbeResult<CString> {
    CString::new(name).map_err(|_| ProbeError::not_found(name))
}

fn os_error(name: &str) -> ProbeError {
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    match errno {
        libc::ENOENT => ProbeError::not_found(name),
        libc::ENOMEM => ProbeError::type_mismatch(name, "value", "buffer too small for value"),
        errno => ProbeError::Os {
            name: name.to_string(),
            errno,
        },
    }
}

impl Fetch for SysctlFetcher {
    fn get_string(&self, name: &str) -> ProbeResult<String> {
        let c_name = c_name(name)?;
        let result = Self::value_size(name, &c_name).and_then(|size| {
            // One extra byte keeps the buffer NUL-terminated whatever the
            // kernel writes.
            let mut buf = vec![0u8; size + 1];
            let written = Self::read_raw(name, &c_name, &mut buf[..size])?;
            buf.truncate(written);
            if let Some(nul) = buf.iter().position(|&b| b == 0) {
                buf.truncate(nul);
            }
            String::from_utf8(buf)
                .map_err(|e| ProbeError::type_mismatch(name, "UTF-8 string", e.to_string()))
        });

        match &result {
            Ok(value) => probe_debug!(key = name, value = %value, "Fetched sysctl value"),
            Err(e) if e.is_not_found() => probe_debug!(key = name, "No such sysctl"),
            Err(e) => probe_error!(key = name, error = %e, "Sysctl fetch failed"),
        }
        result
    }

    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
        let c_name = c_name(name)?;
        let mut buf = vec![0u8; T::WIDTH];
        let result = Self::read_raw(name, &c_name, &mut buf).and_then(|written| {
            if written != T::WIDTH {
                return Err(ProbeError::type_mismatch(
                    name,
                    T::NAME,
                    format!("kernel returned {} bytes, expected {}", written, T::WIDTH),
                ));
            }
            T::from_ne_slice(&buf)
                .ok_or_else(|| ProbeError::type_mismatch(name, T::NAME, "width mismatch"))
        });

        match &result {
            Ok(value) => probe_debug!(key = name, value = %value, "Fetched sysctl integer"),
            Err(e) if e.is_not_found() => probe_debug!(key = name, "No such sysctl"),
            Err(e) => probe_error!(key = name, error = %e, "Sysctl fetch failed"),
        }
        result
    }
}
