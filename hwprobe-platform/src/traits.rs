//! Core traits for system value fetching.
//!
//! This module defines the contract every value source implements. A source
//! answers three kinds of question about a dotted property name: its string
//! value, its value as a fixed-width integer, and its value as a boolean.
//! Each backend (sysctl, procfs, in-memory) maps the name onto its own
//! storage; callers only ever see this trait.

use hwprobe_core::{ProbeError, ProbeResult};
use std::fmt::{Debug, Display};
use std::str::FromStr;

/// Fixed-width integer types a source can be asked for.
///
/// The width is part of the request: a backend storing raw bytes must
/// refuse a value whose width differs from `WIDTH` instead of widening or
/// narrowing it.
pub trait Integer: Copy + Default + Debug + Display + FromStr + Send + Sync + 'static {
    /// Width in bytes.
    const WIDTH: usize;
    /// Type name used in error messages.
    const NAME: &'static str;

    /// Decode from native-endian bytes. `None` unless `bytes.len() == WIDTH`.
    fn from_ne_slice(bytes: &[u8]) -> Option<Self>;

    /// Encode to native-endian bytes.
    fn to_ne_vec(self) -> Vec<u8>;
}

macro_rules! impl_integer {
    ($($t:ty),* $(,)?) => {
        $(
            impl Integer for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                const NAME: &'static str = stringify!($t);

                fn from_ne_slice(bytes: &[u8]) -> Option<Self> {
                    let array: [u8; std::mem::size_of::<$t>()] = bytes.try_into().ok()?;
                    Some(<$t>::from_ne_bytes(array))
                }

                fn to_ne_vec(self) -> Vec<u8> {
                    self.to_ne_bytes().to_vec()
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Map a fetched integer onto a boolean.
///
/// Only 0 and 1 are booleans; anything else is reported, never coerced.
pub fn bool_from_int(name: &str, value: i32) -> ProbeResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProbeError::InvalidBoolean {
            name: name.to_string(),
            value: i64::from(other),
        }),
    }
}

/// Read-only access to named system values.
pub trait Fetch {
    /// Whether integers are held at a fixed width, so reading one at
    /// another width fails. Text-backed sources parse any width that fits.
    const FIXED_WIDTH: bool = true;

    /// Fetch a value as UTF-8 text.
    fn get_string(&self, name: &str) -> ProbeResult<String>;

    /// Fetch a value as an integer of exactly `T`'s width.
    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T>;

    /// Fetch a boolean, stored by every backend as a 32-bit 0/1 integer.
    fn get_bool(&self, name: &str) -> ProbeResult<bool> {
        let raw: i32 = self.get_integer(name)?;
        bool_from_int(name, raw)
    }
}

impl<F: Fetch + ?Sized> Fetch for &F {
    const FIXED_WIDTH: bool = F::FIXED_WIDTH;

    fn get_string(&self, name: &str) -> ProbeResult<String> {
        (**self).get_string(name)
    }

    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
        (**self).get_integer(name)
    }

    fn get_bool(&self, name: &str) -> ProbeResult<bool> {
        (**self).get_bool(name)
    }
}
