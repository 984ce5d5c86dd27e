//! In-memory value source.
//!
//! Values are held the way the kernel hands them out: strings as text and
//! integers as raw native-endian bytes of a fixed width. Reads therefore
//! obey the same width and boolean rules as the sysctl backend, which makes
//! this the stand-in for a real machine in tests.

use crate::traits::{Fetch, Integer};
use hwprobe_core::{ProbeError, ProbeResult};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredValue {
    Text(String),
    Integer(Vec<u8>),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    values: HashMap<String, StoredValue>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_string(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .insert(name.into(), StoredValue::Text(value.into()));
    }

    pub fn insert_integer<T: Integer>(&mut self, name: impl Into<String>, value: T) {
        self.values
            .insert(name.into(), StoredValue::Integer(value.to_ne_vec()));
    }

    /// Booleans are stored as 32-bit integers, like the kernel does.
    pub fn insert_bool(&mut self, name: impl Into<String>, value: bool) {
        self.insert_integer(name, i32::from(value));
    }

    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_string(name, value);
        self
    }

    pub fn with_integer<T: Integer>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert_integer(name, value);
        self
    }

    pub fn with_bool(mut self, name: impl Into<String>, value: bool) -> Self {
        self.insert_bool(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Fetch for MemoryFetcher {
    fn get_string(&self, name: &str) -> ProbeResult<String> {
        match self.values.get(name) {
            Some(StoredValue::Text(text)) => Ok(text.clone()),
            Some(StoredValue::Integer(bytes)) => Err(ProbeError::type_mismatch(
                name,
                "UTF-8 string",
                format!("entry holds a {}-byte integer", bytes.len()),
            )),
            None => Err(ProbeError::not_found(name)),
        }
    }

    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
        match self.values.get(name) {
            Some(StoredValue::Integer(bytes)) => T::from_ne_slice(bytes).ok_or_else(|| {
                ProbeError::type_mismatch(
                    name,
                    T::NAME,
                    format!("entry is {} bytes wide, expected {}", bytes.len(), T::WIDTH),
                )
            }),
            Some(StoredValue::Text(_)) => Err(ProbeError::type_mismatch(
                name,
                T::NAME,
                "entry holds a string",
            )),
            None => Err(ProbeError::not_found(name)),
        }
    }
}
