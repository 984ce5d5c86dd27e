//! Pseudo-filesystem value source (`/proc`, `/sys`).
//!
//! A dotted name is turned into a path below the configured root, one path
//! component per segment: with root `/proc/sys`, `kernel.ostype` reads
//! `/proc/sys/kernel/ostype`.

use crate::traits::{Fetch, Integer};
use crate::value::EntryValue;
use hwprobe_core::{probe_debug, probe_error, ProbeError, ProbeResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Reads values from files below a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFsFetcher {
    root: PathBuf,
}

impl ProcFsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fetcher rooted at the directory `segment` directly below this one.
    pub(crate) fn child(&self, segment: &str) -> Self {
        Self::new(self.root.join(segment))
    }

    /// Path of the file or directory backing `name`.
    ///
    /// Every segment must be a plain file name, so the path never leaves
    /// the root.
    pub fn path_for(&self, name: &str) -> ProbeResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in name.split('.').filter(|s| !s.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) if !segment.contains('/') => {
                    path.push(segment)
                }
                _ => {
                    probe_debug!(key = name, segment, "Rejected name segment");
                    return Err(ProbeError::not_found(name));
                }
            }
        }
        Ok(path)
    }

    /// List the entries of the directory backing `subpath`, mapped to
    /// whether each one is itself a directory.
    ///
    /// Names are lowercased when the directory lives on a case-insensitive
    /// filesystem.
    pub fn list_entries(&self, subpath: &str) -> ProbeResult<BTreeMap<String, bool>> {
        let path = self.path_for(subpath)?;
        probe_debug!(path = %path.display(), "Listing entries");

        if !path.is_dir() {
            probe_error!(path = %path.display(), "Entry path does not exist");
            return Err(ProbeError::not_found(path.display().to_string()));
        }

        let case_sensitive = is_case_sensitive(&path);
        let mut entries = BTreeMap::new();

        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let name = if case_sensitive {
                name
            } else {
                name.to_lowercase()
            };
            entries.insert(name, entry.path().is_dir());
        }

        probe_debug!(count = entries.len(), "Got directory contents");
        Ok(entries)
    }

    /// Names of the sub-directories of `subpath`, sorted.
    pub fn list_directory_entries(&self, subpath: &str) -> ProbeResult<Vec<String>> {
        self.list_filtered(subpath, true)
    }

    /// Names of the plain files in `subpath`, sorted.
    pub fn list_file_entries(&self, subpath: &str) -> ProbeResult<Vec<String>> {
        self.list_filtered(subpath, false)
    }

    /// Read every file in `subpath` and coerce its contents.
    ///
    /// Files that cannot be read (write-only attributes are common in
    /// `/sys`) are skipped.
    pub fn list_file_entries_with_values(
        &self,
        subpath: &str,
    ) -> ProbeResult<BTreeMap<String, EntryValue>> {
        let dir = self.path_for(subpath)?;
        let mut values = BTreeMap::new();

        for name in self.list_file_entries(subpath)? {
            match read_value(&dir.join(&name)) {
                Ok(contents) => {
                    values.insert(name, EntryValue::coerce(&contents));
                }
                Err(e) => {
                    probe_debug!(file = %name, error = %e, "Skipping unreadable entry");
                }
            }
        }

        Ok(values)
    }

    fn list_filtered(&self, subpath: &str, directories: bool) -> ProbeResult<Vec<String>> {
        Ok(self
            .list_entries(subpath)?
            .into_iter()
            .filter(|(_, is_dir)| *is_dir == directories)
            .map(|(name, _)| name)
            .collect())
    }
}

impl Fetch for ProcFsFetcher {
    const FIXED_WIDTH: bool = false;

    fn get_string(&self, name: &str) -> ProbeResult<String> {
        let contents = self.path_for(name).and_then(|path| {
            probe_debug!(path = %path.display(), "Fetching pseudo-file value");
            read_value(&path)
        });
        let contents = contents.map_err(|e| match e {
            ProbeError::Io(io) if io.kind() == ErrorKind::NotFound => ProbeError::not_found(name),
            ProbeError::Io(io) if io.kind() == ErrorKind::InvalidData => {
                ProbeError::type_mismatch(name, "UTF-8 string", io.to_string())
            }
            other => other,
        });

        match &contents {
            Ok(value) => probe_debug!(key = name, value = %value, "Fetched value"),
            Err(e) if e.is_not_found() => probe_debug!(key = name, "No such entry"),
            Err(e) => probe_error!(key = name, error = %e, "Value fetching failed"),
        }
        contents
    }

    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
        let text = self.get_string(name)?;
        text.parse::<T>()
            .map_err(|_| ProbeError::type_mismatch(name, T::NAME, format!("unparsable text {:?}", text)))
    }
}

/// Read a pseudo-file, dropping exactly one trailing newline.
fn read_value(path: &Path) -> ProbeResult<String> {
    let mut contents = fs::read_to_string(path)?;
    if contents.ends_with('\n') {
        contents.pop();
    }
    Ok(contents)
}

/// Probe case sensitivity by looking the directory up under a case-swapped
/// name and checking whether it resolves to the same inode.
#[cfg(unix)]
fn is_case_sensitive(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    let swapped: String = name
        .chars()
        .map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                c.to_uppercase().next().unwrap_or(c)
            }
        })
        .collect();
    if swapped == name {
        return true;
    }

    match (fs::metadata(path), fs::metadata(path.with_file_name(&swapped))) {
        (Ok(original), Ok(other)) => original.ino() != other.ino() || original.dev() != other.dev(),
        _ => true,
    }
}

#[cfg(not(unix))]
fn is_case_sensitive(_path: &Path) -> bool {
    false
}
