//! Probe configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults,
//! the YAML file named by `HWPROBE_CONFIG`, and individual `HWPROBE_*`
//! environment variables. Changing the roots is how a captured `/proc` or
//! `/sys` tree is inspected in place of the live one.

use hwprobe_core::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "HWPROBE_CONFIG";
pub const PROC_ROOT_ENV: &str = "HWPROBE_PROC_ROOT";
pub const SYS_ROOT_ENV: &str = "HWPROBE_SYS_ROOT";
pub const PROC_SYS_ROOT_ENV: &str = "HWPROBE_PROC_SYS_ROOT";
pub const DIAGNOSTICS_ENV: &str = "HWPROBE_DIAGNOSTICS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
    pub proc_sys_root: PathBuf,
    pub query_storage: QueryStorageConfig,
    pub diagnostics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStorageConfig {
    pub enabled: bool,
    pub recover_every_query: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            proc_sys_root: PathBuf::from("/proc/sys"),
            query_storage: QueryStorageConfig::default(),
            diagnostics: true,
        }
    }
}

impl Default for QueryStorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recover_every_query: false,
        }
    }
}

impl ProbeConfig {
    /// Load from `HWPROBE_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> ProbeResult<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> ProbeResult<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(contents)?)
    }

    pub fn to_yaml_string(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply `HWPROBE_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<L>(&mut self, lookup: L) -> ProbeResult<()>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(PROC_ROOT_ENV) {
            self.proc_root = PathBuf::from(root);
        }
        if let Some(root) = lookup(SYS_ROOT_ENV) {
            self.sys_root = PathBuf::from(root);
        }
        if let Some(root) = lookup(PROC_SYS_ROOT_ENV) {
            self.proc_sys_root = PathBuf::from(root);
        }
        if let Some(flag) = lookup(DIAGNOSTICS_ENV) {
            self.diagnostics = parse_flag(DIAGNOSTICS_ENV, &flag)?;
        }
        Ok(())
    }

    /// The `/sys/devices/system/cpu` directory below `sys_root`.
    pub fn sys_cpu_root(&self) -> PathBuf {
        self.sys_root.join("devices").join("system").join("cpu")
    }
}

fn parse_flag(key: &str, value: &str) -> ProbeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ProbeError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
        assert_eq!(config.proc_sys_root, PathBuf::from("/proc/sys"));
        assert_eq!(
            config.sys_cpu_root(),
            PathBuf::from("/sys/devices/system/cpu")
        );
        assert!(config.query_storage.enabled);
        assert!(!config.query_storage.recover_every_query);
        assert!(config.diagnostics);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ProbeConfig::from_yaml_str(
            "proc_root: /captures/proc\nquery_storage:\n  recover_every_query: true\n",
        )
        .unwrap();
        assert_eq!(config.proc_root, PathBuf::from("/captures/proc"));
        assert_eq!(config.sys_root, PathBuf::from("/sys"));
        assert!(config.query_storage.enabled);
        assert!(config.query_storage.recover_every_query);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ProbeConfig::from_yaml_str("\n").unwrap(), ProbeConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ProbeConfig::from_yaml_str("proc_root: [unclosed").unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "sys_root: /tmp/sys\ndiagnostics: false\n").unwrap();
        let config = ProbeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sys_root, PathBuf::from("/tmp/sys"));
        assert!(!config.diagnostics);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            (PROC_ROOT_ENV, "/fixture/proc"),
            (PROC_SYS_ROOT_ENV, "/fixture/proc/sys"),
            (DIAGNOSTICS_ENV, "off"),
        ]
        .into_iter()
        .collect();

        let mut config = ProbeConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.proc_root, PathBuf::from("/fixture/proc"));
        assert_eq!(config.proc_sys_root, PathBuf::from("/fixture/proc/sys"));
        assert_eq!(config.sys_root, PathBuf::from("/sys"));
        assert!(!config.diagnostics);
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let mut config = ProbeConfig::default();
        let result = config.apply_overrides(|key| {
            (key == DIAGNOSTICS_ENV).then(|| "sometimes".to_string())
        });
        assert!(matches!(result, Err(ProbeError::Config(_))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = ProbeConfig::default();
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(ProbeConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
