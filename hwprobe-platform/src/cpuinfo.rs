//! Parser for the Linux `/proc/cpuinfo` text format.
//!
//! The file is a sequence of `key<TAB>: value` lines, one block per logical
//! processor, blocks separated by an empty line.

use crate::value::EntryValue;
use hwprobe_core::probe_trace;
use std::collections::BTreeMap;

/// One processor block, keyed by normalized field name.
pub type CpuInfoRecord = BTreeMap<String, EntryValue>;

/// Split cpuinfo text into one record per processor block.
///
/// Keys have their first space replaced by `_` and all tabs removed, so
/// `model name\t:` becomes `model_name`. Values lose tabs, one leading space
/// and a trailing ` KB` unit before coercion.
pub fn parse_cpuinfo(text: &str) -> Vec<CpuInfoRecord> {
    let mut records = Vec::new();
    let mut current = CpuInfoRecord::new();

    for line in text.split('\n') {
        if line.trim_end_matches('\r').is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            continue;
        }

        let (raw_key, raw_value) = match line.split_once(':') {
            Some((key, value)) => (key, value),
            None => (line, ""),
        };

        let key = normalize_key(raw_key);
        let value = normalize_value(raw_value);
        probe_trace!(key = %key, value = %value, "cpuinfo field");

        current.insert(key, EntryValue::coerce(&value));
    }

    if !current.is_empty() {
        records.push(current);
    }

    records
}

fn normalize_key(raw: &str) -> String {
    raw.replacen(' ', "_", 1).replace('\t', "")
}

fn normalize_value(raw: &str) -> String {
    let mut value = raw.replace('\t', "").trim_end_matches('\r').to_string();
    if value.starts_with(' ') {
        value.remove(0);
    }
    if let Some(stripped) = value.strip_suffix(" KB") {
        value = stripped.to_string();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CORES: &str = "processor\t: 0\n\
vendor_id\t: GenuineIntel\n\
model name\t: Intel(R) Core(TM) i7-7700HQ CPU @ 2.80GHz\n\
cpu MHz\t\t: 2800.000\n\
cache size\t: 6144 KB\n\
fpu\t\t: yes\n\
flags\t\t: fpu vme de pse\n\
\n\
processor\t: 1\n\
vendor_id\t: GenuineIntel\n\
cache size\t: 6144 KB\n\
fpu_exception\t: no\n";

    #[test]
    fn test_two_records_with_kb_suffix() {
        let records = parse_cpuinfo(TWO_CORES);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0]["processor"], EntryValue::Integer(0));
        assert_eq!(records[1]["processor"], EntryValue::Integer(1));
        assert_eq!(records[0]["cache_size"], EntryValue::Integer(6144));
        assert_eq!(records[1]["cache_size"], EntryValue::Integer(6144));
    }

    #[test]
    fn test_key_and_value_normalization() {
        let records = parse_cpuinfo(TWO_CORES);
        let first = &records[0];

        assert_eq!(
            first["model_name"],
            EntryValue::Text("Intel(R) Core(TM) i7-7700HQ CPU @ 2.80GHz".to_string())
        );
        assert_eq!(first["cpu_MHz"], EntryValue::Float(2800.0));
        assert_eq!(first["fpu"], EntryValue::Bool(true));
        assert_eq!(records[1]["fpu_exception"], EntryValue::Bool(false));
        assert_eq!(
            first["flags"],
            EntryValue::Text("fpu vme de pse".to_string())
        );
    }

    #[test]
    fn test_trailing_and_repeated_blank_lines() {
        let text = "processor\t: 0\n\n\n\nprocessor\t: 1\n\n";
        let records = parse_cpuinfo(text);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_line_without_colon_and_empty_value() {
        let records = parse_cpuinfo("power management:\nbogus line\n");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0]["power_management"],
            EntryValue::Text(String::new())
        );
        assert_eq!(records[0]["bogus_line"], EntryValue::Text(String::new()));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_cpuinfo("").is_empty());
    }
}
