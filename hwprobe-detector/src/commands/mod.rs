// Command handlers

use crate::cli::{Args, Command};
use anyhow::{Context, Result};
use hwprobe_core::{probe_debug, ProbeError};
use hwprobe_detector::cpuid::{self, Registers, Signature, LEAF_SIGNATURE};
use hwprobe_detector::{
    executable_architectures, Architecture, ExecutionMode, HardwareSummary, UnameRecord,
};
use hwprobe_platform::{Fetch, StoredRecord, SystemRegistry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::PoisonError;

/// Main command dispatcher
pub fn execute_command(args: Args) -> Result<()> {
    let registry = SystemRegistry::current();

    if let Some(path) = &args.replay {
        load_replay(registry, path)?;
    }

    let json = args.json;
    let result = match &args.command {
        command @ Command::Uname { .. } => {
            let record = UnameRecord::fetch(false).context("Failed to read kernel identity")?;
            let fields = command.uname_fields();
            if json {
                print_json(&record.select(&fields))
            } else {
                println!("{}", record.format(&fields));
                Ok(())
            }
        }
        Command::Arch {
            machine,
            executable,
        } => handle_arch(*machine, *executable, json),
        Command::Mode => {
            let mode = ExecutionMode::current().context("Failed to detect execution mode")?;
            emit(json, &mode)
        }
        Command::Cpuid { leaf, sub_leaf } => handle_cpuid(*leaf, *sub_leaf, json),
        Command::Cpuinfo => handle_cpuinfo(registry, json),
        Command::Summary => {
            let summary = HardwareSummary::collect();
            if json {
                print_json(&summary)
            } else {
                print!("{}", serde_yaml_ng::to_string(&summary)?);
                Ok(())
            }
        }
        Command::Get {
            name,
            int,
            bool: as_bool,
        } => handle_get(registry, name, *int, *as_bool, json),
    };

    if let Some(path) = &args.record {
        write_record(registry, path)?;
    }
    result
}

fn handle_arch(machine: bool, executable: bool, json: bool) -> Result<()> {
    if executable {
        let archs = executable_architectures().context("Failed to read executable architectures")?;
        if json {
            return print_json(&archs);
        }
        let names: Vec<&str> = archs.iter().map(Architecture::as_str).collect();
        println!("{}", names.join(" "));
        return Ok(());
    }

    let arch = if machine {
        Architecture::machine().context("Failed to detect machine architecture")?
    } else {
        Architecture::current().context("Failed to detect process architecture")?
    };
    emit(json, &arch)
}

#[derive(Serialize)]
struct SignatureReport {
    vendor: Option<String>,
    brand: Option<String>,
    family: u32,
    model: u32,
    #[serde(flatten)]
    signature: Signature,
}

fn handle_cpuid(leaf: Option<u32>, sub_leaf: Option<u32>, json: bool) -> Result<()> {
    if let Some(leaf) = leaf {
        let registers = Registers::from(leaf, sub_leaf)
            .with_context(|| format!("Failed to query CPUID leaf {:#x}", leaf))?;
        if json {
            return print_json(&registers);
        }
        println!(
            "eax={:#010x} ebx={:#010x} ecx={:#010x} edx={:#010x}",
            registers.eax, registers.ebx, registers.ecx, registers.edx
        );
        return Ok(());
    }

    let eax = Registers::from(LEAF_SIGNATURE, None)
        .context("Failed to query the processor signature")?
        .eax;
    let signature = Signature::from_eax(eax);
    let report = SignatureReport {
        vendor: cpuid::vendor().ok(),
        brand: cpuid::brand().ok(),
        family: signature.family(),
        model: signature.model(),
        signature,
    };

    if json {
        return print_json(&report);
    }
    if let Some(vendor) = &report.vendor {
        println!("vendor: {}", vendor);
    }
    if let Some(brand) = &report.brand {
        println!("brand: {}", brand);
    }
    println!("family: {:#x}", report.family);
    println!("model: {:#x}", report.model);
    println!("stepping: {}", signature.stepping);
    println!("processor type: {}", signature.processor_type);
    Ok(())
}

fn handle_cpuinfo(registry: &SystemRegistry, json: bool) -> Result<()> {
    let records = registry
        .proc()
        .cpuinfo_items()
        .context("Failed to read cpuinfo")?;
    if json {
        return print_json(&records);
    }

    let blocks: Vec<String> = records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    println!("{}", blocks.join("\n\n"));
    Ok(())
}

fn handle_get(
    registry: &SystemRegistry,
    name: &str,
    int: bool,
    as_bool: bool,
    json: bool,
) -> Result<()> {
    let system = registry.system();
    let context = || format!("Failed to read {}", name);

    if int {
        // Entries are either 32 or 64 bits wide.
        let value = match system.get_integer::<i64>(name) {
            Err(ProbeError::TypeMismatch { .. }) => system.get_integer::<i32>(name).map(i64::from),
            other => other,
        }
        .with_context(context)?;
        emit(json, &value)
    } else if as_bool {
        let value = system.get_bool(name).with_context(context)?;
        emit(json, &value)
    } else {
        let value = system.get_string(name).with_context(context)?;
        emit(json, &value)
    }
}

fn load_replay(registry: &SystemRegistry, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read replay file {}", path.display()))?;
    let records: BTreeMap<String, StoredRecord> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid replay file {}", path.display()))?;
    probe_debug!(count = records.len(), "Loaded replay records");

    let mut storage = registry
        .storage()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    storage.load(records);
    storage.enabled = true;
    storage.recover_every_query = true;
    Ok(())
}

fn write_record(registry: &SystemRegistry, path: &Path) -> Result<()> {
    let storage = registry
        .storage()
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    let text = serde_json::to_string_pretty(storage.records())?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Print a scalar as text, or as JSON when requested.
fn emit<T: Serialize + std::fmt::Display>(json: bool, value: &T) -> Result<()> {
    if json {
        print_json(value)
    } else {
        println!("{}", value);
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
