// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use hwprobe_detector::UnameField;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "hwprobe")]
#[command(about = "Inspect the processor, kernel and architecture of this machine")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Silence diagnostics
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Answer queries from a JSON file written by --record
    #[arg(long, global = true, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Write every value read to a JSON file
    #[arg(long, global = true, value_name = "FILE")]
    pub record: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print system information like uname(1)
    Uname {
        /// Kernel name, hostname, release, version and machine
        #[arg(short = 'a', long)]
        all: bool,
        /// Kernel name
        #[arg(short = 's', long)]
        kernel_name: bool,
        /// Network node hostname
        #[arg(short = 'n', long)]
        nodename: bool,
        /// Kernel release
        #[arg(short = 'r', long)]
        kernel_release: bool,
        /// Kernel version
        #[arg(short = 'v', long)]
        kernel_version: bool,
        /// Machine hardware name
        #[arg(short = 'm', long)]
        machine: bool,
        /// Generic processor type
        #[arg(short = 'p', long)]
        processor: bool,
    },
    /// Print the architecture of this process
    Arch {
        /// The architecture of the machine instead, seen through any translation layer
        #[arg(long, conflicts_with = "executable")]
        machine: bool,
        /// Every architecture the running executable contains
        #[arg(long)]
        executable: bool,
    },
    /// Print whether this process runs natively or translated
    Mode,
    /// Query CPUID, or decode the processor signature when no leaf is given
    Cpuid {
        /// Leaf, decimal or 0x-prefixed hexadecimal
        #[arg(long, value_parser = parse_u32)]
        leaf: Option<u32>,
        /// Sub-leaf, decimal or 0x-prefixed hexadecimal
        #[arg(long, value_parser = parse_u32, requires = "leaf")]
        sub_leaf: Option<u32>,
    },
    /// Print /proc/cpuinfo as records
    Cpuinfo,
    /// Print a summary of the processor and memory
    Summary,
    /// Read one entry by its dotted name
    Get {
        /// Entry name such as kern.ostype or hw.ncpu
        name: String,
        /// Read the entry as an integer
        #[arg(long, conflicts_with = "bool")]
        int: bool,
        /// Read the entry as a boolean
        #[arg(long)]
        bool: bool,
    },
}

impl Command {
    /// Fields requested by a `uname` invocation, in `uname(1)` output order.
    pub fn uname_fields(&self) -> Vec<UnameField> {
        let Command::Uname {
            all,
            kernel_name,
            nodename,
            kernel_release,
            kernel_version,
            machine,
            processor,
        } = self
        else {
            return Vec::new();
        };

        [
            (*all, UnameField::All),
            (*kernel_name, UnameField::KernelName),
            (*nodename, UnameField::Hostname),
            (*kernel_release, UnameField::KernelRelease),
            (*kernel_version, UnameField::KernelVersion),
            (*machine, UnameField::Machine),
            (*processor, UnameField::ProcessorType),
        ]
        .into_iter()
        .filter_map(|(set, field)| set.then_some(field))
        .collect()
    }
}

fn parse_u32(raw: &str) -> Result<u32, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", raw, e))
}
