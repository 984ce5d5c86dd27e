// External crates
use clap::Parser;
use hwprobe_core::{diagnostics, probe_debug};
use hwprobe_platform::SystemRegistry;

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

fn main() {
    let _log_guard = hwprobe_logging::init_subscriber();

    let args = Args::parse();

    // The registry applies the configured diagnostics setting on first use,
    // so it is built before --quiet takes effect.
    let registry = SystemRegistry::current();
    if args.quiet {
        diagnostics::set_enabled(false);
    }
    probe_debug!(
        backend = SystemRegistry::backend_name(),
        proc_root = %registry.config().proc_root.display(),
        "Starting hwprobe"
    );

    if let Err(e) = execute_command(args) {
        eprintln!("hwprobe: {:#}", e);
        std::process::exit(1);
    }
}
